use super::{Activity, ActivityError, Behavior, BehaviorContext, Instance};
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};

type Condition<I> = Box<dyn Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync>;

/// Runs one of two branch chains depending on a predicate, then continues.
///
/// A fault that escapes the chosen branch is treated as raised by this
/// activity, so catch clauses after it still see it.
pub struct ConditionActivity<I> {
    condition: Condition<I>,
    then_branch: Behavior<I>,
    else_branch: Behavior<I>,
}

impl<I: Instance> ConditionActivity<I> {
    pub fn new<F>(condition: F, then_branch: Behavior<I>, else_branch: Behavior<I>) -> Self
    where
        F: Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        }
    }
}

impl<I: Instance> Activity<I> for ConditionActivity<I> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            let branch = if (self.condition)(&*ctx) {
                &self.then_branch
            } else {
                &self.else_branch
            };
            branch
                .execute(&mut *ctx)
                .await
                .map_err(ActivityError::rethrown)?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        let mut children = vec![ProbeNode::new("then").with_children(self.then_branch.describe())];
        if !self.else_branch.is_empty() {
            children.push(ProbeNode::new("else").with_children(self.else_branch.describe()));
        }
        ProbeNode::new("condition").with_children(children)
    }
}
