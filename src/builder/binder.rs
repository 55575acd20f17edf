//! Fluent binding of activities to an event.

use crate::accessor::StateAccessor;
use crate::behavior::{
    ActionActivity, Activity, AsyncActionActivity, Behavior, BehaviorContext, CatchActivity,
    CompensateActivity, ConditionActivity, DataConverterActivity, FactoryActivity, Fault,
    Instance, RaiseActivity, TransitionActivity,
};
use crate::core::{Event, State};
use futures::future::BoxFuture;
use std::error::Error;
use std::sync::Arc;

type Condition<I> = Box<dyn Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync>;
type HandlerWrapper<I> = fn(Behavior<I>) -> Arc<dyn Activity<I>>;

enum Step<I> {
    Activity(Arc<dyn Activity<I>>),
    Transition(State),
    Branch {
        condition: Condition<I>,
        then_branch: EventActivityBinder<I>,
        else_branch: Option<EventActivityBinder<I>>,
    },
    Handler {
        wrap: HandlerWrapper<I>,
        handler: EventActivityBinder<I>,
    },
}

/// Ordered activities for one event, or for a nested handler chain.
///
/// Obtain one from [`StateMachineBuilder::when`](super::StateMachineBuilder::when)
/// so the instance type is fixed, then chain steps:
///
/// ```rust
/// use statecraft::builder::StateMachineBuilder;
///
/// #[derive(Default)]
/// struct Order {
///     state: Option<String>,
///     submitted: u32,
/// }
///
/// let mut builder = StateMachineBuilder::<Order>::new("orders");
/// let open = builder.state("Open");
/// let submit = builder.event("Submit");
///
/// let binder = builder
///     .when(&submit)
///     .then(|ctx| ctx.instance_mut().submitted += 1)
///     .transition_to(&open);
/// assert_eq!(binder.len(), 2);
/// ```
pub struct EventActivityBinder<I> {
    event: Option<Event>,
    steps: Vec<Step<I>>,
}

impl<I: Instance> EventActivityBinder<I> {
    /// Activities run when `event` is raised.
    pub fn when(event: impl AsRef<Event>) -> Self {
        Self {
            event: Some(event.as_ref().clone()),
            steps: Vec::new(),
        }
    }

    /// Nested chain for a catch, compensate or branch.
    pub fn handler() -> Self {
        Self {
            event: None,
            steps: Vec::new(),
        }
    }

    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(mut self, step: Step<I>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn then(self, action: impl Fn(&mut BehaviorContext<'_, I>) + Send + Sync + 'static) -> Self {
        self.execute(ActionActivity::new(action))
    }

    /// Action whose error faults the chain.
    pub fn try_then<E>(
        self,
        action: impl Fn(&mut BehaviorContext<'_, I>) -> Result<(), E> + Send + Sync + 'static,
    ) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.execute(ActionActivity::fallible(action))
    }

    pub fn then_async<E>(
        self,
        action: impl for<'c, 'd> Fn(&'c mut BehaviorContext<'d, I>) -> BoxFuture<'c, Result<(), E>>
            + Send
            + Sync
            + 'static,
    ) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.execute(AsyncActionActivity::new(action))
    }

    /// Action over the event's payload; a missing payload faults the chain.
    pub fn then_data<T: Send + Sync + 'static>(
        self,
        action: impl Fn(&mut BehaviorContext<'_, I>, &T) + Send + Sync + 'static,
    ) -> Self {
        self.execute(DataConverterActivity::new(action))
    }

    pub fn execute(self, activity: impl Activity<I> + 'static) -> Self {
        self.push(Step::Activity(Arc::new(activity)))
    }

    /// Activity created anew for every execution.
    pub fn execute_factory(
        self,
        factory: impl Fn(&BehaviorContext<'_, I>) -> Arc<dyn Activity<I>> + Send + Sync + 'static,
    ) -> Self {
        self.execute(FactoryActivity::new(factory))
    }

    pub fn if_then(
        self,
        condition: impl Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync + 'static,
        then_branch: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push(Step::Branch {
            condition: Box::new(condition),
            then_branch: then_branch(Self::handler()),
            else_branch: None,
        })
    }

    pub fn if_else(
        self,
        condition: impl Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync + 'static,
        then_branch: impl FnOnce(Self) -> Self,
        else_branch: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push(Step::Branch {
            condition: Box::new(condition),
            then_branch: then_branch(Self::handler()),
            else_branch: Some(else_branch(Self::handler())),
        })
    }

    pub fn transition_to(self, state: &State) -> Self {
        self.push(Step::Transition(state.clone()))
    }

    /// Transition to `Final`.
    pub fn finalize(self) -> Self {
        self.transition_to(&State::final_state())
    }

    /// Raise another event against the same instance.
    pub fn raise(self, event: impl AsRef<Event>) -> Self {
        self.execute(RaiseActivity::new(event.as_ref().clone()))
    }

    /// Handle faults of type `E` raised earlier in the chain, then resume.
    pub fn catch<E: Error + 'static>(self, handler: impl FnOnce(Self) -> Self) -> Self {
        self.push(Step::Handler {
            wrap: |behavior| Arc::new(CatchActivity::<I, E>::new(behavior)) as Arc<dyn Activity<I>>,
            handler: handler(Self::handler()),
        })
    }

    /// Run `handler` for faults of type `E`, then keep faulting.
    pub fn compensate<E: Error + 'static>(self, handler: impl FnOnce(Self) -> Self) -> Self {
        self.push(Step::Handler {
            wrap: |behavior| {
                Arc::new(CompensateActivity::<I, E>::new(behavior)) as Arc<dyn Activity<I>>
            },
            handler: handler(Self::handler()),
        })
    }

    /// Handle any fault raised earlier in the chain, then resume.
    pub fn catch_any(self, handler: impl FnOnce(Self) -> Self) -> Self {
        self.catch::<Fault>(handler)
    }

    /// Run `handler` for any fault, then keep faulting.
    pub fn compensate_any(self, handler: impl FnOnce(Self) -> Self) -> Self {
        self.compensate::<Fault>(handler)
    }

    /// Every state a transition step in this chain targets.
    pub(crate) fn targets(&self) -> Vec<&State> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                Step::Activity(_) => Vec::new(),
                Step::Transition(state) => vec![state],
                Step::Branch {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    let mut targets = then_branch.targets();
                    if let Some(else_branch) = else_branch {
                        targets.extend(else_branch.targets());
                    }
                    targets
                }
                Step::Handler { handler, .. } => handler.targets(),
            })
            .collect()
    }

    /// Turn the steps into activities, wiring transitions to `accessor`.
    pub(crate) fn into_activities(
        self,
        accessor: &Arc<dyn StateAccessor<I>>,
    ) -> Vec<Arc<dyn Activity<I>>> {
        self.steps
            .into_iter()
            .map(|step| -> Arc<dyn Activity<I>> {
                match step {
                    Step::Activity(activity) => activity,
                    Step::Transition(state) => {
                        Arc::new(TransitionActivity::new(state, Arc::clone(accessor)))
                    }
                    Step::Branch {
                        condition,
                        then_branch,
                        else_branch,
                    } => {
                        let then_branch = Behavior::handler(then_branch.into_activities(accessor));
                        let else_branch = else_branch
                            .map(|branch| Behavior::handler(branch.into_activities(accessor)))
                            .unwrap_or_else(|| Behavior::handler(Vec::new()));
                        Arc::new(ConditionActivity::new(condition, then_branch, else_branch))
                    }
                    Step::Handler { wrap, handler } => {
                        wrap(Behavior::handler(handler.into_activities(accessor)))
                    }
                }
            })
            .collect()
    }
}
