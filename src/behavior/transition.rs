//! The transition algorithm.

use super::{Activity, ActivityError, Behavior, BehaviorContext, EventData, Instance};
use crate::accessor::StateAccessor;
use crate::core::{State, StateHierarchy};
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Levels left when moving from `current` to `to`, innermost first.
///
/// Stops at the first level that contains `to`.
pub(crate) fn exit_path(hierarchy: &StateHierarchy, current: &State, to: &State) -> Vec<State> {
    let mut levels = Vec::new();
    let mut level = Some(current);
    while let Some(state) = level {
        if hierarchy.has_state(state, to) {
            break;
        }
        levels.push(state.clone());
        level = hierarchy.superstate(state);
    }
    levels
}

/// Levels entered when moving from `current` to `to`, outermost first.
///
/// Empty when `to` already contains `current`.
pub(crate) fn entry_path(
    hierarchy: &StateHierarchy,
    current: Option<&State>,
    to: &State,
) -> Vec<State> {
    let contains_current = |level: &State| current.is_some_and(|c| hierarchy.has_state(level, c));

    let mut levels: Vec<State> = std::iter::once(to.clone())
        .chain(hierarchy.ancestors(to))
        .take_while(|level| !contains_current(level))
        .collect();
    levels.reverse();
    levels
}

/// Moves the instance to a target state, raising lifecycle events for
/// every hierarchy level crossed.
///
/// The order is: `Leave` for each level left (innermost first),
/// `BeforeEnter` for each level entered (outermost first), the state write,
/// `AfterLeave` for each level left, then `Enter` for each level entered.
/// Each lifecycle event is raised in the level it names. Transitioning to
/// the state the instance is already in does nothing.
pub struct TransitionActivity<I> {
    to: State,
    accessor: Arc<dyn StateAccessor<I>>,
}

impl<I: Instance> TransitionActivity<I> {
    pub fn new(to: State, accessor: Arc<dyn StateAccessor<I>>) -> Self {
        Self { to, accessor }
    }

    pub fn target(&self) -> &State {
        &self.to
    }

    async fn transition(&self, ctx: &mut BehaviorContext<'_, I>) -> Result<(), ActivityError> {
        let machine = ctx.machine();
        let current = self.accessor.get(ctx.instance())?;
        if current.as_ref() == Some(&self.to) {
            tracing::trace!(state = %self.to, "already in target state");
            return Ok(());
        }

        let hierarchy = machine.hierarchy();
        let leaving = current
            .as_ref()
            .map(|current| exit_path(hierarchy, current, &self.to))
            .unwrap_or_default();
        let entering = entry_path(hierarchy, current.as_ref(), &self.to);

        for level in &leaving {
            let mut leave = ctx.proxy(level.leave_event(), None);
            machine
                .raise_in_state(level, &mut leave)
                .await
                .map_err(ActivityError::nested)?;
        }

        for level in &entering {
            let target: EventData = Arc::new(self.to.clone());
            let mut before = ctx.proxy(level.before_enter_event().into_event(), Some(target));
            machine
                .raise_in_state(level, &mut before)
                .await
                .map_err(ActivityError::nested)?;
        }

        self.accessor.set(ctx.instance_mut(), &self.to)?;
        tracing::debug!(
            machine = machine.name(),
            from = current.as_ref().map(State::name).unwrap_or("<none>"),
            to = %self.to,
            "state transitioned"
        );

        for level in &leaving {
            let left: EventData = Arc::new(level.clone());
            let mut after = ctx.proxy(level.after_leave_event().into_event(), Some(left));
            machine
                .raise_in_state(level, &mut after)
                .await
                .map_err(ActivityError::nested)?;
        }

        for level in &entering {
            let mut enter = ctx.proxy(level.enter_event(), None);
            machine
                .raise_in_state(level, &mut enter)
                .await
                .map_err(ActivityError::nested)?;
        }

        Ok(())
    }
}

impl<I: Instance> Activity<I> for TransitionActivity<I> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            self.transition(ctx).await?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("transition").with_detail(self.to.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(states: &[State]) -> Vec<&str> {
        states.iter().map(State::name).collect()
    }

    fn hierarchy() -> StateHierarchy {
        let mut hierarchy = StateHierarchy::new();
        hierarchy
            .add_substate(&State::new("Pending"), &State::new("Active"))
            .unwrap();
        hierarchy
            .add_substate(&State::new("Running"), &State::new("Active"))
            .unwrap();
        hierarchy
    }

    #[test]
    fn sibling_transition_crosses_only_the_leaves() {
        let hierarchy = hierarchy();
        let pending = State::new("Pending");
        let running = State::new("Running");

        assert_eq!(names(&exit_path(&hierarchy, &pending, &running)), vec!["Pending"]);
        assert_eq!(names(&entry_path(&hierarchy, Some(&pending), &running)), vec!["Running"]);
    }

    #[test]
    fn entering_a_nested_state_enters_its_superstates_first() {
        let hierarchy = hierarchy();
        let initial = State::initial();
        let running = State::new("Running");

        assert_eq!(names(&exit_path(&hierarchy, &initial, &running)), vec!["Initial"]);
        assert_eq!(
            names(&entry_path(&hierarchy, Some(&initial), &running)),
            vec!["Active", "Running"]
        );
        assert_eq!(
            names(&entry_path(&hierarchy, None, &running)),
            vec!["Active", "Running"]
        );
    }

    #[test]
    fn leaving_a_nested_state_leaves_inside_out() {
        let hierarchy = hierarchy();
        let running = State::new("Running");

        assert_eq!(
            names(&exit_path(&hierarchy, &running, &State::final_state())),
            vec!["Running", "Active"]
        );
    }

    #[test]
    fn moving_to_a_superstate_enters_nothing() {
        let hierarchy = hierarchy();
        let running = State::new("Running");
        let active = State::new("Active");

        assert_eq!(names(&exit_path(&hierarchy, &running, &active)), vec!["Running"]);
        assert!(entry_path(&hierarchy, Some(&running), &active).is_empty());
    }
}
