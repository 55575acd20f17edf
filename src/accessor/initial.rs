use super::{AccessorError, StateAccessor, StatePredicate};
use crate::behavior::{Activity, Behavior, BehaviorContext, Instance, TransitionActivity};
use crate::core::State;
use crate::machine::StateMachineError;
use std::sync::Arc;

/// Wraps an accessor so a host without a state is moved into the initial
/// state the first time the machine reads it.
///
/// The move is a regular transition, so `Initial.BeforeEnter` and
/// `Initial.Enter` behaviors run and state observers are notified.
pub struct InitialIfNullStateAccessor<I> {
    inner: Arc<dyn StateAccessor<I>>,
    initialize: Behavior<I>,
}

impl<I: Instance> InitialIfNullStateAccessor<I> {
    pub fn new(inner: Arc<dyn StateAccessor<I>>, initial: State) -> Self {
        let transition: Arc<dyn Activity<I>> =
            Arc::new(TransitionActivity::new(initial, Arc::clone(&inner)));
        Self {
            inner,
            initialize: Behavior::new([transition]),
        }
    }

    pub fn inner(&self) -> &Arc<dyn StateAccessor<I>> {
        &self.inner
    }

    /// Current state, materializing the initial state when there is none.
    pub async fn current(&self, ctx: &mut BehaviorContext<'_, I>) -> Result<State, StateMachineError> {
        if let Some(state) = self.inner.get(ctx.instance())? {
            return Ok(state);
        }

        tracing::debug!(machine = ctx.machine().name(), "instance has no state, initializing");
        let result = self.initialize.execute(&mut *ctx).await;
        ctx.conclude(result)?;

        self.inner
            .get(ctx.instance())?
            .ok_or_else(|| StateMachineError::MissingState {
                machine: ctx.machine().name().to_string(),
            })
    }
}

impl<I: Instance> StateAccessor<I> for InitialIfNullStateAccessor<I> {
    fn get(&self, instance: &I) -> Result<Option<State>, AccessorError> {
        self.inner.get(instance)
    }

    fn set(&self, instance: &mut I, state: &State) -> Result<(), AccessorError> {
        self.inner.set(instance, state)
    }

    fn state_predicate(&self, states: &[State]) -> Result<StatePredicate<I>, AccessorError> {
        self.inner.state_predicate(states)
    }
}
