//! What happens to an event no state in the chain handles.

use crate::behavior::BehaviorContext;
use crate::core::State;
use std::fmt;
use std::sync::Arc;

/// Outcome chosen by a custom unhandled-event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhandledEventAction {
    Ignore,
    Throw,
}

type UnhandledCallback<I> =
    Arc<dyn Fn(&BehaviorContext<'_, I>, &State) -> UnhandledEventAction + Send + Sync>;

/// Policy applied once per raise when neither the state nor any of its
/// superstates binds or ignores the event.
pub enum UnhandledEventPolicy<I> {
    /// Fail with [`StateMachineError::UnhandledEvent`](super::StateMachineError::UnhandledEvent).
    Throw,
    /// Drop the event silently.
    Ignore,
    /// Let a callback decide, e.g. to log and continue.
    Custom(UnhandledCallback<I>),
}

impl<I> UnhandledEventPolicy<I> {
    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&BehaviorContext<'_, I>, &State) -> UnhandledEventAction + Send + Sync + 'static,
    {
        UnhandledEventPolicy::Custom(Arc::new(callback))
    }

    pub(crate) fn resolve(&self, ctx: &BehaviorContext<'_, I>, state: &State) -> UnhandledEventAction {
        match self {
            UnhandledEventPolicy::Throw => UnhandledEventAction::Throw,
            UnhandledEventPolicy::Ignore => UnhandledEventAction::Ignore,
            UnhandledEventPolicy::Custom(callback) => callback(ctx, state),
        }
    }
}

impl<I> Default for UnhandledEventPolicy<I> {
    fn default() -> Self {
        UnhandledEventPolicy::Throw
    }
}

impl<I> Clone for UnhandledEventPolicy<I> {
    fn clone(&self) -> Self {
        match self {
            UnhandledEventPolicy::Throw => UnhandledEventPolicy::Throw,
            UnhandledEventPolicy::Ignore => UnhandledEventPolicy::Ignore,
            UnhandledEventPolicy::Custom(callback) => UnhandledEventPolicy::Custom(Arc::clone(callback)),
        }
    }
}

impl<I> fmt::Debug for UnhandledEventPolicy<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnhandledEventPolicy::Throw => f.write_str("Throw"),
            UnhandledEventPolicy::Ignore => f.write_str("Ignore"),
            UnhandledEventPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
