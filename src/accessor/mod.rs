//! Reading and writing a host instance's current state.
//!
//! The engine never assumes how a host stores its state. An accessor pairs
//! an explicit read/write registration with a codec:
//! - [`HandleCodec`]: the host keeps an `Option<State>`
//! - [`NameCodec`]: the host keeps the state name
//! - [`IndexCodec`]: the host keeps an integer into an explicit state table
//!
//! Accessors also own the state-changed notification channel. The
//! [`InitialIfNullStateAccessor`] decorator guarantees a host that never had
//! a state observes the machine's initial state on first access.

mod codec;
mod error;
mod field;
mod initial;

pub use codec::{HandleCodec, IndexCodec, NameCodec, StateCodec};
pub use error::AccessorError;
pub use field::FieldStateAccessor;
pub use initial::InitialIfNullStateAccessor;

use crate::core::State;
use std::sync::Arc;

/// Predicate over a host instance, e.g. "is the instance in one of these states".
pub type StatePredicate<I> = Arc<dyn Fn(&I) -> bool + Send + Sync>;

/// Contract between the engine and a host's current-state field.
pub trait StateAccessor<I>: Send + Sync {
    /// Current state, or `None` if the host never received one.
    fn get(&self, instance: &I) -> Result<Option<State>, AccessorError>;

    /// Write `state`, notifying observers when it differs from the current one.
    fn set(&self, instance: &mut I, state: &State) -> Result<(), AccessorError>;

    /// Predicate that holds while the host is in any of `states`.
    fn state_predicate(&self, states: &[State]) -> Result<StatePredicate<I>, AccessorError>;
}

/// Receives every state change written through an accessor.
pub trait StateObserver<I>: Send + Sync {
    fn state_changed(&self, instance: &I, current: &State, previous: Option<&State>);
}
