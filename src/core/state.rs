//! Named states and their lifecycle events.
//!
//! A `State` is an immutable handle: two states are the same state if and
//! only if their names are equal (ordinal, case-sensitive). Hierarchy lives
//! in [`StateHierarchy`](super::StateHierarchy), not on the handle, so states
//! stay cheap to clone and compare.

use super::event::{DataEvent, Event};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of the state every machine starts in.
pub const INITIAL: &str = "Initial";

/// Name of the terminal state every machine owns.
pub const FINAL: &str = "Final";

/// A named state of a state machine.
///
/// # Example
///
/// ```rust
/// use statecraft::core::State;
///
/// let waiting = State::new("Waiting");
/// assert_eq!(waiting.name(), "Waiting");
/// assert_eq!(waiting.enter_event().name(), "Waiting.Enter");
/// assert_eq!(waiting, State::new("Waiting"));
/// assert_ne!(waiting, State::new("waiting"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    name: Arc<str>,
}

impl State {
    /// Create a state handle with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// The built-in initial state.
    pub fn initial() -> Self {
        Self::new(INITIAL)
    }

    /// The built-in final state.
    pub fn final_state() -> Self {
        Self::new(FINAL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initial(&self) -> bool {
        &*self.name == INITIAL
    }

    pub fn is_final(&self) -> bool {
        &*self.name == FINAL
    }

    /// Raised when an instance enters this state.
    pub fn enter_event(&self) -> Event {
        Event::new(format!("{}.Enter", self.name))
    }

    /// Raised when an instance leaves this state.
    pub fn leave_event(&self) -> Event {
        Event::new(format!("{}.Leave", self.name))
    }

    /// Raised before the state is written; carries the target state.
    pub fn before_enter_event(&self) -> DataEvent<State> {
        DataEvent::new(format!("{}.BeforeEnter", self.name))
    }

    /// Raised after the state is written; carries the state that was left.
    pub fn after_leave_event(&self) -> DataEvent<State> {
        DataEvent::new(format!("{}.AfterLeave", self.name))
    }

    /// The four lifecycle events, in enter/leave/before-enter/after-leave order.
    pub fn lifecycle_events(&self) -> [Event; 4] {
        [
            self.enter_event(),
            self.leave_event(),
            self.before_enter_event().into_event(),
            self.after_leave_event().into_event(),
        ]
    }
}

impl Borrow<str> for State {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({})", self.name)
    }
}

impl From<&str> for State {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_compare_by_name() {
        assert_eq!(State::new("Ready"), State::new("Ready"));
        assert_ne!(State::new("Ready"), State::new("ready"));
    }

    #[test]
    fn built_in_states_are_recognized() {
        assert!(State::initial().is_initial());
        assert!(State::final_state().is_final());
        assert!(!State::new("Running").is_final());
    }

    #[test]
    fn lifecycle_events_are_named_after_the_state() {
        let state = State::new("Running");
        let names: Vec<String> = state
            .lifecycle_events()
            .iter()
            .map(|e| e.name().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "Running.Enter",
                "Running.Leave",
                "Running.BeforeEnter",
                "Running.AfterLeave"
            ]
        );
    }

    #[test]
    fn state_serializes_as_its_name() {
        let state = State::new("Shipped");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"Shipped\"");

        let deserialized: State = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
