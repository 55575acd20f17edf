//! State change history.
//!
//! An immutable, ordered record of the state changes an accessor reported,
//! used for auditing long-running instances.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single state change.
///
/// `previous` is `None` for the first state an instance ever received.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// The state that was left
    pub previous: Option<State>,
    /// The state that was written
    pub current: State,
    /// When the change was written
    pub timestamp: DateTime<Utc>,
}

impl StateChange {
    pub fn now(current: State, previous: Option<State>) -> Self {
        Self {
            previous,
            current,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered history of state changes.
///
/// History is immutable - `record` returns a new history with the change
/// appended.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{State, StateChange, StateHistory};
///
/// let history = StateHistory::new()
///     .record(StateChange::now(State::initial(), None))
///     .record(StateChange::now(State::new("Running"), Some(State::initial())));
///
/// let path = history.get_path();
/// assert_eq!(path, vec![&State::initial(), &State::new("Running")]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateHistory {
    changes: Vec<StateChange>,
}

impl StateHistory {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Record a change, returning a new history.
    pub fn record(&self, change: StateChange) -> Self {
        let mut changes = self.changes.clone();
        changes.push(change);
        Self { changes }
    }

    pub(crate) fn push(&mut self, change: StateChange) {
        self.changes.push(change);
    }

    /// States traversed, in order.
    ///
    /// Starts with the first change's previous state when there was one.
    pub fn get_path(&self) -> Vec<&State> {
        let mut path = Vec::new();
        if let Some(previous) = self.changes.first().and_then(|c| c.previous.as_ref()) {
            path.push(previous);
        }
        for change in &self.changes {
            path.push(&change.current);
        }
        path
    }

    /// Time between the first and the last recorded change.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.changes.first(), self.changes.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn changes(&self) -> &[StateChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
