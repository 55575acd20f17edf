//! Notification hooks around event execution and state changes.

use super::StateMachineError;
use crate::accessor::StateObserver;
use crate::behavior::BehaviorContext;
use crate::core::{State, StateChange, StateHistory};
use parking_lot::Mutex;

/// Envelope around every bound behavior a machine executes.
///
/// `execute_fault` is called instead of `post_execute` when the behavior
/// fails; the error is still returned to the caller.
pub trait EventObserver<I>: Send + Sync {
    fn pre_execute(&self, _ctx: &BehaviorContext<'_, I>) {}

    fn post_execute(&self, _ctx: &BehaviorContext<'_, I>) {}

    fn execute_fault(&self, _ctx: &BehaviorContext<'_, I>, _error: &StateMachineError) {}
}

/// Keeps the history of every state change written through an accessor.
///
/// # Example
///
/// ```rust
/// use statecraft::accessor::StateObserver;
/// use statecraft::core::State;
/// use statecraft::machine::StateHistoryRecorder;
///
/// let recorder = StateHistoryRecorder::new();
/// StateObserver::<()>::state_changed(&recorder, &(), &State::initial(), None);
/// StateObserver::<()>::state_changed(&recorder, &(), &State::new("Open"), Some(&State::initial()));
///
/// let history = recorder.history();
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.get_path(), vec![&State::initial(), &State::new("Open")]);
/// ```
#[derive(Debug, Default)]
pub struct StateHistoryRecorder {
    history: Mutex<StateHistory>,
}

impl StateHistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the changes recorded so far.
    pub fn history(&self) -> StateHistory {
        self.history.lock().clone()
    }
}

impl<I> StateObserver<I> for StateHistoryRecorder {
    fn state_changed(&self, _instance: &I, current: &State, previous: Option<&State>) {
        self.history
            .lock()
            .push(StateChange::now(current.clone(), previous.cloned()));
    }
}
