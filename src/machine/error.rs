//! Runtime error types.

use crate::accessor::AccessorError;
use crate::behavior::Fault;
use thiserror::Error;

/// Errors returned by every runtime entry point of a state machine.
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("machine '{machine}': event '{event}' is not handled in state '{state}'")]
    UnhandledEvent {
        machine: String,
        event: String,
        state: String,
    },

    #[error("machine '{machine}': event '{event}' faulted in state '{state}': {fault}")]
    EventExecution {
        machine: String,
        event: String,
        state: String,
        #[source]
        fault: Fault,
    },

    #[error("machine '{machine}': state '{state}' is not declared")]
    UnknownState { machine: String, state: String },

    #[error("machine '{machine}': instance has no current state after initialization")]
    MissingState { machine: String },

    #[error("state accessor: {0}")]
    Accessor(#[from] AccessorError),
}

impl StateMachineError {
    /// The fault behind an execution error.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            StateMachineError::EventExecution { fault, .. } => Some(fault),
            _ => None,
        }
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self, StateMachineError::UnhandledEvent { .. })
    }

    /// Stable identifier for the error kind, e.g. for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            StateMachineError::UnhandledEvent { .. } => "UNHANDLED_EVENT",
            StateMachineError::EventExecution { .. } => "EVENT_EXECUTION",
            StateMachineError::UnknownState { .. } => "UNKNOWN_STATE",
            StateMachineError::MissingState { .. } => "MISSING_STATE",
            StateMachineError::Accessor(_) => "ACCESSOR",
        }
    }
}
