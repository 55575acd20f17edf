//! Build errors for state machine configuration.

use crate::accessor::AccessorError;
use crate::core::HierarchyError;
use thiserror::Error;

/// A single problem found in a machine's configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("State '{state}' is declared more than once")]
    DuplicateState { state: String },

    #[error("Event '{event}' is declared more than once")]
    DuplicateEvent { event: String },

    #[error("State '{state}' is not declared in this machine")]
    UnknownState { state: String },

    #[error("Event '{event}' is not declared in this machine")]
    UnknownEvent { event: String },

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("Event '{event}' is bound more than once in state '{state}'")]
    DuplicateBinding { state: String, event: String },

    #[error("Event '{event}' is both bound and ignored in state '{state}'")]
    BoundAndIgnored { state: String, event: String },

    #[error("Composite event '{composite}' needs 1 to {max} constituents, got {count}")]
    ConstituentCount {
        composite: String,
        count: usize,
        max: usize,
    },

    #[error("Composite event '{composite}' lists constituent '{event}' more than once")]
    DuplicateConstituent { composite: String, event: String },

    #[error("No state field configured. Call .state_field(..) or .custom_accessor(..)")]
    MissingStateField,

    #[error("State change observers need a state field; a custom accessor notifies on its own")]
    ObserversWithCustomAccessor,

    #[error("State '{state}' is missing from the index table")]
    IndexTableIncomplete { state: String },

    #[error("Invalid state table: {0}")]
    StateTable(#[from] AccessorError),
}

/// Errors that can occur when building a state machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid state machine configuration: {}", summarize(.0))]
    Invalid(Vec<ConfigurationError>),
}

impl BuildError {
    /// Every problem found, in the order the checks ran.
    pub fn errors(&self) -> &[ConfigurationError] {
        match self {
            BuildError::Invalid(errors) => errors,
        }
    }
}

fn summarize(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
