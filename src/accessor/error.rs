//! Accessor error types.

use thiserror::Error;

/// Errors reading or writing a host's current-state field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessorError {
    /// The stored or requested state is not part of the accessor's state table
    #[error("unknown state: '{state}'")]
    UnknownState { state: String },

    /// The stored integer does not address a state in the table
    #[error("state index {index} is out of range (1..={len})")]
    IndexOutOfRange { index: i32, len: usize },

    /// The accessor was given a state table listing a state twice
    #[error("state '{state}' appears more than once in the state table")]
    DuplicateState { state: String },
}
