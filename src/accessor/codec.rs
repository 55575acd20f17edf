//! Codecs between `State` and the representation a host stores.

use super::error::AccessorError;
use crate::core::State;
use std::collections::HashSet;

/// Converts between states and a host-side field representation.
///
/// `decode` returns `Ok(None)` when the field holds the "never set" value.
pub trait StateCodec: Send + Sync + 'static {
    type Repr: Clone + PartialEq + Send + Sync + 'static;

    fn decode(&self, repr: &Self::Repr) -> Result<Option<State>, AccessorError>;

    fn encode(&self, state: &State) -> Result<Self::Repr, AccessorError>;
}

/// Host stores the state handle itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct HandleCodec;

impl StateCodec for HandleCodec {
    type Repr = Option<State>;

    fn decode(&self, repr: &Self::Repr) -> Result<Option<State>, AccessorError> {
        Ok(repr.clone())
    }

    fn encode(&self, state: &State) -> Result<Self::Repr, AccessorError> {
        Ok(Some(state.clone()))
    }
}

/// Host stores the state's name.
#[derive(Clone, Debug)]
pub struct NameCodec {
    states: HashSet<State>,
}

impl NameCodec {
    pub fn new(states: impl IntoIterator<Item = State>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }
}

impl StateCodec for NameCodec {
    type Repr = Option<String>;

    fn decode(&self, repr: &Self::Repr) -> Result<Option<State>, AccessorError> {
        match repr {
            None => Ok(None),
            Some(name) => self
                .states
                .get(name.as_str())
                .cloned()
                .map(Some)
                .ok_or_else(|| AccessorError::UnknownState {
                    state: name.clone(),
                }),
        }
    }

    fn encode(&self, state: &State) -> Result<Self::Repr, AccessorError> {
        if self.states.contains(state) {
            Ok(Some(state.name().to_string()))
        } else {
            Err(AccessorError::UnknownState {
                state: state.name().to_string(),
            })
        }
    }
}

/// Host stores a 1-based index into an explicit state table; `0` is unset.
#[derive(Clone, Debug)]
pub struct IndexCodec {
    table: Vec<State>,
}

impl IndexCodec {
    /// Build a codec over `table`, which must not repeat a state.
    pub fn new(table: Vec<State>) -> Result<Self, AccessorError> {
        let mut seen = HashSet::new();
        for state in &table {
            if !seen.insert(state) {
                return Err(AccessorError::DuplicateState {
                    state: state.name().to_string(),
                });
            }
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &[State] {
        &self.table
    }
}

impl StateCodec for IndexCodec {
    type Repr = i32;

    fn decode(&self, repr: &Self::Repr) -> Result<Option<State>, AccessorError> {
        let index = *repr;
        if index == 0 {
            return Ok(None);
        }

        usize::try_from(index)
            .ok()
            .and_then(|i| self.table.get(i - 1))
            .cloned()
            .map(Some)
            .ok_or(AccessorError::IndexOutOfRange {
                index,
                len: self.table.len(),
            })
    }

    fn encode(&self, state: &State) -> Result<Self::Repr, AccessorError> {
        self.table
            .iter()
            .position(|s| s == state)
            .and_then(|i| i32::try_from(i + 1).ok())
            .ok_or_else(|| AccessorError::UnknownState {
                state: state.name().to_string(),
            })
    }
}
