//! Superstate/substate containment.
//!
//! The hierarchy is a forest: each state has at most one superstate, and no
//! state may be placed beneath itself. It is assembled once while a machine
//! is configured and only read afterwards.

use super::state::State;
use std::collections::HashMap;
use thiserror::Error;

/// Invalid hierarchy edits, detected at configuration time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("state '{state}' already belongs to superstate '{existing}'")]
    AlreadyHasSuperstate { state: String, existing: String },

    #[error("state '{state}' cannot be a substate of itself")]
    SelfContainment { state: String },

    #[error("state '{state}' cannot be placed under '{superstate}', which it already contains")]
    Cycle { state: String, superstate: String },
}

/// Tree of states keyed by name.
#[derive(Clone, Debug, Default)]
pub struct StateHierarchy {
    parents: HashMap<State, State>,
    children: HashMap<State, Vec<State>>,
}

impl StateHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `state` directly beneath `superstate`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statecraft::core::{State, StateHierarchy};
    ///
    /// let active = State::new("Active");
    /// let running = State::new("Running");
    ///
    /// let mut hierarchy = StateHierarchy::new();
    /// hierarchy.add_substate(&running, &active).unwrap();
    ///
    /// assert!(hierarchy.has_state(&active, &running));
    /// assert!(!hierarchy.has_state(&running, &active));
    /// assert!(hierarchy.add_substate(&active, &running).is_err());
    /// ```
    pub fn add_substate(&mut self, state: &State, superstate: &State) -> Result<(), HierarchyError> {
        if state == superstate {
            return Err(HierarchyError::SelfContainment {
                state: state.name().to_string(),
            });
        }

        if let Some(existing) = self.parents.get(state) {
            return Err(HierarchyError::AlreadyHasSuperstate {
                state: state.name().to_string(),
                existing: existing.name().to_string(),
            });
        }

        if self.has_state(state, superstate) {
            return Err(HierarchyError::Cycle {
                state: state.name().to_string(),
                superstate: superstate.name().to_string(),
            });
        }

        self.parents.insert(state.clone(), superstate.clone());
        self.children
            .entry(superstate.clone())
            .or_default()
            .push(state.clone());
        Ok(())
    }

    pub fn superstate(&self, state: &State) -> Option<&State> {
        self.parents.get(state)
    }

    /// Direct substates, in the order they were added.
    pub fn substates(&self, state: &State) -> &[State] {
        self.children.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if `other` is `state` or any transitive substate of it.
    pub fn has_state(&self, state: &State, other: &State) -> bool {
        let mut current = Some(other);
        while let Some(candidate) = current {
            if candidate == state {
                return true;
            }
            current = self.parents.get(candidate);
        }
        false
    }

    /// Superstates of `state`, innermost first.
    pub fn ancestors(&self, state: &State) -> Vec<State> {
        let mut ancestors = Vec::new();
        let mut current = self.parents.get(state);
        while let Some(parent) = current {
            ancestors.push(parent.clone());
            current = self.parents.get(parent);
        }
        ancestors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (StateHierarchy, State, State, State, State) {
        let outer = State::new("Outer");
        let inner = State::new("Inner");
        let leaf = State::new("Leaf");
        let other = State::new("Other");

        let mut hierarchy = StateHierarchy::new();
        hierarchy.add_substate(&inner, &outer).unwrap();
        hierarchy.add_substate(&leaf, &inner).unwrap();
        (hierarchy, outer, inner, leaf, other)
    }

    #[test]
    fn has_state_is_reflexive_and_transitive() {
        let (hierarchy, outer, inner, leaf, other) = tree();

        assert!(hierarchy.has_state(&leaf, &leaf));
        assert!(hierarchy.has_state(&outer, &leaf));
        assert!(hierarchy.has_state(&inner, &leaf));
        assert!(!hierarchy.has_state(&leaf, &outer));
        assert!(!hierarchy.has_state(&outer, &other));
    }

    #[test]
    fn ancestors_are_listed_innermost_first() {
        let (hierarchy, outer, inner, leaf, _) = tree();

        assert_eq!(hierarchy.ancestors(&leaf), vec![inner.clone(), outer.clone()]);
        assert!(hierarchy.ancestors(&outer).is_empty());
        assert_eq!(hierarchy.substates(&outer), &[inner]);
    }

    #[test]
    fn second_superstate_is_rejected() {
        let (mut hierarchy, _, inner, leaf, other) = tree();

        let result = hierarchy.add_substate(&leaf, &other);
        assert_eq!(
            result,
            Err(HierarchyError::AlreadyHasSuperstate {
                state: "Leaf".to_string(),
                existing: inner.name().to_string(),
            })
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut hierarchy, outer, _, leaf, _) = tree();

        assert!(matches!(
            hierarchy.add_substate(&outer, &leaf),
            Err(HierarchyError::Cycle { .. })
        ));
        assert!(matches!(
            hierarchy.add_substate(&outer, &outer),
            Err(HierarchyError::SelfContainment { .. })
        ));
    }
}
