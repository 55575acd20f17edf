//! Composite event declarations.

use crate::behavior::CompositeStatusField;
use crate::core::{Event, State};

/// Which states track a composite event's constituents.
///
/// By default every state except `Initial` and `Final` tracks them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeEventOptions {
    include_initial: bool,
    include_final: bool,
    gate: Option<State>,
}

impl CompositeEventOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also track constituents raised while in `Initial`.
    pub fn include_initial(mut self) -> Self {
        self.include_initial = true;
        self
    }

    /// Also track constituents raised while in `Final`.
    pub fn include_final(mut self) -> Self {
        self.include_final = true;
        self
    }

    /// Only raise the composite while the instance is in `state`.
    pub fn when_in(mut self, state: &State) -> Self {
        self.gate = Some(state.clone());
        self
    }

    /// Whether constituents are tracked in `state`.
    pub(crate) fn tracks(&self, state: &State) -> bool {
        (self.include_initial || !state.is_initial()) && (self.include_final || !state.is_final())
    }

    pub(crate) fn gate(&self) -> Option<&State> {
        self.gate.as_ref()
    }
}

pub(crate) struct CompositeDeclaration<I> {
    pub(crate) composite: Event,
    pub(crate) constituents: Vec<Event>,
    pub(crate) field: CompositeStatusField<I>,
    pub(crate) options: CompositeEventOptions,
}

impl<I> CompositeDeclaration<I> {
    /// Mask with one bit per constituent.
    pub(crate) fn complete_mask(&self) -> u32 {
        self.constituents
            .iter()
            .enumerate()
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_skip_initial_and_final() {
        let options = CompositeEventOptions::new();

        assert!(!options.tracks(&State::initial()));
        assert!(!options.tracks(&State::final_state()));
        assert!(options.tracks(&State::new("Waiting")));
    }

    #[test]
    fn included_states_are_tracked() {
        let options = CompositeEventOptions::new().include_initial().include_final();

        assert!(options.tracks(&State::initial()));
        assert!(options.tracks(&State::final_state()));
    }
}
