//! Builder API for state machine configuration.
//!
//! Configuration happens once, before any instance is driven:
//! declare states and events, say where the host keeps its state, then bind
//! activity chains to events per state. Every problem found along the way is
//! reported together when [`StateMachineBuilder::build`] runs, so a broken
//! configuration can be fixed in one pass instead of one error at a time.

mod binder;
mod composite;
mod error;
mod field;
mod machine;

pub use binder::EventActivityBinder;
pub use composite::CompositeEventOptions;
pub use error::{BuildError, ConfigurationError};
pub use field::StateField;
pub use machine::StateMachineBuilder;
