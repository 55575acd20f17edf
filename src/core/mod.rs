//! Core value types of the state machine.
//!
//! This module contains the plain data the engine operates on:
//! - `State` handles and their lifecycle events
//! - Signal and data `Event`s
//! - The superstate/substate `StateHierarchy`
//! - The `CompositeEventStatus` bitmask hosts store
//! - Immutable state change history
//!
//! Nothing here performs I/O or runs user code.

mod composite;
mod event;
mod hierarchy;
mod history;
mod state;

pub use composite::{CompositeEventStatus, MAX_CONSTITUENTS};
pub use event::{DataEvent, Event};
pub use hierarchy::{HierarchyError, StateHierarchy};
pub use history::{StateChange, StateHistory};
pub use state::{State, FINAL, INITIAL};
