//! Statecraft: hierarchical, event-driven state machines over plain values
//!
//! A state machine is configured once and then drives any number of host
//! values ("instances"). The host keeps its current state in a field of its
//! own choosing; the machine reads and writes it through an accessor, so no
//! base type or storage format is imposed.
//!
//! # Core Concepts
//!
//! - **State**: named handle, optionally nested in a superstate
//! - **Event**: named signal, optionally carrying a typed payload
//! - **Behavior**: chain of activities bound to an event in a state
//! - **Fault**: an activity failure, routed to catch and compensate clauses
//! - **Composite event**: raised once all of its constituent events were seen
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{StateField, StateMachineBuilder};
//!
//! #[derive(Default)]
//! struct Order {
//!     state: Option<String>,
//!     items: u32,
//! }
//!
//! let mut builder = StateMachineBuilder::<Order>::new("orders");
//! let open = builder.state("Open");
//! let add_item = builder.event("AddItem");
//! let submit = builder.event("Submit");
//!
//! builder.state_field(StateField::name(
//!     |o: &Order| o.state.clone(),
//!     |o: &mut Order, s| o.state = s,
//! ));
//! builder.initially([builder.when(&add_item).then(|ctx| ctx.instance_mut().items += 1).transition_to(&open)]);
//! builder.during(&open, [
//!     builder.when(&add_item).then(|ctx| ctx.instance_mut().items += 1),
//!     builder.when(&submit).finalize(),
//! ]);
//! let machine = builder.build().unwrap();
//!
//! let mut order = Order::default();
//! futures::executor::block_on(async {
//!     machine.raise_event(&mut order, &add_item).await.unwrap();
//!     machine.raise_event(&mut order, &add_item).await.unwrap();
//!     machine.raise_event(&mut order, &submit).await.unwrap();
//! });
//!
//! assert_eq!(order.items, 2);
//! assert!(machine.is_completed(&order).unwrap());
//! ```

pub mod accessor;
pub mod behavior;
pub mod builder;
pub mod core;
pub mod machine;

// Re-export commonly used types
pub use accessor::{AccessorError, StateAccessor};
pub use behavior::{BehaviorContext, Fault};
pub use builder::{BuildError, EventActivityBinder, StateField, StateMachineBuilder};
pub use crate::core::{DataEvent, Event, State};
pub use machine::{StateMachine, StateMachineError, UnhandledEventPolicy};
