//! Per-invocation context handed to every activity.

use super::fault::{ActivityError, Fault};
use crate::core::{DataEvent, Event, State};
use crate::machine::{StateMachine, StateMachineError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Host types a machine can drive.
///
/// Any owned, sendable type qualifies; no base type is required.
pub trait Instance: Send + 'static {}

impl<T: Send + 'static> Instance for T {}

/// Type-erased payload of a data event.
pub type EventData = Arc<dyn Any + Send + Sync>;

/// Advisory cancellation signal shared by every context of one raise.
///
/// The engine never aborts a chain on its own; long-running activities are
/// expected to check [`is_cancelled`](Self::is_cancelled).
#[derive(Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Ambient values keyed by type, e.g. the envelope of an inbound message.
///
/// Activities can read payloads but never replace them.
#[derive(Clone, Default)]
pub struct Payloads {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Payloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value`, replacing an earlier payload of the same type.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Payloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payloads")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Everything an activity sees while it runs: the machine, the instance,
/// the triggering event and its payload.
///
/// A context lives for one raise. Lifecycle events and events re-raised from
/// inside an activity get a fresh context over the same instance that shares
/// the payload bag, cancellation signal and correlation id.
pub struct BehaviorContext<'a, I> {
    machine: &'a StateMachine<I>,
    instance: &'a mut I,
    event: Event,
    data: Option<EventData>,
    payloads: Arc<Payloads>,
    cancellation: Cancellation,
    state: Option<State>,
    fault: Option<Fault>,
    correlation_id: Uuid,
}

impl<'a, I> BehaviorContext<'a, I> {
    pub(crate) fn new(
        machine: &'a StateMachine<I>,
        instance: &'a mut I,
        event: Event,
        data: Option<EventData>,
        payloads: Arc<Payloads>,
        cancellation: Cancellation,
    ) -> Self {
        Self {
            machine,
            instance,
            event,
            data,
            payloads,
            cancellation,
            state: None,
            fault: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn machine(&self) -> &'a StateMachine<I> {
        self.machine
    }

    pub fn instance(&self) -> &I {
        self.instance
    }

    pub fn instance_mut(&mut self) -> &mut I {
        self.instance
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Payload of the triggering event, if it is a `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|data| data.downcast_ref::<T>())
    }

    pub fn raw_data(&self) -> Option<&EventData> {
        self.data.as_ref()
    }

    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payloads.get::<T>()
    }

    pub fn payloads(&self) -> &Payloads {
        &self.payloads
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// State the event was raised in, once dispatch reached one.
    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    /// Fault being handled, inside catch and compensate handlers.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Identifier shared by every context of one top-level raise.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl<'a, I: Instance> BehaviorContext<'a, I> {
    /// Raise `event` against the same instance, dispatching on its current state.
    pub async fn raise(&mut self, event: &Event) -> Result<(), StateMachineError> {
        let machine = self.machine;
        let mut child = self.proxy(event.clone(), None);
        machine.raise_current(&mut child).await
    }

    /// Raise a data event against the same instance.
    pub async fn raise_data<T: Send + Sync + 'static>(
        &mut self,
        event: &DataEvent<T>,
        data: T,
    ) -> Result<(), StateMachineError> {
        let machine = self.machine;
        let mut child = self.proxy(event.event().clone(), Some(Arc::new(data)));
        machine.raise_current(&mut child).await
    }

    /// Context for another event over the same instance.
    pub(crate) fn proxy(&mut self, event: Event, data: Option<EventData>) -> BehaviorContext<'_, I> {
        BehaviorContext {
            machine: self.machine,
            instance: &mut *self.instance,
            event,
            data,
            payloads: Arc::clone(&self.payloads),
            cancellation: self.cancellation.clone(),
            state: None,
            fault: None,
            correlation_id: self.correlation_id,
        }
    }

    /// Same event, with `fault` visible to the handler chain.
    pub(crate) fn with_fault(&mut self, fault: Fault) -> BehaviorContext<'_, I> {
        BehaviorContext {
            machine: self.machine,
            instance: &mut *self.instance,
            event: self.event.clone(),
            data: self.data.clone(),
            payloads: Arc::clone(&self.payloads),
            cancellation: self.cancellation.clone(),
            state: self.state.clone(),
            fault: Some(fault),
            correlation_id: self.correlation_id,
        }
    }

    pub(crate) fn set_state(&mut self, state: &State) {
        self.state = Some(state.clone());
    }

    /// Error reported when a fault reaches the end of the main chain.
    pub(crate) fn execution_error(&self, fault: Fault) -> StateMachineError {
        ActivityError::Faulted(fault).into_machine_error(
            self.machine.name(),
            &self.event,
            self.state.as_ref(),
        )
    }

    /// Map the outcome of a behavior into what the caller of a raise sees.
    pub(crate) fn conclude(&self, result: Result<(), ActivityError>) -> Result<(), StateMachineError> {
        result.map_err(|error| {
            error.into_machine_error(self.machine.name(), &self.event, self.state.as_ref())
        })
    }
}

impl<I> fmt::Debug for BehaviorContext<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorContext")
            .field("event", &self.event)
            .field("state", &self.state)
            .field("has_data", &self.data.is_some())
            .field("fault", &self.fault)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Envelope {
        message_id: u64,
    }

    #[test]
    fn payloads_are_keyed_by_type() {
        let payloads = Payloads::new()
            .with(Envelope { message_id: 7 })
            .with("tenant-a".to_string());

        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads.get::<Envelope>(), Some(&Envelope { message_id: 7 }));
        assert_eq!(payloads.get::<String>().map(String::as_str), Some("tenant-a"));
        assert!(payloads.get::<u32>().is_none());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = Cancellation::new();
        let observed = token.clone();

        assert!(!observed.is_cancelled());
        token.cancel();
        assert!(observed.is_cancelled());
    }
}
