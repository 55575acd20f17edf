//! The state machine façade.
//!
//! A [`StateMachine`] is an immutable description built once by
//! [`StateMachineBuilder`](crate::builder::StateMachineBuilder) and shared
//! across any number of host instances. Raising an event:
//!
//! 1. reads the instance's current state, moving it into `Initial` if it
//!    never had one
//! 2. runs the behavior bound to the event in that state, inside the
//!    observer envelope
//! 3. otherwise accepts the event if the state ignores it
//! 4. otherwise asks the superstate, and so on up the hierarchy
//! 5. otherwise applies the unhandled-event policy
//!
//! Callers serialize raises against one instance; the `&mut I` receiver
//! enforces this.

mod error;
mod observer;
mod probe;
mod unhandled;

pub use error::StateMachineError;
pub use observer::{EventObserver, StateHistoryRecorder};
pub use probe::{BindingDescription, MachineDescription, ProbeNode, StateDescription};
pub use unhandled::{UnhandledEventAction, UnhandledEventPolicy};

use crate::accessor::{InitialIfNullStateAccessor, StateAccessor, StatePredicate};
use crate::behavior::{Behavior, BehaviorContext, Cancellation, EventData, Instance, Payloads};
use crate::core::{DataEvent, Event, State, StateHierarchy};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Predicate deciding whether an ignored event is really ignored.
pub type EventFilter<I> = Arc<dyn Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync>;

/// Bindings of one state.
pub(crate) struct StateNode<I> {
    pub(crate) behaviors: HashMap<Event, Behavior<I>>,
    pub(crate) ignored: HashMap<Event, Option<EventFilter<I>>>,
}

impl<I> Default for StateNode<I> {
    fn default() -> Self {
        Self {
            behaviors: HashMap::new(),
            ignored: HashMap::new(),
        }
    }
}

/// Validated configuration handed over by the builder.
pub(crate) struct MachineParts<I> {
    pub(crate) name: String,
    pub(crate) states: Vec<State>,
    pub(crate) events: Vec<Event>,
    pub(crate) hierarchy: StateHierarchy,
    pub(crate) nodes: HashMap<State, StateNode<I>>,
    pub(crate) accessor: Arc<dyn StateAccessor<I>>,
    pub(crate) unhandled: UnhandledEventPolicy<I>,
    pub(crate) observers: Vec<Arc<dyn EventObserver<I>>>,
}

enum Dispatch {
    Handled,
    Unhandled,
}

/// An event to raise, with everything that travels alongside it.
///
/// # Example
///
/// ```rust
/// use statecraft::behavior::Cancellation;
/// use statecraft::core::Event;
/// use statecraft::machine::RaiseRequest;
///
/// struct Envelope {
///     message_id: u64,
/// }
///
/// let cancellation = Cancellation::new();
/// let request = RaiseRequest::new(&Event::new("Submit"))
///     .payload(Envelope { message_id: 42 })
///     .cancellation(cancellation.clone());
/// # let _ = request;
/// ```
pub struct RaiseRequest {
    event: Event,
    data: Option<EventData>,
    payloads: Payloads,
    cancellation: Cancellation,
}

impl RaiseRequest {
    pub fn new(event: &Event) -> Self {
        Self {
            event: event.clone(),
            data: None,
            payloads: Payloads::new(),
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_data<T: Send + Sync + 'static>(event: &DataEvent<T>, data: T) -> Self {
        Self {
            data: Some(Arc::new(data)),
            ..Self::new(event.event())
        }
    }

    /// Attach an ambient payload readable by every activity.
    pub fn payload<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.payloads = self.payloads.with(value);
        self
    }

    pub fn payloads(mut self, payloads: Payloads) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Hierarchical state machine driving host instances of type `I`.
pub struct StateMachine<I> {
    name: String,
    initial: State,
    final_state: State,
    states: Vec<State>,
    events: Vec<Event>,
    hierarchy: StateHierarchy,
    nodes: HashMap<State, StateNode<I>>,
    accessor: InitialIfNullStateAccessor<I>,
    unhandled: UnhandledEventPolicy<I>,
    observers: Vec<Arc<dyn EventObserver<I>>>,
}

impl<I: Instance> StateMachine<I> {
    pub(crate) fn from_parts(parts: MachineParts<I>) -> Self {
        let MachineParts {
            name,
            states,
            events,
            hierarchy,
            mut nodes,
            accessor,
            unhandled,
            observers,
        } = parts;

        // Lifecycle events are accepted silently unless a state binds them.
        for state in &states {
            let node = nodes.entry(state.clone()).or_default();
            for event in state.lifecycle_events() {
                if !node.behaviors.contains_key(&event) {
                    node.ignored.entry(event).or_insert(None);
                }
            }
        }

        let initial = State::initial();
        Self {
            accessor: InitialIfNullStateAccessor::new(accessor, initial.clone()),
            name,
            initial,
            final_state: State::final_state(),
            states,
            events,
            hierarchy,
            nodes,
            unhandled,
            observers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &State {
        &self.initial
    }

    pub fn final_state(&self) -> &State {
        &self.final_state
    }

    /// Every state, `Initial` and `Final` first, then in declaration order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Declared events, in declaration order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name() == name)
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name() == name)
    }

    pub fn hierarchy(&self) -> &StateHierarchy {
        &self.hierarchy
    }

    pub fn superstate(&self, state: &State) -> Option<&State> {
        self.hierarchy.superstate(state)
    }

    pub fn substates(&self, state: &State) -> &[State] {
        self.hierarchy.substates(state)
    }

    /// True if `other` is `state` or nested anywhere beneath it.
    pub fn has_state(&self, state: &State, other: &State) -> bool {
        self.hierarchy.has_state(state, other)
    }

    /// The host accessor, without initial-state materialization.
    pub fn accessor(&self) -> &dyn StateAccessor<I> {
        self.accessor.inner().as_ref()
    }

    pub async fn raise_event(&self, instance: &mut I, event: &Event) -> Result<(), StateMachineError> {
        self.raise(instance, RaiseRequest::new(event)).await
    }

    pub async fn raise_data_event<T: Send + Sync + 'static>(
        &self,
        instance: &mut I,
        event: &DataEvent<T>,
        data: T,
    ) -> Result<(), StateMachineError> {
        self.raise(instance, RaiseRequest::with_data(event, data)).await
    }

    /// Raise an event with ambient payloads and a cancellation token.
    pub async fn raise(&self, instance: &mut I, request: RaiseRequest) -> Result<(), StateMachineError> {
        let RaiseRequest {
            event,
            data,
            payloads,
            cancellation,
        } = request;

        let mut ctx = BehaviorContext::new(
            self,
            instance,
            event,
            data,
            Arc::new(payloads),
            cancellation,
        );
        let span = tracing::debug_span!(
            "raise",
            machine = %self.name,
            event = %ctx.event(),
            correlation_id = %ctx.correlation_id(),
        );

        async {
            tracing::debug!("event raised");
            let result = self.raise_current(&mut ctx).await;
            if let Err(error) = &result {
                tracing::debug!(error = %error, code = error.error_code(), "raise failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Current state, moving the instance into `Initial` if it has none.
    pub async fn current_state(&self, instance: &mut I) -> Result<State, StateMachineError> {
        let mut ctx = BehaviorContext::new(
            self,
            instance,
            self.initial.enter_event(),
            None,
            Arc::new(Payloads::new()),
            Cancellation::new(),
        );
        self.accessor.current(&mut ctx).await
    }

    /// Current state as stored, without materializing `Initial`.
    pub fn peek_state(&self, instance: &I) -> Result<Option<State>, StateMachineError> {
        Ok(self.accessor.get(instance)?)
    }

    /// True if the instance is in `state` or one of its substates.
    pub fn is_in_state(&self, instance: &I, state: &State) -> Result<bool, StateMachineError> {
        Ok(self
            .peek_state(instance)?
            .is_some_and(|current| self.hierarchy.has_state(state, &current)))
    }

    pub fn is_completed(&self, instance: &I) -> Result<bool, StateMachineError> {
        Ok(self.peek_state(instance)?.as_ref() == Some(&self.final_state))
    }

    /// Predicate that holds while an instance is exactly in one of `states`.
    pub fn state_predicate(&self, states: &[State]) -> Result<StatePredicate<I>, StateMachineError> {
        Ok(self.accessor.state_predicate(states)?)
    }

    /// Declared events with a behavior in `state` or one of its superstates.
    pub fn next_events(&self, state: &State) -> Result<Vec<Event>, StateMachineError> {
        self.node(state)?;
        let levels: Vec<&StateNode<I>> = std::iter::once(state.clone())
            .chain(self.hierarchy.ancestors(state))
            .filter_map(|level| self.nodes.get(&level))
            .collect();

        Ok(self
            .events
            .iter()
            .filter(|event| levels.iter().any(|node| node.behaviors.contains_key(*event)))
            .cloned()
            .collect())
    }

    /// Structure of every state and binding.
    pub fn probe(&self) -> MachineDescription {
        let states = self
            .states
            .iter()
            .map(|state| {
                let node = self.nodes.get(state);

                let mut bindings: Vec<BindingDescription> = node
                    .map(|node| {
                        node.behaviors
                            .iter()
                            .map(|(event, behavior)| BindingDescription {
                                event: event.name().to_string(),
                                activities: behavior.describe(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                bindings.sort_by(|a, b| a.event.cmp(&b.event));

                let lifecycle = state.lifecycle_events();
                let mut ignored: Vec<String> = node
                    .map(|node| {
                        node.ignored
                            .keys()
                            .filter(|event| !lifecycle.contains(*event))
                            .map(|event| event.name().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                ignored.sort();

                StateDescription {
                    name: state.name().to_string(),
                    superstate: self.hierarchy.superstate(state).map(|s| s.name().to_string()),
                    substates: self
                        .hierarchy
                        .substates(state)
                        .iter()
                        .map(|s| s.name().to_string())
                        .collect(),
                    bindings,
                    ignored,
                }
            })
            .collect();

        MachineDescription {
            name: self.name.clone(),
            initial: self.initial.name().to_string(),
            final_state: self.final_state.name().to_string(),
            events: self.events.iter().map(|e| e.name().to_string()).collect(),
            states,
        }
    }

    fn node(&self, state: &State) -> Result<&StateNode<I>, StateMachineError> {
        self.nodes
            .get(state)
            .ok_or_else(|| StateMachineError::UnknownState {
                machine: self.name.clone(),
                state: state.name().to_string(),
            })
    }

    /// Raise the context's event in the instance's current state.
    pub(crate) fn raise_current<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
    ) -> BoxFuture<'a, Result<(), StateMachineError>> {
        async move {
            let state = self.accessor.current(&mut *ctx).await?;
            self.raise_in_state(&state, ctx).await
        }
        .boxed()
    }

    /// Raise the context's event in `state`, delegating up the hierarchy.
    pub(crate) fn raise_in_state<'a>(
        &'a self,
        state: &'a State,
        ctx: &'a mut BehaviorContext<'_, I>,
    ) -> BoxFuture<'a, Result<(), StateMachineError>> {
        async move {
            ctx.set_state(state);
            match self.dispatch(state, &mut *ctx).await? {
                Dispatch::Handled => Ok(()),
                Dispatch::Unhandled => self.unhandled_event(state, ctx),
            }
        }
        .boxed()
    }

    fn dispatch<'a>(
        &'a self,
        state: &'a State,
        ctx: &'a mut BehaviorContext<'_, I>,
    ) -> BoxFuture<'a, Result<Dispatch, StateMachineError>> {
        async move {
            let node = self.node(state)?;

            if let Some(behavior) = node.behaviors.get(ctx.event()) {
                tracing::trace!(state = %state, event = %ctx.event(), "executing behavior");
                self.execute_behavior(behavior, ctx).await?;
                return Ok(Dispatch::Handled);
            }

            if let Some(filter) = node.ignored.get(ctx.event()) {
                if filter.as_ref().map_or(true, |filter| filter(&*ctx)) {
                    tracing::trace!(state = %state, event = %ctx.event(), "event ignored");
                    return Ok(Dispatch::Handled);
                }
            }

            match self.hierarchy.superstate(state) {
                Some(superstate) => self.dispatch(superstate, ctx).await,
                None => Ok(Dispatch::Unhandled),
            }
        }
        .boxed()
    }

    async fn execute_behavior(
        &self,
        behavior: &Behavior<I>,
        ctx: &mut BehaviorContext<'_, I>,
    ) -> Result<(), StateMachineError> {
        for observer in &self.observers {
            observer.pre_execute(ctx);
        }

        let result = behavior.execute(&mut *ctx).await;
        let result = ctx.conclude(result);

        match &result {
            Ok(()) => {
                for observer in &self.observers {
                    observer.post_execute(ctx);
                }
            }
            Err(error) => {
                for observer in &self.observers {
                    observer.execute_fault(ctx, error);
                }
            }
        }
        result
    }

    fn unhandled_event(
        &self,
        state: &State,
        ctx: &BehaviorContext<'_, I>,
    ) -> Result<(), StateMachineError> {
        match self.unhandled.resolve(ctx, state) {
            UnhandledEventAction::Ignore => {
                tracing::trace!(state = %state, event = %ctx.event(), "unhandled event ignored");
                Ok(())
            }
            UnhandledEventAction::Throw => {
                tracing::warn!(
                    machine = %self.name,
                    state = %state,
                    event = %ctx.event(),
                    "unhandled event"
                );
                Err(StateMachineError::UnhandledEvent {
                    machine: self.name.clone(),
                    event: ctx.event().name().to_string(),
                    state: state.name().to_string(),
                })
            }
        }
    }
}

impl<I> fmt::Debug for StateMachine<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("events", &self.events)
            .field("unhandled", &self.unhandled)
            .finish()
    }
}
