//! Builder for constructing state machines.

use super::binder::EventActivityBinder;
use super::composite::{CompositeDeclaration, CompositeEventOptions};
use super::error::{BuildError, ConfigurationError};
use super::field::StateField;
use crate::accessor::{AccessorError, StateAccessor, StateObserver};
use crate::behavior::{
    Activity, Behavior, BehaviorContext, CompositeEventActivity, CompositeStatusField, Instance,
};
use crate::core::{DataEvent, Event, State, StateHierarchy, MAX_CONSTITUENTS};
use crate::machine::{
    EventFilter, EventObserver, MachineParts, StateMachine, StateNode, UnhandledEventPolicy,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

enum Declaration<I> {
    During {
        states: Vec<State>,
        binder: EventActivityBinder<I>,
    },
    DuringAny(EventActivityBinder<I>),
    Ignore {
        state: State,
        event: Event,
        filter: Option<EventFilter<I>>,
    },
    Composite(CompositeDeclaration<I>),
}

/// Builder for constructing state machines.
///
/// States and events are declared first and returned as handles; bindings
/// refer to those handles. Problems are collected as they are found and
/// reported together by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{StateField, StateMachineBuilder};
///
/// #[derive(Default)]
/// struct Door {
///     state: Option<String>,
/// }
///
/// let mut builder = StateMachineBuilder::<Door>::new("door");
/// let open = builder.state("Open");
/// let closed = builder.state("Closed");
/// let push = builder.event("Push");
///
/// builder.state_field(StateField::name(
///     |d: &Door| d.state.clone(),
///     |d: &mut Door, s| d.state = s,
/// ));
/// builder.initially([builder.when(&push).transition_to(&open)]);
/// builder.during(&open, [builder.when(&push).transition_to(&closed)]);
/// builder.during(&closed, [builder.when(&push).transition_to(&open)]);
///
/// let machine = builder.build().unwrap();
/// assert_eq!(machine.states().len(), 4);
/// ```
pub struct StateMachineBuilder<I> {
    name: String,
    states: Vec<State>,
    events: Vec<Event>,
    hierarchy: StateHierarchy,
    state_field: Option<StateField<I>>,
    custom_accessor: Option<Arc<dyn StateAccessor<I>>>,
    state_observers: Vec<Arc<dyn StateObserver<I>>>,
    event_observers: Vec<Arc<dyn EventObserver<I>>>,
    unhandled: UnhandledEventPolicy<I>,
    declarations: Vec<Declaration<I>>,
    problems: Vec<ConfigurationError>,
}

impl<I: Instance> StateMachineBuilder<I> {
    /// Create a builder; `Initial` and `Final` are always declared.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: vec![State::initial(), State::final_state()],
            events: Vec::new(),
            hierarchy: StateHierarchy::new(),
            state_field: None,
            custom_accessor: None,
            state_observers: Vec::new(),
            event_observers: Vec::new(),
            unhandled: UnhandledEventPolicy::default(),
            declarations: Vec::new(),
            problems: Vec::new(),
        }
    }

    pub fn initial_state(&self) -> State {
        State::initial()
    }

    pub fn final_state(&self) -> State {
        State::final_state()
    }

    /// Declare a state.
    pub fn state(&mut self, name: impl Into<Arc<str>>) -> State {
        let state = State::new(name);
        if self.states.contains(&state) {
            self.problems.push(ConfigurationError::DuplicateState {
                state: state.name().to_string(),
            });
        } else {
            self.states.push(state.clone());
        }
        state
    }

    /// Declare a state nested in `superstate`.
    pub fn substate(&mut self, name: impl Into<Arc<str>>, superstate: &State) -> State {
        let state = self.state(name);
        self.assign_superstate(&state, superstate);
        state
    }

    /// Nest an already declared state in `superstate`.
    pub fn assign_superstate(&mut self, state: &State, superstate: &State) -> &mut Self {
        let known = self.require_state(state) & self.require_state(superstate);
        if known {
            if let Err(error) = self.hierarchy.add_substate(state, superstate) {
                self.problems.push(error.into());
            }
        }
        self
    }

    pub fn event(&mut self, name: impl Into<Arc<str>>) -> Event {
        let event = Event::new(name);
        if self.events.contains(&event) {
            self.problems.push(ConfigurationError::DuplicateEvent {
                event: event.name().to_string(),
            });
        } else {
            self.events.push(event.clone());
        }
        event
    }

    pub fn data_event<T>(&mut self, name: impl Into<Arc<str>>) -> DataEvent<T> {
        let event = self.event(name);
        DataEvent::new(event.name())
    }

    /// Start an activity chain for `event`.
    pub fn when(&self, event: impl AsRef<Event>) -> EventActivityBinder<I> {
        EventActivityBinder::when(event)
    }

    pub fn state_field(&mut self, field: StateField<I>) -> &mut Self {
        self.state_field = Some(field);
        self
    }

    /// Use a host-supplied accessor instead of a state field.
    pub fn custom_accessor(&mut self, accessor: Arc<dyn StateAccessor<I>>) -> &mut Self {
        self.custom_accessor = Some(accessor);
        self
    }

    /// Bindings applied while the instance is in `Initial`.
    pub fn initially(&mut self, binders: impl IntoIterator<Item = EventActivityBinder<I>>) -> &mut Self {
        self.during(&State::initial(), binders)
    }

    pub fn during(
        &mut self,
        state: &State,
        binders: impl IntoIterator<Item = EventActivityBinder<I>>,
    ) -> &mut Self {
        self.during_states(std::slice::from_ref(state), binders)
    }

    /// The same bindings in each of `states`.
    pub fn during_states(
        &mut self,
        states: &[State],
        binders: impl IntoIterator<Item = EventActivityBinder<I>>,
    ) -> &mut Self {
        for binder in binders {
            self.declarations.push(Declaration::During {
                states: states.to_vec(),
                binder,
            });
        }
        self
    }

    /// Bindings shared by every state except `Initial` and `Final`.
    ///
    /// They are merged with any other bindings of the same event.
    pub fn during_any(&mut self, binders: impl IntoIterator<Item = EventActivityBinder<I>>) -> &mut Self {
        for binder in binders {
            self.declarations.push(Declaration::DuringAny(binder));
        }
        self
    }

    pub fn when_enter(
        &mut self,
        state: &State,
        bind: impl FnOnce(EventActivityBinder<I>) -> EventActivityBinder<I>,
    ) -> &mut Self {
        let binder = bind(EventActivityBinder::when(state.enter_event()));
        self.during(state, [binder])
    }

    pub fn when_leave(
        &mut self,
        state: &State,
        bind: impl FnOnce(EventActivityBinder<I>) -> EventActivityBinder<I>,
    ) -> &mut Self {
        let binder = bind(EventActivityBinder::when(state.leave_event()));
        self.during(state, [binder])
    }

    /// Runs before `state` is written; the payload is the transition target.
    pub fn before_enter(
        &mut self,
        state: &State,
        bind: impl FnOnce(EventActivityBinder<I>) -> EventActivityBinder<I>,
    ) -> &mut Self {
        let binder = bind(EventActivityBinder::when(state.before_enter_event()));
        self.during(state, [binder])
    }

    /// Runs after `state` was left; the payload is `state` itself.
    pub fn after_leave(
        &mut self,
        state: &State,
        bind: impl FnOnce(EventActivityBinder<I>) -> EventActivityBinder<I>,
    ) -> &mut Self {
        let binder = bind(EventActivityBinder::when(state.after_leave_event()));
        self.during(state, [binder])
    }

    /// Runs when the instance enters `Final`.
    pub fn finally(
        &mut self,
        bind: impl FnOnce(EventActivityBinder<I>) -> EventActivityBinder<I>,
    ) -> &mut Self {
        self.when_enter(&State::final_state(), bind)
    }

    /// Accept `event` in `state` without doing anything.
    pub fn ignore(&mut self, state: &State, event: impl AsRef<Event>) -> &mut Self {
        self.declarations.push(Declaration::Ignore {
            state: state.clone(),
            event: event.as_ref().clone(),
            filter: None,
        });
        self
    }

    /// Accept `event` in `state` only while `filter` holds; otherwise the
    /// event continues to the superstate.
    pub fn ignore_when(
        &mut self,
        state: &State,
        event: impl AsRef<Event>,
        filter: impl Fn(&BehaviorContext<'_, I>) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.declarations.push(Declaration::Ignore {
            state: state.clone(),
            event: event.as_ref().clone(),
            filter: Some(Arc::new(filter)),
        });
        self
    }

    /// Raise `composite` once every one of `constituents` has been raised.
    pub fn composite_event(
        &mut self,
        composite: &Event,
        field: CompositeStatusField<I>,
        constituents: &[Event],
        options: CompositeEventOptions,
    ) -> &mut Self {
        self.declarations
            .push(Declaration::Composite(CompositeDeclaration {
                composite: composite.clone(),
                constituents: constituents.to_vec(),
                field,
                options,
            }));
        self
    }

    pub fn on_unhandled_event(&mut self, policy: UnhandledEventPolicy<I>) -> &mut Self {
        self.unhandled = policy;
        self
    }

    /// Notify `observer` of every state written through the state field.
    pub fn observe_state_changes(&mut self, observer: Arc<dyn StateObserver<I>>) -> &mut Self {
        self.state_observers.push(observer);
        self
    }

    /// Wrap every bound behavior with `observer`'s notifications.
    pub fn observe_events(&mut self, observer: Arc<dyn EventObserver<I>>) -> &mut Self {
        self.event_observers.push(observer);
        self
    }

    fn require_state(&mut self, state: &State) -> bool {
        let known = self.states.contains(state);
        if !known {
            self.problems.push(ConfigurationError::UnknownState {
                state: state.name().to_string(),
            });
        }
        known
    }

    fn is_known_event(&self, event: &Event) -> bool {
        self.events.contains(event)
            || self
                .states
                .iter()
                .any(|state| state.lifecycle_events().contains(event))
    }

    /// States that receive bindings declared with `during_any`.
    fn any_states(&self) -> Vec<State> {
        self.states
            .iter()
            .filter(|state| !state.is_initial() && !state.is_final())
            .cloned()
            .collect()
    }

    /// Check the whole configuration, reporting every problem at once.
    fn validate(&self) -> Validation<(), NonEmptyVec<ConfigurationError>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<ConfigurationError>>> = Vec::new();

        for problem in &self.problems {
            checks.push(Validation::fail(problem.clone()));
        }

        checks.push(self.validate_accessor());

        let mut explicit: HashSet<(State, Event)> = HashSet::new();
        let mut ignored: HashSet<(State, Event)> = HashSet::new();
        let mut bound: HashSet<(State, Event)> = HashSet::new();

        for declaration in &self.declarations {
            match declaration {
                Declaration::During { states, binder } => {
                    let event = binder.event().cloned().unwrap_or_else(|| Event::new(""));
                    checks.push(self.known_event(&event));
                    checks.extend(binder.targets().into_iter().map(|s| self.known_state(s)));
                    for state in states {
                        checks.push(self.known_state(state));
                        let key = (state.clone(), event.clone());
                        checks.push(if explicit.insert(key.clone()) {
                            Validation::success(())
                        } else {
                            Validation::fail(ConfigurationError::DuplicateBinding {
                                state: state.name().to_string(),
                                event: event.name().to_string(),
                            })
                        });
                        bound.insert(key);
                    }
                }
                Declaration::DuringAny(binder) => {
                    let event = binder.event().cloned().unwrap_or_else(|| Event::new(""));
                    checks.push(self.known_event(&event));
                    checks.extend(binder.targets().into_iter().map(|s| self.known_state(s)));
                    for state in self.any_states() {
                        bound.insert((state, event.clone()));
                    }
                }
                Declaration::Ignore { state, event, .. } => {
                    checks.push(self.known_state(state));
                    checks.push(self.known_event(event));
                    ignored.insert((state.clone(), event.clone()));
                }
                Declaration::Composite(composite) => {
                    checks.push(self.validate_composite(composite));
                    for state in self.states.iter().filter(|s| composite.options.tracks(s)) {
                        for event in &composite.constituents {
                            bound.insert((state.clone(), event.clone()));
                        }
                    }
                }
            }
        }

        let mut conflicts: Vec<&(State, Event)> = bound.intersection(&ignored).collect();
        conflicts.sort_by(|a, b| (a.0.name(), a.1.name()).cmp(&(b.0.name(), b.1.name())));
        for (state, event) in conflicts {
            checks.push(Validation::fail(ConfigurationError::BoundAndIgnored {
                state: state.name().to_string(),
                event: event.name().to_string(),
            }));
        }

        Validation::all_vec(checks).map(|_| ())
    }

    fn known_state(&self, state: &State) -> Validation<(), NonEmptyVec<ConfigurationError>> {
        if self.states.contains(state) {
            Validation::success(())
        } else {
            Validation::fail(ConfigurationError::UnknownState {
                state: state.name().to_string(),
            })
        }
    }

    fn known_event(&self, event: &Event) -> Validation<(), NonEmptyVec<ConfigurationError>> {
        if self.is_known_event(event) {
            Validation::success(())
        } else {
            Validation::fail(ConfigurationError::UnknownEvent {
                event: event.name().to_string(),
            })
        }
    }

    fn validate_accessor(&self) -> Validation<(), NonEmptyVec<ConfigurationError>> {
        if self.custom_accessor.is_some() {
            return if self.state_observers.is_empty() {
                Validation::success(())
            } else {
                Validation::fail(ConfigurationError::ObserversWithCustomAccessor)
            };
        }

        let Some(field) = &self.state_field else {
            return Validation::fail(ConfigurationError::MissingStateField);
        };

        let mut checks: Vec<Validation<(), NonEmptyVec<ConfigurationError>>> = Vec::new();
        if let Some(table) = field.table() {
            let mut seen = HashSet::new();
            for state in table {
                if !seen.insert(state) {
                    checks.push(Validation::fail(ConfigurationError::StateTable(
                        AccessorError::DuplicateState {
                            state: state.name().to_string(),
                        },
                    )));
                }
            }
            for state in &self.states {
                if !table.contains(state) {
                    checks.push(Validation::fail(ConfigurationError::IndexTableIncomplete {
                        state: state.name().to_string(),
                    }));
                }
            }
        }
        checks.push(Validation::success(()));
        Validation::all_vec(checks).map(|_| ())
    }

    fn validate_composite(
        &self,
        composite: &CompositeDeclaration<I>,
    ) -> Validation<(), NonEmptyVec<ConfigurationError>> {
        let name = composite.composite.name().to_string();
        let mut checks = vec![self.known_event(&composite.composite)];

        let count = composite.constituents.len();
        if count == 0 || count > MAX_CONSTITUENTS {
            checks.push(Validation::fail(ConfigurationError::ConstituentCount {
                composite: name.clone(),
                count,
                max: MAX_CONSTITUENTS,
            }));
        }

        let mut seen = HashSet::new();
        for event in &composite.constituents {
            checks.push(self.known_event(event));
            if !seen.insert(event) {
                checks.push(Validation::fail(ConfigurationError::DuplicateConstituent {
                    composite: name.clone(),
                    event: event.name().to_string(),
                }));
            }
        }

        if let Some(gate) = composite.options.gate() {
            checks.push(self.known_state(gate));
        }

        Validation::all_vec(checks).map(|_| ())
    }

    /// Build the state machine.
    /// Returns every configuration problem if any was found.
    pub fn build(mut self) -> Result<StateMachine<I>, BuildError> {
        if let Validation::Failure(errors) = self.validate() {
            let errors: Vec<ConfigurationError> = errors.iter().cloned().collect();
            tracing::debug!(machine = %self.name, problems = errors.len(), "configuration rejected");
            return Err(BuildError::Invalid(errors));
        }

        let accessor = match (self.custom_accessor.take(), self.state_field.take()) {
            (Some(accessor), _) => accessor,
            (None, Some(field)) => field
                .into_accessor(&self.states, std::mem::take(&mut self.state_observers))
                .map_err(|error| BuildError::Invalid(vec![error.into()]))?,
            (None, None) => return Err(BuildError::Invalid(vec![ConfigurationError::MissingStateField])),
        };

        let any_states = self.any_states();
        let mut activities: HashMap<(State, Event), Vec<Arc<dyn Activity<I>>>> = HashMap::new();
        let mut order: Vec<(State, Event)> = Vec::new();
        let mut nodes: HashMap<State, StateNode<I>> = HashMap::new();

        let mut append = |state: &State, event: &Event, chain: &[Arc<dyn Activity<I>>]| {
            let key = (state.clone(), event.clone());
            activities
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .extend(chain.iter().cloned());
        };

        for declaration in std::mem::take(&mut self.declarations) {
            match declaration {
                Declaration::During { states, binder } => {
                    let Some(event) = binder.event().cloned() else {
                        continue;
                    };
                    let chain = binder.into_activities(&accessor);
                    for state in &states {
                        append(state, &event, &chain);
                    }
                }
                Declaration::DuringAny(binder) => {
                    let Some(event) = binder.event().cloned() else {
                        continue;
                    };
                    let chain = binder.into_activities(&accessor);
                    for state in &any_states {
                        append(state, &event, &chain);
                    }
                }
                Declaration::Ignore {
                    state,
                    event,
                    filter,
                } => {
                    nodes.entry(state).or_default().ignored.insert(event, filter);
                }
                Declaration::Composite(composite) => {
                    let complete = composite.complete_mask();
                    let gate = match composite.options.gate() {
                        Some(state) => {
                            let predicate = accessor
                                .state_predicate(std::slice::from_ref(state))
                                .map_err(|error| BuildError::Invalid(vec![error.into()]))?;
                            Some((state.clone(), predicate))
                        }
                        None => None,
                    };

                    for (bit, constituent) in composite.constituents.iter().enumerate() {
                        let mut marker = CompositeEventActivity::new(
                            composite.composite.clone(),
                            1 << bit,
                            complete,
                            composite.field.clone(),
                        );
                        if let Some((state, predicate)) = &gate {
                            marker = marker.gated(vec![state.clone()], Arc::clone(predicate));
                        }
                        let marker: Arc<dyn Activity<I>> = Arc::new(marker);
                        for state in self.states.iter().filter(|s| composite.options.tracks(s)) {
                            append(state, constituent, std::slice::from_ref(&marker));
                        }
                    }
                }
            }
        }

        for key in order {
            if let Some(chain) = activities.remove(&key) {
                let (state, event) = key;
                nodes
                    .entry(state)
                    .or_default()
                    .behaviors
                    .insert(event, Behavior::new(chain));
            }
        }

        tracing::debug!(
            machine = %self.name,
            states = self.states.len(),
            events = self.events.len(),
            "state machine built"
        );

        Ok(StateMachine::from_parts(MachineParts {
            name: self.name,
            states: self.states,
            events: self.events,
            hierarchy: self.hierarchy,
            nodes,
            accessor,
            unhandled: self.unhandled,
            observers: self.event_observers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HierarchyError;

    #[derive(Default)]
    struct Job {
        state: Option<String>,
        status: i32,
    }

    fn builder() -> StateMachineBuilder<Job> {
        let mut builder = StateMachineBuilder::new("jobs");
        builder.state_field(StateField::name(
            |j: &Job| j.state.clone(),
            |j: &mut Job, s| j.state = s,
        ));
        builder
    }

    fn problems(result: Result<StateMachine<Job>, BuildError>) -> Vec<ConfigurationError> {
        match result {
            Err(error) => error.errors().to_vec(),
            Ok(_) => panic!("Expected configuration errors, got a machine"),
        }
    }

    #[test]
    fn builder_requires_a_state_field() {
        let result = StateMachineBuilder::<Job>::new("jobs").build();

        assert_eq!(problems(result), vec![ConfigurationError::MissingStateField]);
    }

    #[test]
    fn builder_accumulates_all_problems() {
        let mut builder = builder();
        let running = builder.state("Running");
        builder.state("Running");
        let start = builder.event("Start");
        builder.event("Start");
        let elsewhere = State::new("Elsewhere");

        builder.during(&running, [builder.when(&start).transition_to(&elsewhere)]);
        builder.during(&running, [builder.when(&start)]);

        let problems = problems(builder.build());
        assert_eq!(problems.len(), 4);
        assert!(problems.contains(&ConfigurationError::DuplicateState {
            state: "Running".to_string()
        }));
        assert!(problems.contains(&ConfigurationError::DuplicateEvent {
            event: "Start".to_string()
        }));
        assert!(problems.contains(&ConfigurationError::UnknownState {
            state: "Elsewhere".to_string()
        }));
        assert!(problems.contains(&ConfigurationError::DuplicateBinding {
            state: "Running".to_string(),
            event: "Start".to_string()
        }));
    }

    #[test]
    fn hierarchy_cycles_are_rejected() {
        let mut builder = builder();
        let outer = builder.state("Outer");
        let inner = builder.substate("Inner", &outer);
        builder.assign_superstate(&outer, &inner);

        let problems = problems(builder.build());
        assert!(matches!(
            problems.as_slice(),
            [ConfigurationError::Hierarchy(HierarchyError::AlreadyHasSuperstate { .. })]
                | [ConfigurationError::Hierarchy(HierarchyError::Cycle { .. })]
        ));
    }

    #[test]
    fn bound_and_ignored_event_is_rejected() {
        let mut builder = builder();
        let running = builder.state("Running");
        let poke = builder.event("Poke");
        builder.during(&running, [builder.when(&poke).then(|_| {})]);
        builder.ignore(&running, &poke);

        assert_eq!(
            problems(builder.build()),
            vec![ConfigurationError::BoundAndIgnored {
                state: "Running".to_string(),
                event: "Poke".to_string()
            }]
        );
    }

    #[test]
    fn composite_constituents_are_checked() {
        let mut builder = builder();
        builder.state("Waiting");
        let ready = builder.event("Ready");
        let first = builder.event("First");
        let field = CompositeStatusField::bits(|j: &Job| j.status, |j: &mut Job, b| j.status = b);

        builder.composite_event(
            &ready,
            field.clone(),
            &[first.clone(), first.clone()],
            CompositeEventOptions::new(),
        );
        builder.composite_event(&ready, field, &[], CompositeEventOptions::new());

        let problems = problems(builder.build());
        assert!(problems.contains(&ConfigurationError::DuplicateConstituent {
            composite: "Ready".to_string(),
            event: "First".to_string()
        }));
        assert!(problems.contains(&ConfigurationError::ConstituentCount {
            composite: "Ready".to_string(),
            count: 0,
            max: MAX_CONSTITUENTS
        }));
    }

    #[test]
    fn index_table_must_cover_every_state() {
        let mut builder = StateMachineBuilder::<Job>::new("jobs");
        let running = builder.state("Running");
        builder.state_field(StateField::index_with_table(
            vec![State::initial(), running],
            |j: &Job| j.status,
            |j: &mut Job, i| j.status = i,
        ));

        assert_eq!(
            problems(builder.build()),
            vec![ConfigurationError::IndexTableIncomplete {
                state: "Final".to_string()
            }]
        );
    }

    #[test]
    fn during_any_merges_with_explicit_bindings() {
        let mut builder = builder();
        let running = builder.state("Running");
        let poke = builder.event("Poke");
        builder.during(&running, [builder.when(&poke).then(|_| {})]);
        builder.during_any([builder.when(&poke).then(|_| {})]);

        let machine = builder.build().unwrap();
        let probe = machine.probe();
        let binding = probe.state("Running").unwrap().binding("Poke").unwrap();
        assert_eq!(binding.activities.len(), 2);
        assert!(probe.state("Initial").unwrap().binding("Poke").is_none());
    }
}
