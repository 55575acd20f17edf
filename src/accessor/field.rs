//! Accessor over a host field, encoded through a [`StateCodec`].

use super::codec::{HandleCodec, IndexCodec, NameCodec, StateCodec};
use super::error::AccessorError;
use super::{StateAccessor, StateObserver, StatePredicate};
use crate::core::State;
use std::sync::Arc;

type FieldReader<I, R> = Arc<dyn Fn(&I) -> R + Send + Sync>;
type FieldWriter<I, R> = Box<dyn Fn(&mut I, R) + Send + Sync>;

/// Reads and writes the host's current state through explicit closures.
///
/// `set` is idempotent: writing the state the host already holds neither
/// touches the field nor notifies observers.
///
/// # Example
///
/// ```rust
/// use statecraft::accessor::{FieldStateAccessor, StateAccessor};
/// use statecraft::core::State;
///
/// struct Ticket {
///     state: Option<String>,
/// }
///
/// let open = State::new("Open");
/// let accessor = FieldStateAccessor::name(
///     [State::initial(), open.clone()],
///     |t: &Ticket| t.state.clone(),
///     |t: &mut Ticket, s| t.state = s,
/// );
///
/// let mut ticket = Ticket { state: None };
/// accessor.set(&mut ticket, &open).unwrap();
/// assert_eq!(ticket.state.as_deref(), Some("Open"));
/// assert_eq!(accessor.get(&ticket).unwrap(), Some(open));
/// ```
pub struct FieldStateAccessor<I, C: StateCodec> {
    codec: C,
    read: FieldReader<I, C::Repr>,
    write: FieldWriter<I, C::Repr>,
    observers: Vec<Arc<dyn StateObserver<I>>>,
}

impl<I, C: StateCodec> FieldStateAccessor<I, C> {
    pub fn new<R, W>(codec: C, read: R, write: W) -> Self
    where
        R: Fn(&I) -> C::Repr + Send + Sync + 'static,
        W: Fn(&mut I, C::Repr) + Send + Sync + 'static,
    {
        Self {
            codec,
            read: Arc::new(read),
            write: Box::new(write),
            observers: Vec::new(),
        }
    }

    /// Notify `observer` of every state change written through this accessor.
    pub fn with_observer(mut self, observer: Arc<dyn StateObserver<I>>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<I> FieldStateAccessor<I, HandleCodec> {
    /// Host stores an `Option<State>`.
    pub fn handle<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> Option<State> + Send + Sync + 'static,
        W: Fn(&mut I, Option<State>) + Send + Sync + 'static,
    {
        Self::new(HandleCodec, read, write)
    }
}

impl<I> FieldStateAccessor<I, NameCodec> {
    /// Host stores the state name as an `Option<String>`.
    pub fn name<S, R, W>(states: S, read: R, write: W) -> Self
    where
        S: IntoIterator<Item = State>,
        R: Fn(&I) -> Option<String> + Send + Sync + 'static,
        W: Fn(&mut I, Option<String>) + Send + Sync + 'static,
    {
        Self::new(NameCodec::new(states), read, write)
    }
}

impl<I> FieldStateAccessor<I, IndexCodec> {
    /// Host stores an `i32` index into `table` (1-based, `0` when unset).
    pub fn index<R, W>(table: Vec<State>, read: R, write: W) -> Result<Self, AccessorError>
    where
        R: Fn(&I) -> i32 + Send + Sync + 'static,
        W: Fn(&mut I, i32) + Send + Sync + 'static,
    {
        Ok(Self::new(IndexCodec::new(table)?, read, write))
    }
}

impl<I: 'static, C: StateCodec> StateAccessor<I> for FieldStateAccessor<I, C> {
    fn get(&self, instance: &I) -> Result<Option<State>, AccessorError> {
        self.codec.decode(&(self.read)(instance))
    }

    fn set(&self, instance: &mut I, state: &State) -> Result<(), AccessorError> {
        let previous = self.get(instance)?;
        if previous.as_ref() == Some(state) {
            return Ok(());
        }

        let repr = self.codec.encode(state)?;
        (self.write)(instance, repr);

        tracing::trace!(
            current = %state,
            previous = previous.as_ref().map(State::name).unwrap_or("<none>"),
            "state written"
        );
        for observer in &self.observers {
            observer.state_changed(instance, state, previous.as_ref());
        }
        Ok(())
    }

    fn state_predicate(&self, states: &[State]) -> Result<StatePredicate<I>, AccessorError> {
        let reprs = states
            .iter()
            .map(|s| self.codec.encode(s))
            .collect::<Result<Vec<_>, _>>()?;
        let read = Arc::clone(&self.read);

        Ok(Arc::new(move |instance: &I| {
            let current = read(instance);
            reprs.iter().any(|r| *r == current)
        }))
    }
}
