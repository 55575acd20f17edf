//! Where a host keeps its current state.

use crate::accessor::{AccessorError, FieldStateAccessor, StateAccessor, StateObserver};
use crate::core::State;
use std::sync::Arc;

type Reader<I, R> = Arc<dyn Fn(&I) -> R + Send + Sync>;
type Writer<I, R> = Arc<dyn Fn(&mut I, R) + Send + Sync>;

enum Field<I> {
    Handle(Reader<I, Option<State>>, Writer<I, Option<State>>),
    Name(Reader<I, Option<String>>, Writer<I, Option<String>>),
    Index {
        read: Reader<I, i32>,
        write: Writer<I, i32>,
        table: Option<Vec<State>>,
    },
}

/// Registration of the host field holding the current state.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::StateField;
///
/// struct Shipment {
///     state: i32,
/// }
///
/// let field = StateField::index(|s: &Shipment| s.state, |s: &mut Shipment, i| s.state = i);
/// # let _ = field;
/// ```
pub struct StateField<I> {
    field: Field<I>,
}

impl<I: 'static> StateField<I> {
    /// Host stores an `Option<State>`.
    pub fn handle<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> Option<State> + Send + Sync + 'static,
        W: Fn(&mut I, Option<State>) + Send + Sync + 'static,
    {
        Self {
            field: Field::Handle(Arc::new(read), Arc::new(write)),
        }
    }

    /// Host stores the state name.
    pub fn name<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> Option<String> + Send + Sync + 'static,
        W: Fn(&mut I, Option<String>) + Send + Sync + 'static,
    {
        Self {
            field: Field::Name(Arc::new(read), Arc::new(write)),
        }
    }

    /// Host stores an `i32` into the default table: `Initial`, `Final`, then
    /// states in declaration order.
    pub fn index<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> i32 + Send + Sync + 'static,
        W: Fn(&mut I, i32) + Send + Sync + 'static,
    {
        Self {
            field: Field::Index {
                read: Arc::new(read),
                write: Arc::new(write),
                table: None,
            },
        }
    }

    /// Host stores an `i32` into `table`, which must list every state once.
    pub fn index_with_table<R, W>(table: Vec<State>, read: R, write: W) -> Self
    where
        R: Fn(&I) -> i32 + Send + Sync + 'static,
        W: Fn(&mut I, i32) + Send + Sync + 'static,
    {
        Self {
            field: Field::Index {
                read: Arc::new(read),
                write: Arc::new(write),
                table: Some(table),
            },
        }
    }

    /// Explicit index table, if one was given.
    pub(crate) fn table(&self) -> Option<&[State]> {
        match &self.field {
            Field::Index {
                table: Some(table), ..
            } => Some(table),
            _ => None,
        }
    }

    /// Build the accessor over the machine's declared `states`.
    pub(crate) fn into_accessor(
        self,
        states: &[State],
        observers: Vec<Arc<dyn StateObserver<I>>>,
    ) -> Result<Arc<dyn StateAccessor<I>>, AccessorError> {
        fn observed<I, C: crate::accessor::StateCodec>(
            accessor: FieldStateAccessor<I, C>,
            observers: Vec<Arc<dyn StateObserver<I>>>,
        ) -> FieldStateAccessor<I, C> {
            observers
                .into_iter()
                .fold(accessor, |accessor, observer| accessor.with_observer(observer))
        }

        let accessor: Arc<dyn StateAccessor<I>> = match self.field {
            Field::Handle(read, write) => Arc::new(observed(
                FieldStateAccessor::handle(
                    move |instance: &I| read(instance),
                    move |instance: &mut I, state| write(instance, state),
                ),
                observers,
            )),
            Field::Name(read, write) => Arc::new(observed(
                FieldStateAccessor::name(
                    states.iter().cloned(),
                    move |instance: &I| read(instance),
                    move |instance: &mut I, name| write(instance, name),
                ),
                observers,
            )),
            Field::Index { read, write, table } => Arc::new(observed(
                FieldStateAccessor::index(
                    table.unwrap_or_else(|| states.to_vec()),
                    move |instance: &I| read(instance),
                    move |instance: &mut I, index| write(instance, index),
                )?,
                observers,
            )),
        };
        Ok(accessor)
    }
}
