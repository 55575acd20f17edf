//! Reified activity failures.
//!
//! When user logic inside an activity fails, the error is captured as a
//! [`Fault`] and routed down the remaining chain's fault path, where catch
//! and compensate clauses match it by type.

use crate::core::{Event, State};
use crate::machine::StateMachineError;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::error::Error;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Concrete error type a fault was created from.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FaultType {
    type_id: TypeId,
    type_name: &'static str,
}

impl FaultType {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<E: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }
}

// Append-only: entries derive purely from the type and are never invalidated.
static FAULT_TYPES: LazyLock<DashMap<TypeId, Arc<FaultType>>> = LazyLock::new(DashMap::new);

fn fault_type_of<E: 'static>() -> Arc<FaultType> {
    let type_id = TypeId::of::<E>();
    if let Some(existing) = FAULT_TYPES.get(&type_id) {
        return Arc::clone(existing.value());
    }

    let entry = FAULT_TYPES.entry(type_id).or_insert_with(|| {
        Arc::new(FaultType {
            type_id,
            type_name: std::any::type_name::<E>(),
        })
    });
    Arc::clone(entry.value())
}

/// A failure raised by an activity, cheap to clone.
///
/// # Example
///
/// ```rust
/// use statecraft::behavior::Fault;
/// use std::io;
///
/// let fault = Fault::new(io::Error::new(io::ErrorKind::Other, "disk full"));
/// assert!(fault.is::<io::Error>());
/// assert_eq!(fault.to_string(), "disk full");
/// ```
#[derive(Clone)]
pub struct Fault {
    error: Arc<dyn Error + Send + Sync + 'static>,
    fault_type: Arc<FaultType>,
}

impl Fault {
    /// Capture `error`, remembering its concrete type.
    ///
    /// Wrapping a `Fault` returns it unchanged.
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        if let Some(fault) = (&error as &dyn Any).downcast_ref::<Fault>() {
            return fault.clone();
        }
        Self {
            error: Arc::new(error),
            fault_type: fault_type_of::<E>(),
        }
    }

    /// Capture an already type-erased error.
    ///
    /// Type matching still works through downcasting, but the recorded
    /// fault type is the boxed trait object.
    pub fn from_boxed(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        Self {
            error: Arc::from(error),
            fault_type: fault_type_of::<Box<dyn Error + Send + Sync>>(),
        }
    }

    /// Fault carrying a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(FaultMessage(message.into()))
    }

    pub fn fault_type(&self) -> &FaultType {
        &self.fault_type
    }

    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.error
    }

    /// The captured error if it is exactly an `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// The first `E` in the captured error or its `source()` chain.
    pub fn find<E: Error + 'static>(&self) -> Option<&E> {
        let mut current: Option<&(dyn Error + 'static)> = Some(&*self.error);
        while let Some(error) = current {
            if let Some(found) = error.downcast_ref::<E>() {
                return Some(found);
            }
            current = error.source();
        }
        None
    }

    /// True if the error or anything in its source chain is an `E`.
    ///
    /// `Fault` itself matches every fault.
    pub fn is<E: Error + 'static>(&self) -> bool {
        TypeId::of::<E>() == TypeId::of::<Fault>()
            || self.fault_type.is::<E>()
            || self.find::<E>().is_some()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("type", &self.fault_type.type_name)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.error)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FaultMessage(String);

/// How an activity or behavior stopped short of completing.
#[derive(Debug)]
pub enum ActivityError {
    /// The activity itself failed; the invoking behavior routes the fault
    /// to the rest of the chain.
    Faulted(Fault),

    /// The fault traversed a handler or branch chain without being handled.
    Escaped(Fault),

    /// A terminal failure that propagates to the caller untouched.
    Aborted(StateMachineError),
}

impl ActivityError {
    /// Treat a fault that escaped a nested chain as raised by the enclosing
    /// activity.
    pub fn rethrown(self) -> Self {
        match self {
            Self::Escaped(fault) => Self::Faulted(fault),
            other => other,
        }
    }

    /// Convert into the error reported to the caller of a raise.
    pub fn into_machine_error(
        self,
        machine: &str,
        event: &Event,
        state: Option<&State>,
    ) -> StateMachineError {
        match self {
            Self::Faulted(fault) | Self::Escaped(fault) => StateMachineError::EventExecution {
                machine: machine.to_string(),
                event: event.name().to_string(),
                state: state.map(|s| s.name().to_string()).unwrap_or_default(),
                fault,
            },
            Self::Aborted(error) => error,
        }
    }
}

impl From<Fault> for ActivityError {
    fn from(fault: Fault) -> Self {
        Self::Faulted(fault)
    }
}

impl ActivityError {
    /// A nested raise that failed, as a fault of the raising activity.
    pub(crate) fn nested(error: StateMachineError) -> Self {
        Self::Faulted(Fault::new(error))
    }
}

impl From<StateMachineError> for ActivityError {
    fn from(error: StateMachineError) -> Self {
        Self::Aborted(error)
    }
}

impl From<crate::accessor::AccessorError> for ActivityError {
    fn from(error: crate::accessor::AccessorError) -> Self {
        Self::Faulted(Fault::new(error))
    }
}
