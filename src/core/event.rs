//! Signal and data events.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A named trigger raised against an instance.
///
/// Events carry no state of their own; identity is the name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event {
    name: Arc<str>,
}

impl Event {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.name)
    }
}

/// An event whose occurrences carry a payload of type `T`.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{DataEvent, Event};
///
/// let submitted: DataEvent<u64> = DataEvent::new("OrderSubmitted");
/// assert_eq!(submitted.event(), &Event::new("OrderSubmitted"));
/// ```
pub struct DataEvent<T> {
    event: Event,
    _payload: PhantomData<fn() -> T>,
}

impl<T> DataEvent<T> {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            event: Event::new(name),
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.event.name()
    }

    /// The untyped event this data event is raised as.
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}

impl<T> Clone for DataEvent<T> {
    fn clone(&self) -> Self {
        Self {
            event: self.event.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> PartialEq for DataEvent<T> {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event
    }
}

impl<T> Eq for DataEvent<T> {}

impl<T> Hash for DataEvent<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event.hash(state);
    }
}

impl<T> fmt::Debug for DataEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataEvent<{}>({})",
            std::any::type_name::<T>(),
            self.event.name()
        )
    }
}

impl<T> From<DataEvent<T>> for Event {
    fn from(event: DataEvent<T>) -> Self {
        event.event
    }
}

impl<T> AsRef<Event> for DataEvent<T> {
    fn as_ref(&self) -> &Event {
        &self.event
    }
}

impl AsRef<Event> for Event {
    fn as_ref(&self) -> &Event {
        self
    }
}
