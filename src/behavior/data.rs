//! Typed access to a data event's payload.

use super::{Activity, ActivityError, Behavior, BehaviorContext, Fault, Instance};
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::error::Error;
use std::marker::PhantomData;
use thiserror::Error;

/// The event carried no payload, or one of another type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event '{event}' does not carry a payload of type {expected}")]
pub struct DataMismatch {
    pub event: String,
    pub expected: &'static str,
}

type DataAction<I, T> =
    Box<dyn Fn(&mut BehaviorContext<'_, I>, &T) -> Result<(), Fault> + Send + Sync>;

/// Narrows the event payload to `T` and hands it to a closure.
///
/// A missing or mistyped payload is a fault of type [`DataMismatch`].
pub struct DataConverterActivity<I, T> {
    action: DataAction<I, T>,
    _data: PhantomData<fn() -> T>,
}

impl<I: Instance, T: Send + Sync + 'static> DataConverterActivity<I, T> {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&mut BehaviorContext<'_, I>, &T) + Send + Sync + 'static,
    {
        Self {
            action: Box::new(move |ctx: &mut BehaviorContext<'_, I>, data: &T| {
                action(ctx, data);
                Ok(())
            }),
            _data: PhantomData,
        }
    }

    pub fn fallible<F, E>(action: F) -> Self
    where
        F: Fn(&mut BehaviorContext<'_, I>, &T) -> Result<(), E> + Send + Sync + 'static,
        E: Error + Send + Sync + 'static,
    {
        Self {
            action: Box::new(move |ctx: &mut BehaviorContext<'_, I>, data: &T| {
                action(ctx, data).map_err(Fault::new)
            }),
            _data: PhantomData,
        }
    }
}

impl<I: Instance, T: Send + Sync + 'static> Activity<I> for DataConverterActivity<I, T> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            let payload = ctx.raw_data().cloned();
            let data = payload
                .as_deref()
                .and_then(|data| data.downcast_ref::<T>())
                .ok_or_else(|| {
                    Fault::new(DataMismatch {
                        event: ctx.event().name().to_string(),
                        expected: std::any::type_name::<T>(),
                    })
                })?;
            (self.action)(&mut *ctx, data)?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("data").with_detail(std::any::type_name::<T>())
    }
}
