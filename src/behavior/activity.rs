//! General-purpose activities: synchronous and asynchronous actions,
//! per-invocation factories, and re-raising events.

use super::{Activity, ActivityError, Behavior, BehaviorContext, Fault, Instance};
use crate::core::Event;
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::error::Error;
use std::sync::Arc;

type Action<I> = Box<dyn Fn(&mut BehaviorContext<'_, I>) -> Result<(), Fault> + Send + Sync>;

/// Runs a synchronous closure against the context, then continues.
pub struct ActionActivity<I> {
    action: Action<I>,
    label: String,
}

impl<I: Instance> ActionActivity<I> {
    /// An action that cannot fail.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&mut BehaviorContext<'_, I>) + Send + Sync + 'static,
    {
        Self {
            action: Box::new(move |ctx: &mut BehaviorContext<'_, I>| {
                action(ctx);
                Ok(())
            }),
            label: "then".to_string(),
        }
    }

    /// An action whose error becomes a fault.
    pub fn fallible<F, E>(action: F) -> Self
    where
        F: Fn(&mut BehaviorContext<'_, I>) -> Result<(), E> + Send + Sync + 'static,
        E: Error + Send + Sync + 'static,
    {
        Self {
            action: Box::new(move |ctx: &mut BehaviorContext<'_, I>| {
                action(ctx).map_err(Fault::new)
            }),
            label: "try_then".to_string(),
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl<I: Instance> Activity<I> for ActionActivity<I> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            (self.action)(&mut *ctx)?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("action").with_detail(&self.label)
    }
}

type AsyncAction<I, E> = Box<
    dyn for<'c, 'd> Fn(&'c mut BehaviorContext<'d, I>) -> BoxFuture<'c, Result<(), E>>
        + Send
        + Sync,
>;

/// Awaits an asynchronous closure, then continues.
///
/// # Example
///
/// ```rust
/// use futures::FutureExt;
/// use statecraft::behavior::AsyncActionActivity;
///
/// struct Order {
///     reserved: bool,
/// }
///
/// let reserve = AsyncActionActivity::<Order, std::io::Error>::new(|ctx| {
///     async move {
///         ctx.instance_mut().reserved = true;
///         Ok(())
///     }
///     .boxed()
/// });
/// # let _ = reserve;
/// ```
pub struct AsyncActionActivity<I, E> {
    action: AsyncAction<I, E>,
}

impl<I: Instance, E: Error + Send + Sync + 'static> AsyncActionActivity<I, E> {
    pub fn new<F>(action: F) -> Self
    where
        F: for<'c, 'd> Fn(&'c mut BehaviorContext<'d, I>) -> BoxFuture<'c, Result<(), E>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            action: Box::new(action),
        }
    }
}

impl<I: Instance, E: Error + Send + Sync + 'static> Activity<I> for AsyncActionActivity<I, E> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            (self.action)(&mut *ctx).await.map_err(Fault::new)?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("async-action")
    }
}

type Factory<I> = Box<dyn Fn(&BehaviorContext<'_, I>) -> Arc<dyn Activity<I>> + Send + Sync>;

/// Builds a fresh activity for every invocation and delegates to it.
pub struct FactoryActivity<I> {
    factory: Factory<I>,
}

impl<I: Instance> FactoryActivity<I> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&BehaviorContext<'_, I>) -> Arc<dyn Activity<I>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
        }
    }
}

impl<I: Instance> Activity<I> for FactoryActivity<I> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            let activity = (self.factory)(&*ctx);
            activity.execute(ctx, next).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("factory")
    }
}

/// Raises another event against the same instance, then continues.
pub struct RaiseActivity {
    event: Event,
}

impl RaiseActivity {
    pub fn new(event: Event) -> Self {
        Self { event }
    }
}

impl<I: Instance> Activity<I> for RaiseActivity {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            ctx.raise(&self.event).await.map_err(ActivityError::nested)?;
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("raise").with_detail(self.event.name())
    }
}
