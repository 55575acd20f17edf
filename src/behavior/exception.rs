//! Catch and compensate clauses.
//!
//! Both sit on the fault path of a chain and match a fault by error type.
//! They differ in what happens after their handler completes:
//! a catch resumes the main chain, a compensate keeps faulting.

use super::{Activity, ActivityError, Behavior, BehaviorContext, Fault, Instance};
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::error::Error;
use std::marker::PhantomData;

/// Run the handler chain with `fault` visible on the context.
async fn run_handler<I: Instance>(
    handler: &Behavior<I>,
    ctx: &mut BehaviorContext<'_, I>,
    fault: Fault,
) -> Result<(), ActivityError> {
    let mut scoped = ctx.with_fault(fault);
    handler.execute(&mut scoped).await
}

/// Handles faults of type `E` and resumes the main chain.
///
/// If the handler itself faults, the new fault continues down the chain.
pub struct CatchActivity<I, E> {
    handler: Behavior<I>,
    _error: PhantomData<fn() -> E>,
}

impl<I: Instance, E: Error + 'static> CatchActivity<I, E> {
    pub fn new(handler: Behavior<I>) -> Self {
        Self {
            handler,
            _error: PhantomData,
        }
    }
}

impl<I: Instance, E: Error + 'static> Activity<I> for CatchActivity<I, E> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        next.execute(ctx)
    }

    fn faulted<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        fault: Fault,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        if !fault.is::<E>() {
            return next.faulted(ctx, fault);
        }

        async move {
            tracing::debug!(
                event = %ctx.event(),
                fault_type = fault.fault_type().type_name(),
                "fault caught"
            );
            match run_handler(&self.handler, ctx, fault).await {
                Ok(()) => next.execute(ctx).await,
                Err(ActivityError::Escaped(fault) | ActivityError::Faulted(fault)) => {
                    next.faulted(ctx, fault).await
                }
                Err(aborted) => Err(aborted),
            }
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("catch")
            .with_detail(std::any::type_name::<E>())
            .with_children(self.handler.describe())
    }
}

/// Runs a handler for faults of type `E`, then keeps faulting with the
/// original fault.
pub struct CompensateActivity<I, E> {
    handler: Behavior<I>,
    _error: PhantomData<fn() -> E>,
}

impl<I: Instance, E: Error + 'static> CompensateActivity<I, E> {
    pub fn new(handler: Behavior<I>) -> Self {
        Self {
            handler,
            _error: PhantomData,
        }
    }
}

impl<I: Instance, E: Error + 'static> Activity<I> for CompensateActivity<I, E> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        next.execute(ctx)
    }

    fn faulted<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        fault: Fault,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        if !fault.is::<E>() {
            return next.faulted(ctx, fault);
        }

        async move {
            tracing::debug!(
                event = %ctx.event(),
                fault_type = fault.fault_type().type_name(),
                "compensating"
            );
            match run_handler(&self.handler, ctx, fault.clone()).await {
                Ok(()) => next.faulted(ctx, fault).await,
                Err(ActivityError::Escaped(fault) | ActivityError::Faulted(fault)) => {
                    next.faulted(ctx, fault).await
                }
                Err(aborted) => Err(aborted),
            }
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        ProbeNode::new("compensate")
            .with_detail(std::any::type_name::<E>())
            .with_children(self.handler.describe())
    }
}
