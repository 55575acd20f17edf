//! Activities and the behaviors that chain them.
//!
//! A [`Behavior`] is an immutable chain of [`Activity`] nodes ending in a
//! terminal. Executing a behavior runs the first activity and hands it the
//! rest of the chain; the activity decides whether to continue. When an
//! activity faults, the fault is routed down the rest of the chain's fault
//! path instead, where [`CatchActivity`] and [`CompensateActivity`] can
//! match it by type.
//!
//! The terminal decides what an unhandled fault becomes:
//! - a main chain ([`Behavior::new`]) reports it to the caller of the raise
//! - a handler or branch chain ([`Behavior::handler`]) lets it escape to the
//!   activity that owns the chain

mod activity;
mod composite;
mod condition;
mod context;
mod data;
mod exception;
mod fault;
mod transition;

pub use activity::{ActionActivity, AsyncActionActivity, FactoryActivity, RaiseActivity};
pub use composite::{CompositeEventActivity, CompositeStatusField};
pub use condition::ConditionActivity;
pub use context::{BehaviorContext, Cancellation, EventData, Instance, Payloads};
pub use data::{DataConverterActivity, DataMismatch};
pub use exception::{CatchActivity, CompensateActivity};
pub use fault::{ActivityError, Fault, FaultType};
pub use transition::TransitionActivity;

use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;

/// One step of a behavior.
///
/// `execute` receives the remainder of the chain as `next` and should end
/// with `next.execute(ctx)` to continue. Returning
/// [`ActivityError::Faulted`] routes the fault to `next`'s fault path.
pub trait Activity<I>: Send + Sync {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>>;

    /// Called when an earlier activity in the chain faulted.
    ///
    /// Most activities only forward the fault.
    fn faulted<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        fault: Fault,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>>
    where
        I: Instance,
    {
        next.faulted(ctx, fault)
    }

    /// Structure of this activity for [`StateMachine::probe`](crate::machine::StateMachine::probe).
    fn describe(&self) -> ProbeNode;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terminal {
    /// Unhandled faults become an execution error for the caller.
    Complete,
    /// Unhandled faults escape to the owning activity.
    Rethrow,
}

enum Node<I> {
    Terminal(Terminal),
    Activity {
        activity: Arc<dyn Activity<I>>,
        next: Box<Behavior<I>>,
    },
}

/// Immutable chain of activities.
pub struct Behavior<I> {
    node: Node<I>,
}

impl<I: Instance> Behavior<I> {
    /// Main chain bound to a state and event.
    pub fn new(activities: impl IntoIterator<Item = Arc<dyn Activity<I>>>) -> Self {
        Self::chain(activities, Terminal::Complete)
    }

    /// Chain owned by another activity, such as a catch handler or a branch.
    pub fn handler(activities: impl IntoIterator<Item = Arc<dyn Activity<I>>>) -> Self {
        Self::chain(activities, Terminal::Rethrow)
    }

    pub fn empty() -> Self {
        Self {
            node: Node::Terminal(Terminal::Complete),
        }
    }

    fn chain(activities: impl IntoIterator<Item = Arc<dyn Activity<I>>>, terminal: Terminal) -> Self {
        let activities: Vec<_> = activities.into_iter().collect();
        activities.into_iter().rev().fold(
            Self {
                node: Node::Terminal(terminal),
            },
            |next, activity| Self {
                node: Node::Activity {
                    activity,
                    next: Box::new(next),
                },
            },
        )
    }

    pub fn len(&self) -> usize {
        self.activities().count()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.node, Node::Terminal(_))
    }

    pub fn activities(&self) -> impl Iterator<Item = &Arc<dyn Activity<I>>> {
        let mut current = self;
        std::iter::from_fn(move || match &current.node {
            Node::Terminal(_) => None,
            Node::Activity { activity, next } => {
                current = next;
                Some(activity)
            }
        })
    }

    pub fn describe(&self) -> Vec<ProbeNode> {
        self.activities().map(|activity| activity.describe()).collect()
    }

    /// Run the chain.
    ///
    /// Never returns [`ActivityError::Faulted`]: faults are either handled,
    /// escape, or are converted into an execution error by the terminal.
    pub fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        match &self.node {
            Node::Terminal(_) => futures::future::ready(Ok(())).boxed(),
            Node::Activity { activity, next } => async move {
                let result = activity.execute(&mut *ctx, next).await;
                match result {
                    Err(ActivityError::Faulted(fault)) => {
                        tracing::debug!(
                            event = %ctx.event(),
                            fault = %fault,
                            fault_type = fault.fault_type().type_name(),
                            "activity faulted"
                        );
                        next.faulted(ctx, fault).await
                    }
                    other => other,
                }
            }
            .boxed(),
        }
    }

    /// Route `fault` through the chain's fault path.
    pub fn faulted<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        fault: Fault,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        match &self.node {
            Node::Terminal(Terminal::Complete) => {
                let error = ctx.execution_error(fault);
                futures::future::ready(Err(ActivityError::Aborted(error))).boxed()
            }
            Node::Terminal(Terminal::Rethrow) => {
                futures::future::ready(Err(ActivityError::Escaped(fault))).boxed()
            }
            Node::Activity { activity, next } => async move {
                let result = activity.faulted(&mut *ctx, fault, next).await;
                match result {
                    Err(ActivityError::Faulted(fault)) => next.faulted(ctx, fault).await,
                    other => other,
                }
            }
            .boxed(),
        }
    }
}

impl<I: Instance> Default for Behavior<I> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<I: Instance> fmt::Debug for Behavior<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}
