//! Constituent tracking for composite events.

use super::{Activity, ActivityError, Behavior, BehaviorContext, Instance};
use crate::accessor::StatePredicate;
use crate::core::{CompositeEventStatus, Event, State};
use crate::machine::ProbeNode;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

type StatusReader<I> = Arc<dyn Fn(&I) -> CompositeEventStatus + Send + Sync>;
type StatusWriter<I> = Arc<dyn Fn(&mut I, CompositeEventStatus) + Send + Sync>;

/// Host field holding a composite event's bitmask.
pub struct CompositeStatusField<I> {
    read: StatusReader<I>,
    write: StatusWriter<I>,
}

impl<I> CompositeStatusField<I> {
    /// Host stores a [`CompositeEventStatus`].
    pub fn status<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> CompositeEventStatus + Send + Sync + 'static,
        W: Fn(&mut I, CompositeEventStatus) + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            write: Arc::new(write),
        }
    }

    /// Host stores the raw bits as an `i32`.
    pub fn bits<R, W>(read: R, write: W) -> Self
    where
        R: Fn(&I) -> i32 + Send + Sync + 'static,
        W: Fn(&mut I, i32) + Send + Sync + 'static,
    {
        Self::status(
            move |instance: &I| CompositeEventStatus::from_bits(read(instance) as u32),
            move |instance: &mut I, status: CompositeEventStatus| {
                write(instance, status.bits() as i32)
            },
        )
    }

    pub fn get(&self, instance: &I) -> CompositeEventStatus {
        (self.read)(instance)
    }

    pub fn set(&self, instance: &mut I, status: CompositeEventStatus) {
        (self.write)(instance, status)
    }
}

impl<I> Clone for CompositeStatusField<I> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            write: Arc::clone(&self.write),
        }
    }
}

/// Records one constituent of a composite event and raises the composite
/// once every constituent has been seen.
///
/// The composite is raised only on the call that completes the mask, so
/// constituents arriving after completion are recorded without raising it
/// again. The mask is never reset by the engine.
pub struct CompositeEventActivity<I> {
    composite: Event,
    flag: u32,
    complete: u32,
    field: CompositeStatusField<I>,
    gate: Option<(Vec<State>, StatePredicate<I>)>,
}

impl<I: Instance> CompositeEventActivity<I> {
    pub fn new(composite: Event, flag: u32, complete: u32, field: CompositeStatusField<I>) -> Self {
        Self {
            composite,
            flag,
            complete,
            field,
            gate: None,
        }
    }

    /// Only raise the composite while the instance is in one of `states`.
    pub fn gated(mut self, states: Vec<State>, predicate: StatePredicate<I>) -> Self {
        self.gate = Some((states, predicate));
        self
    }

    pub fn composite(&self) -> &Event {
        &self.composite
    }

    /// Record this constituent; true when the composite should be raised.
    fn record(&self, instance: &mut I) -> bool {
        let before = self.field.get(instance);
        let after = before.with(self.flag);
        if after != before {
            self.field.set(instance, after);
        }

        let completed = !before.is_complete(self.complete) && after.is_complete(self.complete);
        let gate_open = self
            .gate
            .as_ref()
            .map_or(true, |(_, predicate)| predicate(instance));
        completed && gate_open
    }
}

impl<I: Instance> Activity<I> for CompositeEventActivity<I> {
    fn execute<'a>(
        &'a self,
        ctx: &'a mut BehaviorContext<'_, I>,
        next: &'a Behavior<I>,
    ) -> BoxFuture<'a, Result<(), ActivityError>> {
        async move {
            if self.record(ctx.instance_mut()) {
                tracing::debug!(composite = %self.composite, "composite event complete");
                ctx.raise(&self.composite)
                    .await
                    .map_err(ActivityError::nested)?;
            }
            next.execute(ctx).await
        }
        .boxed()
    }

    fn describe(&self) -> ProbeNode {
        let mut node = ProbeNode::new("composite").with_detail(format!(
            "{} (flag {:#b} of {:#b})",
            self.composite, self.flag, self.complete
        ));
        if let Some((states, _)) = &self.gate {
            node = node.with_children(
                states
                    .iter()
                    .map(|state| ProbeNode::new("gate").with_detail(state.name()))
                    .collect(),
            );
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Order {
        status: i32,
    }

    fn activity() -> CompositeEventActivity<Order> {
        CompositeEventActivity::new(
            Event::new("Ready"),
            0b01,
            0b11,
            CompositeStatusField::bits(|o: &Order| o.status, |o: &mut Order, bits| o.status = bits),
        )
    }

    #[test]
    fn completes_once_every_flag_is_seen() {
        let first = activity();
        let second = CompositeEventActivity::new(
            Event::new("Ready"),
            0b10,
            0b11,
            CompositeStatusField::bits(|o: &Order| o.status, |o: &mut Order, bits| o.status = bits),
        );
        let mut order = Order::default();

        assert!(!first.record(&mut order));
        assert_eq!(order.status, 0b01);
        assert!(second.record(&mut order));
        assert_eq!(order.status, 0b11);
    }

    #[test]
    fn repeated_constituent_after_completion_does_not_fire() {
        let first = activity();
        let mut order = Order { status: 0b11 };

        assert!(!first.record(&mut order));
        assert_eq!(order.status, 0b11);
    }

    #[test]
    fn closed_gate_suppresses_the_composite() {
        let single = CompositeEventActivity::new(
            Event::new("Ready"),
            0b1,
            0b1,
            CompositeStatusField::bits(|o: &Order| o.status, |o: &mut Order, bits| o.status = bits),
        )
        .gated(vec![State::new("Open")], Arc::new(|_: &Order| false));
        let mut order = Order::default();

        assert!(!single.record(&mut order));
        assert_eq!(order.status, 0b1);
    }
}
