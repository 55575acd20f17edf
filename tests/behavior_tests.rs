//! Activity chains: faults, branches, data, nested raises and composites.

use futures::FutureExt;
use statecraft::behavior::{BehaviorContext, Cancellation, CompositeStatusField, DataMismatch};
use statecraft::builder::{CompositeEventOptions, StateField, StateMachineBuilder};
use statecraft::core::{DataEvent, Event, State};
use statecraft::machine::{RaiseRequest, StateMachine, StateMachineError};

#[derive(Debug, thiserror::Error)]
#[error("payment declined")]
struct Declined;

#[derive(Debug, thiserror::Error)]
#[error("out of stock")]
struct OutOfStock;

#[derive(Debug, Default)]
struct Order {
    state: Option<String>,
    log: Vec<String>,
    total: u32,
    status: i32,
}

fn note(label: &'static str) -> impl Fn(&mut BehaviorContext<'_, Order>) + Send + Sync + 'static {
    move |ctx: &mut BehaviorContext<'_, Order>| ctx.instance_mut().log.push(label.to_string())
}

fn builder(name: &str) -> StateMachineBuilder<Order> {
    let mut builder = StateMachineBuilder::new(name);
    builder.state_field(StateField::name(
        |o: &Order| o.state.clone(),
        |o: &mut Order, s| o.state = s,
    ));
    builder
}

struct Checkout {
    machine: StateMachine<Order>,
    pay: Event,
}

/// Bind `Pay` in `Initial` to whatever `bind` builds; `Paid` is available
/// as a target.
fn checkout(
    bind: impl FnOnce(statecraft::EventActivityBinder<Order>, &State) -> statecraft::EventActivityBinder<Order>,
) -> Checkout {
    let mut builder = builder("checkout");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    builder.initially([bind(builder.when(&pay), &paid)]);
    Checkout {
        machine: builder.build().unwrap(),
        pay,
    }
}

fn fault_of(error: &StateMachineError) -> &statecraft::Fault {
    error.fault().expect("execution error carries a fault")
}

#[tokio::test]
async fn catch_handles_the_fault_and_resumes() {
    let c = checkout(|b, paid| {
        b.then(note("charging"))
            .try_then(|_| Err(Declined))
            .then(note("unreachable"))
            .catch::<Declined>(|h| {
                h.then(|ctx| {
                    let message = ctx.fault().map(|f| f.to_string()).unwrap_or_default();
                    ctx.instance_mut().log.push(format!("caught: {message}"));
                })
            })
            .then(note("resumed"))
            .transition_to(paid)
    });
    let mut order = Order::default();

    c.machine.raise_event(&mut order, &c.pay).await.unwrap();

    assert_eq!(order.log, ["charging", "caught: payment declined", "resumed"]);
    assert_eq!(order.state.as_deref(), Some("Paid"));
}

#[tokio::test]
async fn compensate_runs_its_handler_and_keeps_faulting() {
    let c = checkout(|b, paid| {
        b.try_then(|_| Err(Declined))
            .compensate::<Declined>(|h| h.then(note("refunded")))
            .transition_to(paid)
    });
    let mut order = Order::default();

    let error = c.machine.raise_event(&mut order, &c.pay).await.unwrap_err();

    assert!(fault_of(&error).is::<Declined>());
    assert_eq!(error.error_code(), "EVENT_EXECUTION");
    assert_eq!(order.log, ["refunded"]);
    assert_eq!(order.state.as_deref(), Some("Initial"));
}

#[tokio::test]
async fn handlers_for_other_fault_types_are_skipped() {
    let c = checkout(|b, _| {
        b.try_then(|_| Err(OutOfStock))
            .catch::<Declined>(|h| h.then(note("wrong handler")))
    });
    let mut order = Order::default();

    let error = c.machine.raise_event(&mut order, &c.pay).await.unwrap_err();

    assert!(fault_of(&error).downcast_ref::<OutOfStock>().is_some());
    assert!(order.log.is_empty());
}

#[tokio::test]
async fn fault_raised_by_a_handler_continues_down_the_chain() {
    let c = checkout(|b, _| {
        b.try_then(|_| Err(Declined))
            .catch::<Declined>(|h| h.try_then(|_| Err(OutOfStock)))
            .catch::<OutOfStock>(|h| h.then(note("restocked")))
    });
    let mut order = Order::default();

    c.machine.raise_event(&mut order, &c.pay).await.unwrap();

    assert_eq!(order.log, ["restocked"]);
}

#[tokio::test]
async fn compensated_fault_can_still_be_caught() {
    let c = checkout(|b, paid| {
        b.try_then(|_| Err(Declined))
            .compensate::<Declined>(|h| h.then(note("refunded")))
            .catch::<Declined>(|h| h.then(note("recovered")))
            .transition_to(paid)
    });
    let mut order = Order::default();

    c.machine.raise_event(&mut order, &c.pay).await.unwrap();

    assert_eq!(order.log, ["refunded", "recovered"]);
    assert_eq!(order.state.as_deref(), Some("Paid"));
}

#[tokio::test]
async fn async_actions_run_in_order() {
    let c = checkout(|b, _| {
        b.then(note("before"))
            .then_async(|ctx| {
                async move {
                    tokio::task::yield_now().await;
                    ctx.instance_mut().log.push("async".to_string());
                    Ok::<(), Declined>(())
                }
                .boxed()
            })
            .then(note("after"))
    });
    let mut order = Order::default();

    c.machine.raise_event(&mut order, &c.pay).await.unwrap();

    assert_eq!(order.log, ["before", "async", "after"]);
}

struct Review {
    machine: StateMachine<Order>,
    pay: DataEvent<u32>,
}

fn review() -> Review {
    let mut builder = builder("review");
    let paid = builder.state("Paid");
    let flagged = builder.state("Flagged");
    let pay = builder.data_event::<u32>("Pay");

    builder.initially([builder
        .when(&pay)
        .then_data(|ctx, amount: &u32| ctx.instance_mut().total += *amount)
        .if_else(
            |ctx| ctx.data::<u32>().is_some_and(|amount| *amount > 100),
            |b| b.then(note("flagged")).transition_to(&flagged),
            |b| b.transition_to(&paid),
        )]);

    Review {
        machine: builder.build().unwrap(),
        pay,
    }
}

#[tokio::test]
async fn branches_follow_the_event_payload() {
    let r = review();

    let mut small = Order::default();
    r.machine.raise_data_event(&mut small, &r.pay, 40).await.unwrap();
    assert_eq!(small.total, 40);
    assert_eq!(small.state.as_deref(), Some("Paid"));

    let mut large = Order::default();
    r.machine.raise_data_event(&mut large, &r.pay, 400).await.unwrap();
    assert_eq!(large.log, ["flagged"]);
    assert_eq!(large.state.as_deref(), Some("Flagged"));
}

#[tokio::test]
async fn missing_payload_faults_the_chain() {
    let r = review();
    let mut order = Order::default();

    let error = r.machine.raise_event(&mut order, r.pay.event()).await.unwrap_err();

    let mismatch = fault_of(&error).downcast_ref::<DataMismatch>().unwrap();
    assert_eq!(mismatch.event, "Pay");
    assert_eq!(order.total, 0);
}

#[tokio::test]
async fn raised_events_dispatch_on_the_new_state() {
    let mut builder = builder("shipping");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    let ship = builder.event("Ship");
    builder.initially([builder
        .when(&pay)
        .transition_to(&paid)
        .raise(&ship)
        .then(note("after ship"))]);
    builder.during(&paid, [builder.when(&ship).then(note("shipped"))]);
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    machine.raise_event(&mut order, &pay).await.unwrap();

    assert_eq!(order.log, ["shipped", "after ship"]);
}

#[tokio::test]
async fn unhandled_nested_raise_faults_the_outer_event() {
    let mut builder = builder("shipping");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    let ship = builder.event("Ship");
    builder.initially([builder
        .when(&pay)
        .transition_to(&paid)
        .raise(&ship)
        .then(note("unreachable"))]);
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    let error = machine.raise_event(&mut order, &pay).await.unwrap_err();

    assert_eq!(error.error_code(), "EVENT_EXECUTION");
    match fault_of(&error).downcast_ref::<StateMachineError>() {
        Some(StateMachineError::UnhandledEvent { event, state, .. }) => {
            assert_eq!(event, "Ship");
            assert_eq!(state, "Paid");
        }
        other => panic!("Expected UnhandledEvent, got {other:?}"),
    }
    assert!(order.log.is_empty());
}

#[tokio::test]
async fn enter_fault_is_caught_after_the_transition() {
    let mut builder = builder("checkout");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    builder.initially([builder
        .when(&pay)
        .transition_to(&paid)
        .catch::<Declined>(|h| h.then(note("caught")))
        .then(note("after"))]);
    builder.when_enter(&paid, |b| b.try_then(|_| Err(Declined)));
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    machine.raise_event(&mut order, &pay).await.unwrap();

    assert_eq!(order.log, ["caught", "after"]);
    assert_eq!(order.state.as_deref(), Some("Paid"));
}

#[tokio::test]
async fn uncaught_enter_fault_keeps_its_type() {
    let mut builder = builder("checkout");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    builder.initially([builder
        .when(&pay)
        .transition_to(&paid)
        .compensate::<Declined>(|h| h.then(note("refunded")))
        .then(note("unreachable"))]);
    builder.when_enter(&paid, |b| b.try_then(|_| Err(Declined)));
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    let error = machine.raise_event(&mut order, &pay).await.unwrap_err();

    assert!(fault_of(&error).is::<Declined>());
    assert_eq!(order.log, ["refunded"]);
}

#[tokio::test]
async fn fault_in_a_raised_event_is_caught_by_the_raiser() {
    let mut builder = builder("checkout");
    let pay = builder.event("Pay");
    let charge = builder.event("Charge");
    builder.initially([
        builder
            .when(&pay)
            .raise(&charge)
            .then(note("unreachable"))
            .catch::<Declined>(|h| {
                h.then(|ctx| {
                    let caught = ctx.fault().is_some_and(|f| f.is::<Declined>());
                    ctx.instance_mut().log.push(format!("caught: {caught}"));
                })
            })
            .then(note("after")),
        builder.when(&charge).then(note("charging")).try_then(|_| Err(Declined)),
    ]);
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    machine.raise_event(&mut order, &pay).await.unwrap();

    assert_eq!(order.log, ["charging", "caught: true", "after"]);
}

#[tokio::test]
async fn catch_any_handles_every_fault_type() {
    let c = checkout(|b, paid| {
        b.try_then(|_| Err(OutOfStock))
            .catch::<Declined>(|h| h.then(note("declined")))
            .catch_any(|h| {
                h.then(|ctx| {
                    let message = ctx.fault().map(|f| f.to_string()).unwrap_or_default();
                    ctx.instance_mut().log.push(format!("any: {message}"));
                })
            })
            .transition_to(paid)
    });
    let mut order = Order::default();

    c.machine.raise_event(&mut order, &c.pay).await.unwrap();

    assert_eq!(order.log, ["any: out of stock"]);
    assert_eq!(order.state.as_deref(), Some("Paid"));
}

#[tokio::test]
async fn compensate_any_runs_for_every_fault_type() {
    let c = checkout(|b, paid| {
        b.try_then(|_| Err(OutOfStock))
            .compensate_any(|h| h.then(note("rolled back")))
            .transition_to(paid)
    });
    let mut order = Order::default();

    let error = c.machine.raise_event(&mut order, &c.pay).await.unwrap_err();

    assert!(fault_of(&error).is::<OutOfStock>());
    assert_eq!(order.log, ["rolled back"]);
    assert_eq!(order.state.as_deref(), Some("Initial"));
}

#[tokio::test]
async fn composite_fault_is_reported_on_the_completing_event() {
    let mut builder = builder("fulfilment");
    let waiting = builder.state("Waiting");
    let create = builder.event("Create");
    let payment = builder.event("PaymentReceived");
    let packed = builder.event("Packed");
    let ready = builder.event("Ready");
    builder.initially([builder.when(&create).transition_to(&waiting)]);
    builder.during(&waiting, [
        builder.when(&payment).then(note("paid")),
        builder.when(&packed).then(note("packed")),
        builder.when(&ready).try_then(|_| Err(OutOfStock)),
    ]);
    builder.composite_event(
        &ready,
        CompositeStatusField::bits(|o: &Order| o.status, |o: &mut Order, bits| o.status = bits),
        &[payment.clone(), packed.clone()],
        CompositeEventOptions::new(),
    );
    let machine = builder.build().unwrap();
    let mut order = Order::default();
    machine.raise_event(&mut order, &create).await.unwrap();
    machine.raise_event(&mut order, &payment).await.unwrap();

    let error = machine.raise_event(&mut order, &packed).await.unwrap_err();

    match &error {
        StateMachineError::EventExecution { event, fault, .. } => {
            assert_eq!(event, "Packed");
            assert!(fault.is::<OutOfStock>());
        }
        other => panic!("Expected EventExecution, got {other:?}"),
    }
    assert_eq!(order.log, ["paid", "packed"]);
}

#[derive(Debug)]
struct Tenant(&'static str);

#[tokio::test]
async fn payloads_and_cancellation_reach_lifecycle_activities() {
    let mut builder = builder("tenants");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    let tenant_of = |ctx: &mut BehaviorContext<'_, Order>| {
        let entry = format!(
            "{}:{}:{}",
            ctx.event(),
            ctx.payload::<Tenant>().map_or("-", |t| t.0),
            ctx.is_cancelled()
        );
        ctx.instance_mut().log.push(entry);
    };
    builder.initially([builder.when(&pay).then(tenant_of).transition_to(&paid)]);
    builder.when_enter(&paid, |b| b.then(tenant_of));
    let machine = builder.build().unwrap();

    let cancellation = Cancellation::new();
    cancellation.cancel();
    let request = RaiseRequest::new(&pay)
        .payload(Tenant("acme"))
        .cancellation(cancellation);
    let mut order = Order::default();

    machine.raise(&mut order, request).await.unwrap();

    assert_eq!(order.log, ["Pay:acme:true", "Paid.Enter:acme:true"]);
}

#[tokio::test]
async fn lifecycle_contexts_share_the_correlation_id() {
    let mut builder = builder("correlation");
    let paid = builder.state("Paid");
    let pay = builder.event("Pay");
    let correlate = |ctx: &mut BehaviorContext<'_, Order>| {
        let id = ctx.correlation_id().to_string();
        ctx.instance_mut().log.push(id);
    };
    builder.initially([builder.when(&pay).then(correlate).transition_to(&paid)]);
    builder.when_enter(&paid, |b| b.then(correlate));
    let machine = builder.build().unwrap();
    let mut order = Order::default();

    machine.raise_event(&mut order, &pay).await.unwrap();

    assert_eq!(order.log.len(), 2);
    assert_eq!(order.log[0], order.log[1]);
}

struct Fulfilment {
    machine: StateMachine<Order>,
    create: Event,
    release: Event,
    payment: Event,
    packed: Event,
}

fn fulfilment(options: impl FnOnce(&State) -> CompositeEventOptions) -> Fulfilment {
    let mut builder = builder("fulfilment");
    let held = builder.state("Held");
    let waiting = builder.state("Waiting");
    let done = builder.state("Done");
    let create = builder.event("Create");
    let release = builder.event("Release");
    let payment = builder.event("PaymentReceived");
    let packed = builder.event("Packed");
    let ready = builder.event("Ready");

    builder.initially([builder.when(&create).transition_to(&waiting)]);
    builder.during(&waiting, [
        builder.when(&release).transition_to(&held),
        builder.when(&ready).then(note("ready")).transition_to(&done),
    ]);
    builder.during(&held, [builder.when(&release).transition_to(&waiting)]);
    builder.composite_event(
        &ready,
        CompositeStatusField::bits(|o: &Order| o.status, |o: &mut Order, bits| o.status = bits),
        &[payment.clone(), packed.clone()],
        options(&waiting),
    );

    Fulfilment {
        machine: builder.build().unwrap(),
        create,
        release,
        payment,
        packed,
    }
}

#[tokio::test]
async fn composite_fires_once_all_constituents_arrive() {
    for order_of_arrival in [[0, 1], [1, 0]] {
        let f = fulfilment(|_| CompositeEventOptions::new());
        let constituents = [&f.payment, &f.packed];
        let mut order = Order::default();
        f.machine.raise_event(&mut order, &f.create).await.unwrap();

        f.machine
            .raise_event(&mut order, constituents[order_of_arrival[0]])
            .await
            .unwrap();
        assert_eq!(order.state.as_deref(), Some("Waiting"));

        f.machine
            .raise_event(&mut order, constituents[order_of_arrival[1]])
            .await
            .unwrap();
        assert_eq!(order.state.as_deref(), Some("Done"));
        assert_eq!(order.status, 0b11);
        assert_eq!(order.log, ["ready"]);
    }
}

#[tokio::test]
async fn completed_composite_does_not_fire_again() {
    let f = fulfilment(|_| CompositeEventOptions::new());
    let mut order = Order::default();
    f.machine.raise_event(&mut order, &f.create).await.unwrap();
    f.machine.raise_event(&mut order, &f.payment).await.unwrap();
    f.machine.raise_event(&mut order, &f.packed).await.unwrap();

    f.machine.raise_event(&mut order, &f.payment).await.unwrap();

    assert_eq!(order.log, ["ready"]);
    assert_eq!(order.state.as_deref(), Some("Done"));
}

#[tokio::test]
async fn repeated_constituent_does_not_complete_the_composite() {
    let f = fulfilment(|_| CompositeEventOptions::new());
    let mut order = Order::default();
    f.machine.raise_event(&mut order, &f.create).await.unwrap();

    f.machine.raise_event(&mut order, &f.payment).await.unwrap();
    f.machine.raise_event(&mut order, &f.payment).await.unwrap();

    assert_eq!(order.status, 0b01);
    assert_eq!(order.state.as_deref(), Some("Waiting"));
}

#[tokio::test]
async fn gated_composite_stays_silent_outside_its_state() {
    let f = fulfilment(|waiting| CompositeEventOptions::new().when_in(waiting));
    let mut order = Order::default();
    f.machine.raise_event(&mut order, &f.create).await.unwrap();
    f.machine.raise_event(&mut order, &f.release).await.unwrap();

    f.machine.raise_event(&mut order, &f.payment).await.unwrap();
    f.machine.raise_event(&mut order, &f.packed).await.unwrap();

    assert_eq!(order.status, 0b11);
    assert_eq!(order.state.as_deref(), Some("Held"));
    assert!(order.log.is_empty());
}

#[tokio::test]
async fn constituents_are_not_tracked_in_initial_by_default() {
    let f = fulfilment(|_| CompositeEventOptions::new());
    let mut order = Order::default();

    let error = f.machine.raise_event(&mut order, &f.payment).await.unwrap_err();

    assert!(error.is_unhandled());
    assert_eq!(order.status, 0);
}

#[test]
fn probe_shows_handler_chains() {
    let c = checkout(|b, _| {
        b.try_then(|_| Err(Declined))
            .catch::<Declined>(|h| h.then(note("recovered")))
    });

    let probe = c.machine.probe();
    let binding = probe.state("Initial").unwrap().binding("Pay").unwrap();
    let kinds: Vec<&str> = binding.activities.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, ["action", "catch"]);
    assert_eq!(binding.activities[1].children.len(), 1);
}
