//! Overlapping dispatches, cancellation and teardown.
//!
//! Handlers are parked at a gate so a second dispatch can be started while
//! the first still holds the dispatch slot.

use std::sync::Arc;

use hibernation_core::{DispatchError, EventOutcome, HibernatableSocketParams};
use hibernation_harness::{
    Gate, InvariantRegistry, Journal, ProbeRequest, RecordingEngine, TraceEvent,
};
use hibernation_runtime::{ActorContext, DispatchPolicy, RunnerConfig, SocketDispatcher};

fn gated_dispatcher(
    policy: DispatchPolicy,
    journal: &Journal,
    gate: &Arc<Gate>,
) -> SocketDispatcher<RecordingEngine> {
    let engine = RecordingEngine::new().with_journal(journal).gated(gate);
    SocketDispatcher::new(Arc::new(engine), ActorContext::new(1), RunnerConfig::with_policy(policy))
}

fn spawn_text(
    dispatcher: &SocketDispatcher<RecordingEngine>,
    journal: &Journal,
    connection_id: u64,
    request: u64,
) -> tokio::task::JoinHandle<Result<EventOutcome, DispatchError>> {
    let dispatcher = dispatcher.clone();
    let request = ProbeRequest::boxed(request, journal);
    tokio::spawn(async move {
        dispatcher
            .dispatch(HibernatableSocketParams::text(connection_id, "hi"), request, None)
            .await
            .map(|result| result.outcome)
    })
}

#[tokio::test]
async fn reject_policy_fails_second_dispatch() {
    let journal = Journal::new();
    let gate = Gate::new();
    let dispatcher = gated_dispatcher(DispatchPolicy::Reject, &journal, &gate);

    let first = spawn_text(&dispatcher, &journal, 1, 1);
    gate.wait_entered().await;

    let request = ProbeRequest::boxed(2, &journal);
    let second = dispatcher.dispatch(HibernatableSocketParams::text(2, "hi"), request, None).await;
    assert_eq!(second, Err(DispatchError::DispatchInProgress { occupant: 1 }));

    // Rejected request is still delivered and drained; its connection is never recorded.
    assert!(journal.position(&TraceEvent::Delivered { request: 2 }).is_some());
    assert!(journal.position(&TraceEvent::DrainScheduled { request: 2 }).is_some());
    assert_eq!(dispatcher.registry().status(2), None);

    gate.release();
    assert_eq!(first.await.unwrap(), Ok(EventOutcome::Ok));

    assert_eq!(dispatcher.wait_until().join_all().await, 2);
    InvariantRegistry::standard().assert_all(&journal.snapshot(), "after rejected overlap");
}

#[tokio::test]
async fn queue_policy_serializes_dispatches() {
    let journal = Journal::new();
    let gate = Gate::new();
    let dispatcher = gated_dispatcher(DispatchPolicy::Queue, &journal, &gate);

    let first = spawn_text(&dispatcher, &journal, 1, 1);
    gate.wait_entered().await;
    let second = spawn_text(&dispatcher, &journal, 2, 2);

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    let entered = |j: &Journal| j.count(|e| matches!(e, TraceEvent::HandlerEntered { .. }));
    assert_eq!(entered(&journal), 1);
    assert!(journal.position(&TraceEvent::Delivered { request: 2 }).is_some());

    gate.release();
    assert_eq!(first.await.unwrap(), Ok(EventOutcome::Ok));

    gate.wait_entered().await;
    gate.release();
    assert_eq!(second.await.unwrap(), Ok(EventOutcome::Ok));

    assert_eq!(entered(&journal), 2);
    assert_eq!(dispatcher.engine().calls().len(), 2);
    assert_eq!(dispatcher.wait_until().join_all().await, 2);
    InvariantRegistry::standard().assert_all(&journal.snapshot(), "after queued overlap");
}

#[tokio::test]
async fn cancelled_dispatch_releases_slot_without_draining() {
    let journal = Journal::new();
    let gate = Gate::new();
    let dispatcher = gated_dispatcher(DispatchPolicy::Reject, &journal, &gate);

    let task = spawn_text(&dispatcher, &journal, 1, 1);
    gate.wait_entered().await;
    assert!(dispatcher.registry().is_dispatching());
    assert!(dispatcher.actor().is_locked());

    task.abort();
    assert!(task.await.is_err_and(|e| e.is_cancelled()));

    assert!(!dispatcher.registry().is_dispatching());
    assert!(!dispatcher.actor().is_locked());
    assert_eq!(journal.position(&TraceEvent::DrainScheduled { request: 1 }), None);
    assert_eq!(dispatcher.wait_until().join_all().await, 0);

    // Slot is free again.
    gate.release();
    let request = ProbeRequest::boxed(2, &journal);
    let outcome =
        dispatcher.dispatch(HibernatableSocketParams::text(1, "again"), request, None).await;
    assert_eq!(outcome.map(|r| r.outcome), Ok(EventOutcome::Ok));
}

#[tokio::test]
async fn closed_registry_refuses_dispatch() {
    let journal = Journal::new();
    let dispatcher = SocketDispatcher::new(
        Arc::new(RecordingEngine::new().with_journal(&journal)),
        ActorContext::new(1),
        RunnerConfig::default(),
    );
    dispatcher.registry().accept(1);
    dispatcher.registry().close();

    let request = ProbeRequest::boxed(1, &journal);
    let result = dispatcher.dispatch(HibernatableSocketParams::text(1, "hi"), request, None).await;

    assert_eq!(result, Err(DispatchError::RegistryClosed));
    assert!(dispatcher.registry().is_empty());
    assert!(dispatcher.engine().calls().is_empty());
    assert_eq!(dispatcher.wait_until().join_all().await, 1);
}
