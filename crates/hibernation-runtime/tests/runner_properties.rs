//! Property-based tests for sequential dispatch.
//!
//! Any sequence of events on one actor must deliver each payload unmodified,
//! wake each connection exactly once, drain every request and satisfy the
//! journal invariants. A failing handler must yield `Exception` and a single
//! scheduled drain for every event kind, and its diagnostics must follow the
//! classifier.

use std::sync::Arc;

use hibernation_core::{
    DescriptionClassifier, ErrorClassifier, EventOutcome, HibernatableSocketParams, SocketError,
    SocketEvent,
};
use hibernation_harness::{
    InvariantRegistry, Journal, LogCapture, ProbeRequest, RecordingEngine, TraceEvent,
};
use hibernation_runtime::{ActorContext, RunnerConfig, SocketDispatcher};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

fn arb_event() -> impl Strategy<Value = SocketEvent> {
    prop_oneof![
        "[a-z ]{0,16}".prop_map(SocketEvent::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|data| SocketEvent::Binary(data.into())),
        (1000u16..5000, "[a-z ]{0,8}")
            .prop_map(|(code, reason)| SocketEvent::Close { code, reason }),
        "[a-z ]{1,16}".prop_map(|d| SocketEvent::Error(SocketError::new(d))),
    ]
}

fn arb_params() -> impl Strategy<Value = HibernatableSocketParams> {
    (0u64..4, arb_event())
        .prop_map(|(connection_id, event)| HibernatableSocketParams { connection_id, event })
}

fn arb_description() -> impl Strategy<Value = String> {
    let marker = prop_oneof![Just(""), Just("jsg."), Just("jsg-internal.DoNotLog")];
    (0usize..3, marker, "[A-Za-z]{1,10}")
        .prop_map(|(hops, marker, rest)| format!("{}{marker}{rest}", "remote.".repeat(hops)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: payloads arrive unmodified and each connection wakes once
    #[test]
    fn prop_sequential_dispatch(events in prop::collection::vec(arb_params(), 1..24)) {
        let journal = Journal::new();
        let dispatcher = SocketDispatcher::new(
            Arc::new(RecordingEngine::new().with_journal(&journal)),
            ActorContext::new(1),
            RunnerConfig::default(),
        );

        let drained = runtime().block_on(async {
            for (request, params) in events.iter().enumerate() {
                let result = dispatcher
                    .dispatch(params.clone(), ProbeRequest::boxed(request as u64, &journal), None)
                    .await;
                assert_eq!(result.map(|r| r.outcome), Ok(EventOutcome::Ok));
            }
            dispatcher.wait_until().join_all().await
        });
        prop_assert_eq!(drained, events.len());

        let calls = dispatcher.engine().calls();
        prop_assert_eq!(calls.len(), events.len());
        for (call, params) in calls.iter().zip(&events) {
            prop_assert_eq!(call.connection_id, params.connection_id);
            prop_assert_eq!(call.kind, params.kind());
            match &params.event {
                SocketEvent::Error(error) => {
                    prop_assert_eq!(call.message.as_ref(), None);
                    prop_assert_eq!(call.error.as_ref(), Ok(error));
                },
                event => prop_assert_eq!(call.message.as_ref(), Some(event)),
            }
        }

        let mut connections: Vec<_> = events.iter().map(|p| p.connection_id).collect();
        connections.sort_unstable();
        connections.dedup();
        prop_assert_eq!(dispatcher.engine().unhibernated(), connections.len() as u64);
        prop_assert_eq!(dispatcher.registry().active_count(), connections.len());

        let trace = journal.snapshot();
        prop_assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
    }

    /// Property: a failure is logged iff the classifier does not exempt it
    #[test]
    fn prop_failure_logging_follows_classifier(description in arb_description()) {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let dispatcher = SocketDispatcher::new(
            Arc::new(RecordingEngine::new().failing_with(description.clone())),
            ActorContext::new(1),
            RunnerConfig::default(),
        );
        let journal = dispatcher.engine().journal().clone();

        let request = ProbeRequest::boxed(1, &journal);
        let outcome = runtime().block_on(async {
            dispatcher
                .dispatch(HibernatableSocketParams::text(1, "hi"), request, None)
                .await
                .map(|r| r.outcome)
        });
        prop_assert_eq!(outcome, Ok(EventOutcome::Exception));

        let class = DescriptionClassifier::new().classify(&description);
        prop_assert_eq!(capture.dispatch_failures().len(), usize::from(class.should_log()));
    }

    /// Property: every event kind turns a handler failure into `Exception`
    /// with exactly one scheduled drain
    #[test]
    fn prop_failing_handlers_yield_exception_and_drain_once(
        events in prop::collection::vec(arb_params(), 1..12),
        description in arb_description(),
    ) {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let journal = Journal::new();
        let engine =
            RecordingEngine::new().with_journal(&journal).failing_with(description.clone());
        let dispatcher = SocketDispatcher::new(
            Arc::new(engine),
            ActorContext::new(1),
            RunnerConfig::default(),
        );

        let (outcomes, drained) = runtime().block_on(async {
            let mut outcomes = Vec::with_capacity(events.len());
            for (request, params) in events.iter().enumerate() {
                let request = ProbeRequest::boxed(request as u64, &journal);
                let result = dispatcher.dispatch(params.clone(), request, None).await;
                outcomes.push(result.map(|r| r.outcome));
            }
            (outcomes, dispatcher.wait_until().join_all().await)
        });

        for outcome in &outcomes {
            prop_assert_eq!(outcome, &Ok(EventOutcome::Exception));
        }
        prop_assert_eq!(drained, events.len());
        for request in 0..events.len() as u64 {
            let scheduled = journal.count(|e| *e == TraceEvent::DrainScheduled { request });
            prop_assert_eq!(scheduled, 1);
        }

        let calls = dispatcher.engine().calls();
        prop_assert_eq!(calls.len(), events.len());
        for (call, params) in calls.iter().zip(&events) {
            prop_assert_eq!(call.kind, params.kind());
        }

        let class = DescriptionClassifier::new().classify(&description);
        let expected = if class.should_log() { events.len() } else { 0 };
        prop_assert_eq!(capture.dispatch_failures().len(), expected);

        let trace = journal.snapshot();
        prop_assert!(InvariantRegistry::standard().check_all(&trace).is_ok());
    }
}
