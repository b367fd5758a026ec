//! Incoming request double.

use futures::{FutureExt, future::BoxFuture};
use hibernation_runtime::IncomingRequest;

use crate::journal::{Journal, TraceEvent};

/// Request that journals `delivered` and its drain.
///
/// `drain` records [`TraceEvent::DrainScheduled`] when the runner hands the
/// drain over, and [`TraceEvent::Drained`] once the background task runs.
#[derive(Debug)]
pub struct ProbeRequest {
    id: u64,
    journal: Journal,
}

impl ProbeRequest {
    /// Create a request recording into `journal`.
    pub fn new(id: u64, journal: &Journal) -> Self {
        Self { id, journal: journal.clone() }
    }

    /// Boxed request, ready to pass to a dispatcher.
    pub fn boxed(id: u64, journal: &Journal) -> Box<dyn IncomingRequest> {
        Box::new(Self::new(id, journal))
    }
}

impl IncomingRequest for ProbeRequest {
    fn delivered(&mut self) {
        self.journal.record(TraceEvent::Delivered { request: self.id });
    }

    fn drain(self: Box<Self>) -> BoxFuture<'static, ()> {
        let Self { id, journal } = *self;
        journal.record(TraceEvent::DrainScheduled { request: id });
        async move {
            journal.record(TraceEvent::Drained { request: id });
        }
        .boxed()
    }
}
