//! Recording handler engine.

#![allow(clippy::disallowed_types, reason = "Synchronous recording only")]

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use hibernation_core::{
    ConnectionId, DispatchError, EventKind, HandlerError, SocketError, SocketEvent,
};
use hibernation_runtime::{ExecutionLock, HandlerEngine, SocketEventFacade};
use tokio::sync::Notify;

use crate::journal::{Journal, TraceEvent};

/// Live socket built by [`RecordingEngine::unhibernate`].
#[derive(Debug, PartialEq, Eq)]
pub struct RecordedSocket {
    /// Connection the socket belongs to
    pub connection_id: ConnectionId,
    /// Order in which the engine built it, starting at 1
    pub generation: u64,
}

/// How often a handler asks the facade for the live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeMode {
    /// Never touch the socket
    Never,
    /// Fetch it once
    #[default]
    Once,
    /// Fetch it twice in the same dispatch
    Twice,
}

/// Holds handlers at their start until the test releases them.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Create a closed gate.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until a handler is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked (or the next) handler continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// One entry point invocation.
#[derive(Debug, Clone)]
pub struct HandlerCall {
    /// Connection served
    pub connection_id: ConnectionId,
    /// Event kind, as reported by the facade
    pub kind: EventKind,
    /// Resolved handler name
    pub handler: String,
    /// Actor whose execution lock was held
    pub actor_id: u64,
    /// Payload handed to the entry point; `None` for error events
    pub message: Option<SocketEvent>,
    /// Sockets returned by the facade, in call order
    pub handles: Vec<Arc<RecordedSocket>>,
    /// What the facade returned for the captured error
    pub error: Result<SocketError, DispatchError>,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    fail_with: Option<String>,
    wake: WakeMode,
    missing_entrypoint: Option<String>,
    gate: Option<Arc<Gate>>,
    panics: bool,
}

/// Engine that records every call and does nothing else.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    journal: Journal,
    behavior: Behavior,
    calls: Mutex<Vec<HandlerCall>>,
    generation: AtomicU64,
}

impl RecordingEngine {
    /// Engine with its own journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record into a shared journal.
    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Handlers fail with `description` after waking.
    #[must_use]
    pub fn failing_with(mut self, description: impl Into<String>) -> Self {
        self.behavior.fail_with = Some(description.into());
        self
    }

    /// Handlers never touch the socket.
    #[must_use]
    pub fn without_wake(mut self) -> Self {
        self.behavior.wake = WakeMode::Never;
        self
    }

    /// Handlers fetch the socket twice.
    #[must_use]
    pub fn waking_twice(mut self) -> Self {
        self.behavior.wake = WakeMode::Twice;
        self
    }

    /// Resolution fails for `entrypoint`.
    #[must_use]
    pub fn missing_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.behavior.missing_entrypoint = Some(entrypoint.into());
        self
    }

    /// Handlers park at `gate` before doing anything else.
    #[must_use]
    pub fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.behavior.gate = Some(Arc::clone(gate));
        self
    }

    /// Handlers panic after recording their call.
    #[must_use]
    pub fn panicking(mut self) -> Self {
        self.behavior.panics = true;
        self
    }

    fn calls_mut(&self) -> MutexGuard<'_, Vec<HandlerCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every entry point call so far.
    pub fn calls(&self) -> Vec<HandlerCall> {
        self.calls_mut().clone()
    }

    /// Number of sockets built.
    pub fn unhibernated(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Journal this engine records into.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    async fn serve(
        &self,
        message: Option<SocketEvent>,
        lock: &ExecutionLock<'_>,
        handler: &str,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        let connection_id = event.connection_id()?;
        let kind = event.kind()?;
        self.journal.record(TraceEvent::HandlerEntered { connection_id, kind });

        if let Some(gate) = &self.behavior.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let fetches = match self.behavior.wake {
            WakeMode::Never => 0,
            WakeMode::Once => 1,
            WakeMode::Twice => 2,
        };
        let mut handles = Vec::with_capacity(fetches);
        for _ in 0..fetches {
            handles.push(event.get_handle()?);
        }

        self.calls_mut().push(HandlerCall {
            connection_id,
            kind,
            handler: handler.to_string(),
            actor_id: lock.actor_id(),
            message,
            handles,
            error: event.get_error(),
        });

        if self.behavior.panics {
            self.abort();
        }

        let result = match &self.behavior.fail_with {
            Some(description) => Err(HandlerError::new(description.clone())),
            None => Ok(()),
        };
        self.journal.record(TraceEvent::HandlerExited {
            connection_id,
            kind,
            failed: result.is_err(),
        });
        result
    }

    #[allow(clippy::panic, reason = "exercises unwinding through the runner")]
    fn abort(&self) {
        panic!("recording engine handler panicked");
    }
}

#[async_trait]
impl HandlerEngine for RecordingEngine {
    type Handle = Arc<RecordedSocket>;
    type Handler = String;
    type Exception = SocketError;

    fn unhibernate(&self, connection_id: ConnectionId) -> Self::Handle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record(TraceEvent::Unhibernated { connection_id });
        Arc::new(RecordedSocket { connection_id, generation })
    }

    fn resolve_handler(
        &self,
        _lock: &ExecutionLock<'_>,
        entrypoint: Option<&str>,
    ) -> Result<Self::Handler, HandlerError> {
        let name = entrypoint.unwrap_or("default");
        if self.behavior.missing_entrypoint.as_deref() == Some(name) {
            return Err(HandlerError::new(format!("no handler exported as `{name}`")));
        }
        Ok(name.to_string())
    }

    fn exception_from(&self, error: SocketError) -> Self::Exception {
        error
    }

    async fn send_text(
        &self,
        message: String,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        self.serve(Some(SocketEvent::Text(message)), lock, handler, event).await
    }

    async fn send_binary(
        &self,
        data: Bytes,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        self.serve(Some(SocketEvent::Binary(data)), lock, handler, event).await
    }

    async fn send_close(
        &self,
        code: u16,
        reason: String,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        self.serve(Some(SocketEvent::Close { code, reason }), lock, handler, event).await
    }

    async fn send_error(
        &self,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        self.serve(None, lock, handler, event).await
    }
}
