//! Scripted replay of hibernatable socket events.
//!
//! Feeds a parsed [`script`](crate::script) through a real
//! [`SocketDispatcher`] backed by [`ReplayEngine`], an engine whose handlers
//! only log what they receive. A text message of the form `throw <reason>`
//! makes the handler fail with `<reason>`, which exercises the failure path
//! and the logging exemptions.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use hibernation_core::{
    ConnectionId, DispatchError, EventKind, EventOutcome, HandlerError, SocketError,
};
use thiserror::Error;

use crate::{
    actor::ExecutionLock,
    engine::HandlerEngine,
    facade::SocketEventFacade,
    request::IncomingRequest,
    runner::SocketDispatcher,
    script::{ScriptCommand, ScriptError, ScriptLine, parse_script},
};

/// Handler name used when no entrypoint is given.
const DEFAULT_HANDLER: &str = "default";

/// Text prefix that makes the replay handler fail.
const THROW_PREFIX: &str = "throw ";

/// Errors that abort a replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Script file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Script path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Script is malformed
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Dispatcher refused an event
    #[error("line {line}: {source}")]
    Dispatch {
        /// 1-based line number
        line: usize,
        /// Dispatcher error
        source: DispatchError,
    },
}

/// Live socket rebuilt by [`ReplayEngine`].
#[derive(Debug, PartialEq, Eq)]
pub struct ReplaySocket {
    connection_id: ConnectionId,
}

impl ReplaySocket {
    /// Connection this socket belongs to.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

/// Engine whose handlers log the events they receive.
#[derive(Debug, Default)]
pub struct ReplayEngine {
    wakes: AtomicUsize,
}

impl ReplayEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sockets rebuilt so far.
    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HandlerEngine for ReplayEngine {
    type Handle = Arc<ReplaySocket>;
    type Handler = String;
    type Exception = SocketError;

    fn unhibernate(&self, connection_id: ConnectionId) -> Self::Handle {
        self.wakes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(connection_id, "socket woken");
        Arc::new(ReplaySocket { connection_id })
    }

    fn resolve_handler(
        &self,
        _lock: &ExecutionLock<'_>,
        entrypoint: Option<&str>,
    ) -> Result<Self::Handler, HandlerError> {
        Ok(entrypoint.unwrap_or(DEFAULT_HANDLER).to_string())
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
        let socket = event.get_handle()?;
        if let Some(reason) = message.strip_prefix(THROW_PREFIX) {
            return Err(HandlerError::new(reason));
        }

        tracing::info!(
            actor_id = lock.actor_id(),
            connection_id = socket.connection_id(),
            handler = %handler,
            %message,
            "text message"
        );
        Ok(())
    }

    async fn send_binary(
        &self,
        data: Bytes,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        let socket = event.get_handle()?;
        tracing::info!(
            actor_id = lock.actor_id(),
            connection_id = socket.connection_id(),
            handler = %handler,
            data = %hex::encode(&data),
            "binary message"
        );
        Ok(())
    }

    async fn send_close(
        &self,
        code: u16,
        reason: String,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        let socket = event.get_handle()?;
        tracing::info!(
            actor_id = lock.actor_id(),
            connection_id = socket.connection_id(),
            handler = %handler,
            code,
            %reason,
            "peer closed"
        );
        Ok(())
    }

    async fn send_error(
        &self,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError> {
        let error = event.get_error()?;
        tracing::warn!(
            actor_id = lock.actor_id(),
            connection_id = event.connection_id()?,
            handler = %handler,
            %error,
            "socket error"
        );
        Ok(())
    }
}

/// Request stand-in for replayed events.
#[derive(Debug)]
pub struct ReplayRequest {
    line: usize,
    delivered: bool,
}

impl ReplayRequest {
    /// Request for the event on script line `line`.
    pub fn new(line: usize) -> Self {
        Self { line, delivered: false }
    }
}

impl IncomingRequest for ReplayRequest {
    fn delivered(&mut self) {
        self.delivered = true;
    }

    fn drain(self: Box<Self>) -> BoxFuture<'static, ()> {
        let Self { line, delivered } = *self;
        async move {
            tracing::debug!(line, delivered, "request drained");
        }
        .boxed()
    }
}

/// Result of one script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    /// Connection registered
    Opened {
        /// 1-based line number
        line: usize,
        /// Connection id
        connection_id: ConnectionId,
        /// False if the connection was already known
        fresh: bool,
    },
    /// Event dispatched
    Dispatched {
        /// 1-based line number
        line: usize,
        /// Connection id
        connection_id: ConnectionId,
        /// Event kind
        kind: EventKind,
        /// Reported outcome
        outcome: EventOutcome,
    },
}

/// Totals over a finished replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Connections registered
    pub opened: usize,
    /// Events that finished with `Ok`
    pub ok: usize,
    /// Events that finished with `Exception`
    pub exceptions: usize,
}

impl ReplaySummary {
    /// Tally a list of steps.
    pub fn from_steps(steps: &[ReplayStep]) -> Self {
        let mut summary = Self::default();
        for step in steps {
            match step {
                ReplayStep::Opened { .. } => summary.opened += 1,
                ReplayStep::Dispatched { outcome: EventOutcome::Ok, .. } => summary.ok += 1,
                ReplayStep::Dispatched { .. } => summary.exceptions += 1,
            }
        }
        summary
    }
}

/// Run parsed script lines in order.
///
/// Each event is dispatched to completion before the next line starts. Drains
/// are left on the dispatcher's task set.
pub async fn run_script(
    script: &[ScriptLine],
    dispatcher: &SocketDispatcher<ReplayEngine>,
    entrypoint: Option<&str>,
) -> Result<Vec<ReplayStep>, ReplayError> {
    let mut steps = Vec::with_capacity(script.len());

    for ScriptLine { line, command } in script {
        let line = *line;
        let step = match command {
            ScriptCommand::Open(connection_id) => {
                let fresh = dispatcher.registry().accept(*connection_id);
                if !fresh {
                    tracing::warn!(line, connection_id, "connection already registered");
                }
                ReplayStep::Opened { line, connection_id: *connection_id, fresh }
            },
            ScriptCommand::Dispatch(params) => {
                let connection_id = params.connection_id;
                let kind = params.kind();
                let result = dispatcher
                    .dispatch(params.clone(), Box::new(ReplayRequest::new(line)), entrypoint)
                    .await
                    .map_err(|source| ReplayError::Dispatch { line, source })?;
                tracing::info!(line, connection_id, %kind, outcome = %result.outcome, "dispatched");
                ReplayStep::Dispatched { line, connection_id, kind, outcome: result.outcome }
            },
        };
        steps.push(step);
    }

    Ok(steps)
}

/// Read, parse and run the script at `path`.
pub async fn replay_file(
    path: &Path,
    dispatcher: &SocketDispatcher<ReplayEngine>,
    entrypoint: Option<&str>,
) -> Result<Vec<ReplayStep>, ReplayError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReplayError::Io { path: path.to_path_buf(), source })?;
    let script = parse_script(&source)?;

    tracing::info!(path = %path.display(), instructions = script.len(), "replaying script");
    run_script(&script, dispatcher, entrypoint).await
}

#[cfg(test)]
mod tests {
    use hibernation_core::ConnectionStatus;

    use super::*;
    use crate::{actor::ActorContext, config::RunnerConfig};

    fn dispatcher() -> SocketDispatcher<ReplayEngine> {
        SocketDispatcher::new(
            Arc::new(ReplayEngine::new()),
            ActorContext::new(1),
            RunnerConfig::default(),
        )
    }

    #[tokio::test]
    async fn replays_events_in_order() {
        let dispatcher = dispatcher();
        let script = parse_script(
            "open 1\n\
             text 1 hello\n\
             text 1 throw boom\n\
             binary 1 ff00\n\
             error 1 reset by peer\n\
             close 1 1000 bye\n",
        )
        .unwrap();

        let steps = run_script(&script, &dispatcher, None).await.unwrap();
        let summary = ReplaySummary::from_steps(&steps);

        assert_eq!(summary, ReplaySummary { opened: 1, ok: 4, exceptions: 1 });
        assert_eq!(
            steps[2],
            ReplayStep::Dispatched {
                line: 3,
                connection_id: 1,
                kind: EventKind::Text,
                outcome: EventOutcome::Exception,
            }
        );

        // Woken once by the first text, then reused.
        assert_eq!(dispatcher.engine().wakes(), 1);
        assert_eq!(dispatcher.registry().status(1), Some(ConnectionStatus::Active));
        assert_eq!(dispatcher.wait_until().join_all().await, 5);
    }

    #[tokio::test]
    async fn error_events_do_not_wake() {
        let dispatcher = dispatcher();
        let script = parse_script("open 4\nerror 4 gone\n").unwrap();

        run_script(&script, &dispatcher, Some("alt")).await.unwrap();

        assert_eq!(dispatcher.engine().wakes(), 0);
        assert_eq!(dispatcher.registry().status(4), Some(ConnectionStatus::Hibernated));
    }

    #[tokio::test]
    async fn reopening_is_reported() {
        let dispatcher = dispatcher();
        let script = parse_script("open 2\nopen 2\n").unwrap();

        let steps = run_script(&script, &dispatcher, None).await.unwrap();

        assert_eq!(steps[1], ReplayStep::Opened { line: 2, connection_id: 2, fresh: false });
    }
}
