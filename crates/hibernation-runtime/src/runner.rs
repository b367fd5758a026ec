//! Wake-and-dispatch runner.
//!
//! [`SocketDispatcher`] bundles everything one actor needs to deliver
//! hibernatable socket events: the registry, the execution engine, the actor's
//! execution lock, the failure classifier and the background task set. It is
//! passed around explicitly; nothing is looked up from ambient state.
//!
//! # Dispatch protocol
//!
//! ```text
//! delivered() ─> claim slot ─> take execution lock ─> resolve handler
//!     ─> entry point for the event kind (await) ─> classify failure
//!     ─> release slot ─> schedule drain ─> return outcome
//! ```
//!
//! The drain is scheduled on every path that reaches the end of `run`,
//! including invalid-state failures and panics unwinding through the runner.
//! A run that is cancelled (its future dropped) abandons the request instead.

use std::sync::Arc;

use async_trait::async_trait;
use hibernation_core::{
    ConnectionId, CustomEventResult, DescriptionClassifier, DispatchContext, DispatchError,
    ErrorClassifier, EventKind, EventOutcome, HIBERNATABLE_SOCKET_EVENT_TYPE, HandlerError,
    HibernatableSocketParams, SocketEvent,
};

use crate::{
    actor::{ActorContext, ExecutionLock},
    config::RunnerConfig,
    custom_event::{CustomEvent, RemoteDispatcher},
    engine::HandlerEngine,
    facade::SocketEventFacade,
    registry::HibernationRegistry,
    request::{IncomingRequest, TaskSet},
};

/// Log target of the diagnostic emitted for unexpected handler failures.
pub const DISPATCH_LOG_TARGET: &str = "hibernation::dispatch";

/// Per-actor bundle that delivers hibernatable socket events.
pub struct SocketDispatcher<E: HandlerEngine> {
    registry: HibernationRegistry<E::Handle>,
    engine: Arc<E>,
    actor: ActorContext,
    classifier: Arc<dyn ErrorClassifier>,
    wait_until: TaskSet,
    config: RunnerConfig,
}

impl<E: HandlerEngine> Clone for SocketDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            engine: Arc::clone(&self.engine),
            actor: self.actor.clone(),
            classifier: Arc::clone(&self.classifier),
            wait_until: self.wait_until.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: HandlerEngine> SocketDispatcher<E> {
    /// Create a dispatcher with a fresh registry and task set.
    pub fn new(engine: Arc<E>, actor: ActorContext, config: RunnerConfig) -> Self {
        Self {
            registry: HibernationRegistry::new(config.dispatch_policy),
            engine,
            actor,
            classifier: Arc::new(DescriptionClassifier::new()),
            wait_until: TaskSet::new(),
            config,
        }
    }

    /// Replace the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a task set owned by the surrounding request machinery.
    #[must_use]
    pub fn with_wait_until(mut self, wait_until: TaskSet) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// The actor's hibernation registry.
    pub fn registry(&self) -> &HibernationRegistry<E::Handle> {
        &self.registry
    }

    /// The execution engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The actor's execution context.
    pub fn actor(&self) -> &ActorContext {
        &self.actor
    }

    /// Background task set drains are scheduled on.
    pub fn wait_until(&self) -> &TaskSet {
        &self.wait_until
    }

    /// Wrap parameters from the listener into a runnable event.
    pub fn event(&self, params: HibernatableSocketParams) -> HibernatableSocketEvent<E> {
        HibernatableSocketEvent { params, dispatcher: self.clone() }
    }

    /// Convenience for `self.event(params).run(request, entrypoint)`.
    pub async fn dispatch(
        &self,
        params: HibernatableSocketParams,
        request: Box<dyn IncomingRequest>,
        entrypoint: Option<&str>,
    ) -> Result<CustomEventResult, DispatchError> {
        self.event(params).run(request, entrypoint).await
    }

    /// Claim the slot, run the entry point for the event and classify the
    /// result. The slot and the execution lock are released on return.
    async fn deliver(
        &self,
        params: HibernatableSocketParams,
        entrypoint: Option<&str>,
    ) -> Result<EventOutcome, DispatchError> {
        let HibernatableSocketParams { connection_id, event } = params;
        let kind = event.kind();
        let context = match &event {
            SocketEvent::Error(error) => DispatchContext::for_error(connection_id, error.clone()),
            _ => DispatchContext::new(connection_id, kind),
        };

        let _slot = self.registry.begin_dispatch(context).await?;
        tracing::debug!(connection_id, %kind, "dispatching hibernatable socket event");

        let lock = self.actor.lock().await;
        let facade = SocketEventFacade::new(&self.registry, &*self.engine);
        let entrypoint = entrypoint.or(self.config.default_entrypoint.as_deref());

        let outcome = match self.invoke(event, &lock, &facade, entrypoint).await {
            Ok(()) => EventOutcome::Ok,
            Err(err) => {
                self.report_failure(connection_id, kind, &err);
                EventOutcome::Exception
            },
        };

        tracing::debug!(connection_id, %kind, %outcome, "hibernatable socket event finished");
        Ok(outcome)
    }

    /// Resolve the handler and call the one entry point matching the event.
    async fn invoke(
        &self,
        event: SocketEvent,
        lock: &ExecutionLock<'_>,
        facade: &SocketEventFacade<'_, E>,
        entrypoint: Option<&str>,
    ) -> Result<(), HandlerError> {
        let engine = &*self.engine;
        let handler = engine.resolve_handler(lock, entrypoint)?;

        match event {
            SocketEvent::Text(message) => engine.send_text(message, lock, &handler, facade).await,
            SocketEvent::Binary(data) => engine.send_binary(data, lock, &handler, facade).await,
            SocketEvent::Close { code, reason } => {
                engine.send_close(code, reason, lock, &handler, facade).await
            },
            SocketEvent::Error(_) => engine.send_error(lock, &handler, facade).await,
        }
    }

    /// Emit the diagnostic for a handler failure unless it is exempt.
    fn report_failure(&self, connection_id: ConnectionId, kind: EventKind, err: &HandlerError) {
        let class = self.classifier.classify(err.description());
        if class.should_log() {
            tracing::error!(
                target: DISPATCH_LOG_TARGET,
                connection_id,
                %kind,
                error = %err,
                "hibernatable socket handler failed"
            );
        }
    }
}

/// One hibernatable socket event bound to its actor's dispatcher.
pub struct HibernatableSocketEvent<E: HandlerEngine> {
    params: HibernatableSocketParams,
    dispatcher: SocketDispatcher<E>,
}

impl<E: HandlerEngine> HibernatableSocketEvent<E> {
    /// Parameters this event carries.
    pub fn params(&self) -> &HibernatableSocketParams {
        &self.params
    }
}

#[async_trait]
impl<E: HandlerEngine> CustomEvent for HibernatableSocketEvent<E> {
    fn type_id(&self) -> u16 {
        HIBERNATABLE_SOCKET_EVENT_TYPE
    }

    async fn run(
        self,
        mut request: Box<dyn IncomingRequest>,
        entrypoint: Option<&str>,
    ) -> Result<CustomEventResult, DispatchError> {
        request.delivered();
        let drain = DrainGuard::new(request, self.dispatcher.wait_until.clone());

        let result = self.dispatcher.deliver(self.params, entrypoint).await;

        drain.schedule();
        result.map(CustomEventResult::from)
    }

    async fn send_rpc(
        self,
        _dispatcher: &dyn RemoteDispatcher,
        _wait_until: &TaskSet,
    ) -> Result<CustomEventResult, DispatchError> {
        Err(DispatchError::Unsupported("hibernatable socket events are never delivered over rpc"))
    }
}

/// Schedules the request drain exactly once.
///
/// `schedule` is the normal path. If the guard is dropped while a panic
/// unwinds through the runner the drain is still scheduled; if it is dropped
/// because the run was cancelled the request is abandoned without draining.
struct DrainGuard {
    request: Option<Box<dyn IncomingRequest>>,
    wait_until: TaskSet,
}

impl DrainGuard {
    fn new(request: Box<dyn IncomingRequest>, wait_until: TaskSet) -> Self {
        Self { request: Some(request), wait_until }
    }

    fn schedule(mut self) {
        if let Some(request) = self.request.take() {
            self.wait_until.add(request.drain());
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let Some(request) = self.request.take() else {
            return;
        };

        if std::thread::panicking() {
            self.wait_until.add(request.drain());
        } else {
            tracing::debug!("hibernatable socket dispatch abandoned; request dropped undrained");
        }
    }
}
