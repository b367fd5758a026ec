//! Handler invocation seam.
//!
//! The execution engine that runs application code is external. It tells the
//! runner how to rebuild a live socket handle, how to resolve the exported
//! handler for an entrypoint, and exposes one entry point per event kind.

use async_trait::async_trait;
use bytes::Bytes;
use hibernation_core::{ConnectionId, HandlerError, SocketError};

use crate::{actor::ExecutionLock, facade::SocketEventFacade};

/// Application execution engine for hibernatable socket events.
///
/// Entry points take their payload by value; the runner hands it over and
/// never touches it again. Every entry point runs with the actor's execution
/// lock held and receives the facade for wake-on-access and error retrieval.
#[async_trait]
pub trait HandlerEngine: Sized + Send + Sync + 'static {
    /// Live socket handle exposed to application code. Clones must refer to
    /// the same socket.
    type Handle: Clone + Send + Sync + 'static;

    /// Resolved exported handler.
    type Handler: Send + Sync;

    /// Application-side representation of a captured socket error.
    type Exception: Send;

    /// Construct a live handle for a hibernated connection.
    fn unhibernate(&self, connection_id: ConnectionId) -> Self::Handle;

    /// Resolve the exported handler for `entrypoint` (default export if
    /// `None`).
    fn resolve_handler(
        &self,
        lock: &ExecutionLock<'_>,
        entrypoint: Option<&str>,
    ) -> Result<Self::Handler, HandlerError>;

    /// Convert a captured socket error into the application's exception type.
    fn exception_from(&self, error: SocketError) -> Self::Exception;

    /// Deliver a text message.
    async fn send_text(
        &self,
        message: String,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError>;

    /// Deliver a binary message.
    async fn send_binary(
        &self,
        data: Bytes,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError>;

    /// Deliver a close from the peer.
    async fn send_close(
        &self,
        code: u16,
        reason: String,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError>;

    /// Deliver a transport error. The error itself is read via
    /// [`SocketEventFacade::get_error`].
    async fn send_error(
        &self,
        lock: &ExecutionLock<'_>,
        handler: &Self::Handler,
        event: &SocketEventFacade<'_, Self>,
    ) -> Result<(), HandlerError>;
}
