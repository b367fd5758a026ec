//! Event object handed to application handlers.

use hibernation_core::{ConnectionId, DispatchError, EventKind};

use crate::{engine::HandlerEngine, registry::HibernationRegistry};

/// View of the current dispatch exposed to the handler.
///
/// Only valid while the dispatch that created it is running; every accessor
/// goes through the registry's dispatch context.
pub struct SocketEventFacade<'a, E: HandlerEngine> {
    registry: &'a HibernationRegistry<E::Handle>,
    engine: &'a E,
}

impl<'a, E: HandlerEngine> SocketEventFacade<'a, E> {
    pub(crate) fn new(registry: &'a HibernationRegistry<E::Handle>, engine: &'a E) -> Self {
        Self { registry, engine }
    }

    /// Live handle of the connection being served, waking it if hibernated.
    ///
    /// Calling this repeatedly returns the same handle.
    pub fn get_handle(&self) -> Result<E::Handle, DispatchError> {
        self.registry.wake_occupant(|id| self.engine.unhibernate(id))
    }

    /// Error captured for this dispatch, as an application exception.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NotAnErrorEvent` unless this is an error dispatch
    pub fn get_error(&self) -> Result<E::Exception, DispatchError> {
        self.registry.captured_error().map(|error| self.engine.exception_from(error))
    }

    /// Connection being served.
    pub fn connection_id(&self) -> Result<ConnectionId, DispatchError> {
        self.registry.current().map(|ctx| ctx.occupant())
    }

    /// Kind of the event being served.
    pub fn kind(&self) -> Result<EventKind, DispatchError> {
        self.registry.current().map(|ctx| ctx.kind())
    }
}
