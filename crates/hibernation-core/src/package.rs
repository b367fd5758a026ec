//! Per-dispatch context.
//!
//! Exactly one [`DispatchContext`] exists while an event is being delivered.
//! It names the connection being served (the occupant) and carries the
//! transport error when the event is an error event.

use crate::{
    error::DispatchError,
    event::{ConnectionId, EventKind, SocketError},
};

/// Transient bundle describing the event currently being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    occupant: ConnectionId,
    kind: EventKind,
    /// Only populated for `EventKind::Error`
    error: Option<SocketError>,
}

impl DispatchContext {
    /// Context for a non-error event.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `kind` is not `EventKind::Error`; use
    /// [`DispatchContext::for_error`] for error events.
    pub fn new(occupant: ConnectionId, kind: EventKind) -> Self {
        debug_assert_ne!(kind, EventKind::Error, "error events must carry the captured error");
        Self { occupant, kind, error: None }
    }

    /// Context for an error event, holding the captured error.
    pub fn for_error(occupant: ConnectionId, error: SocketError) -> Self {
        Self { occupant, kind: EventKind::Error, error: Some(error) }
    }

    /// Connection being served.
    pub fn occupant(&self) -> ConnectionId {
        self.occupant
    }

    /// Kind of the event being served.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Captured transport error.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NotAnErrorEvent` unless this is an error dispatch
    pub fn error(&self) -> Result<&SocketError, DispatchError> {
        match (&self.error, self.kind) {
            (Some(error), EventKind::Error) => Ok(error),
            (_, kind) => Err(DispatchError::NotAnErrorEvent { kind }),
        }
    }
}
