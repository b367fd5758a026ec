//! Error types for hibernatable socket dispatch.
//!
//! Two families live here. [`DispatchError`] covers contract violations and
//! the RPC rejection; these propagate to whoever called the runner.
//! [`HandlerError`] is what an application handler fails with; the runner
//! turns it into an outcome and never lets it escape.

use thiserror::Error;

use crate::event::{ConnectionId, EventKind};

/// Hard failures surfaced to the runner's caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Dispatch context accessed while no dispatch is running
    #[error("no hibernatable socket dispatch is in progress")]
    NoActiveDispatch,

    /// Error retrieval attempted for a non-error event
    #[error("invalid state: error requested while dispatching a {kind} event")]
    NotAnErrorEvent {
        /// Kind of the event being dispatched
        kind: EventKind,
    },

    /// A second dispatch tried to start while the slot was occupied
    #[error("invalid state: dispatch already in progress for connection {occupant}")]
    DispatchInProgress {
        /// Connection currently occupying the dispatch slot
        occupant: ConnectionId,
    },

    /// Occupant id does not resolve to a record in the registry
    #[error("connection not found: {0}")]
    UnknownConnection(ConnectionId),

    /// Registry was torn down with its actor
    #[error("hibernation registry is closed")]
    RegistryClosed,

    /// Operation is not supported for this event category
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl DispatchError {
    /// Returns true for programming contract violations.
    ///
    /// These are never retried; they mean the caller broke the dispatch
    /// protocol.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::NoActiveDispatch
                | Self::NotAnErrorEvent { .. }
                | Self::DispatchInProgress { .. }
                | Self::UnknownConnection(_)
        )
    }
}

/// Failure raised while invoking an application handler.
///
/// The description is what the classifier inspects to decide whether the
/// failure is logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct HandlerError {
    description: String,
}

impl HandlerError {
    /// Create a handler error from its description.
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into() }
    }

    /// Description used for classification and logging.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<DispatchError> for HandlerError {
    fn from(err: DispatchError) -> Self {
        Self::new(err.to_string())
    }
}
