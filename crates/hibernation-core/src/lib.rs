//! Core types for waking hibernated WebSocket connections.
//!
//! Pure state, no I/O and no async runtime. The runtime crate wires these
//! pieces to an execution engine and a request pipeline.
//!
//! # Components
//!
//! - [`HibernatableConnection`]: per-socket record with the idempotent wake
//!   transition
//! - [`DispatchContext`]: which connection is being served, plus the captured
//!   error for error events
//! - [`SocketEvent`]: the four event kinds a dispatch can carry
//! - [`EventOutcome`]: what a dispatch reports back
//! - [`ErrorClassifier`]: decides which handler failures get logged

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod connection;
pub mod error;
pub mod event;
pub mod outcome;
pub mod package;

pub use classify::{DescriptionClassifier, ErrorClassifier, FailureClass};
pub use connection::{ConnectionStatus, HibernatableConnection};
pub use error::{DispatchError, HandlerError};
pub use event::{
    ConnectionId, EventKind, HIBERNATABLE_SOCKET_EVENT_TYPE, HibernatableSocketParams,
    SocketError, SocketEvent,
};
pub use outcome::{CustomEventResult, EventOutcome};
pub use package::DispatchContext;
