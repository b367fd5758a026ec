//! Hibernatable WebSocket runtime.
//!
//! Delivers events for connections whose actor has been evicted from memory.
//! Each event wakes the connection's live handle on demand, runs exactly one
//! application entry point under the actor's execution lock, and reports an
//! [`EventOutcome`](hibernation_core::EventOutcome).
//!
//! # Architecture
//!
//! This crate wraps the pure state from [`hibernation_core`] with the pieces
//! that need a runtime: the per-actor [`HibernationRegistry`] with its
//! dispatch slot, the [`SocketDispatcher`] that runs the dispatch protocol,
//! and the seams to the outside world ([`HandlerEngine`], [`IncomingRequest`],
//! [`RemoteDispatcher`]).
//!
//! # Components
//!
//! - [`HibernationRegistry`]: connection records and the single dispatch slot
//! - [`SocketDispatcher`]: per-actor runner; [`HibernatableSocketEvent`] is
//!   one runnable event
//! - [`SocketEventFacade`]: what handlers see (wake-on-access, error access)
//! - [`TaskSet`]: background tasks drains are scheduled on
//! - [`replay`]: scripted event replay used by the `hibernation-replay` binary

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actor;
mod config;
mod custom_event;
mod engine;
mod facade;
mod registry;
pub mod replay;
mod request;
mod runner;
pub mod script;

pub use actor::{ActorContext, ExecutionLock};
pub use config::{DispatchPolicy, RunnerConfig};
pub use custom_event::{CustomEvent, RemoteDispatcher};
pub use engine::HandlerEngine;
pub use facade::SocketEventFacade;
pub use registry::{DispatchSlot, HibernationRegistry};
pub use request::{IncomingRequest, TaskSet};
pub use runner::{DISPATCH_LOG_TARGET, HibernatableSocketEvent, SocketDispatcher};
