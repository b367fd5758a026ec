//! Test harness for hibernatable socket dispatch.
//!
//! Doubles for the seams of `hibernation-runtime` that record what the runner
//! does to them, in order, into a shared [`Journal`].
//!
//! # Components
//!
//! - [`RecordingEngine`]: handler engine that records every entry point call
//!   and can be told to fail, skip waking, block or panic
//! - [`ProbeRequest`]: incoming request that journals delivery and drains
//! - [`LogCapture`]: tracing layer that keeps emitted events for assertions
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties over a recorded journal that
//! must hold for any dispatch sequence: requests are delivered before handlers
//! run, handlers of one actor never overlap, every request drains at most
//! once and a connection is woken at most once. Use
//! [`InvariantRegistry::standard()`] to check them all.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
pub mod invariants;
mod journal;
mod logs;
mod request;

pub use engine::{Gate, HandlerCall, RecordedSocket, RecordingEngine, WakeMode};
pub use invariants::{
    DeliveredBeforeHandler, DrainAtMostOnce, HandlersDoNotOverlap, Invariant, InvariantRegistry,
    InvariantResult, SingleWakePerConnection, Violation,
};
pub use journal::{Journal, TraceEvent};
pub use logs::{CapturedLog, LogCapture};
pub use request::ProbeRequest;
