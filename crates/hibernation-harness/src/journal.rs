//! Ordered record of everything the doubles observed.

#![allow(clippy::disallowed_types, reason = "Synchronous recording only")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hibernation_core::{ConnectionId, EventKind};

/// One observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Request was marked delivered
    Delivered {
        /// Request id
        request: u64,
    },
    /// Request drain future was handed to the task set
    DrainScheduled {
        /// Request id
        request: u64,
    },
    /// Request drain future ran to completion
    Drained {
        /// Request id
        request: u64,
    },
    /// Engine rebuilt a live socket
    Unhibernated {
        /// Connection woken
        connection_id: ConnectionId,
    },
    /// Entry point started
    HandlerEntered {
        /// Connection served
        connection_id: ConnectionId,
        /// Event kind
        kind: EventKind,
    },
    /// Entry point returned
    HandlerExited {
        /// Connection served
        connection_id: ConnectionId,
        /// Event kind
        kind: EventKind,
        /// Whether the entry point returned an error
        failed: bool,
    },
}

/// Shared, append-only trace. Clones share the same journal.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an observation.
    pub fn record(&self, event: TraceEvent) {
        self.events().push(event);
    }

    /// Copy of every observation so far.
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.events().clone()
    }

    /// Number of observations matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&TraceEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Position of the first observation equal to `event`.
    pub fn position(&self, event: &TraceEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}
