//! Invariant checks over a dispatch journal.
//!
//! Invariants describe what must hold for any sequence of dispatches on one
//! actor, independent of the scenario that produced the journal.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.assert_all(&journal.snapshot(), "after scenario A");
//! ```

use std::collections::{HashMap, HashSet};

use hibernation_core::ConnectionId;

use crate::journal::TraceEvent;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a recorded journal.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the trace.
    fn check(&self, trace: &[TraceEvent]) -> InvariantResult;

    /// Build a violation of this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// No handler starts before the request carrying it was marked delivered.
///
/// Requests and handlers are matched by count: at every handler start, more
/// requests must have been delivered than handlers started before it.
pub struct DeliveredBeforeHandler;

impl Invariant for DeliveredBeforeHandler {
    fn name(&self) -> &'static str {
        "DeliveredBeforeHandler"
    }

    fn check(&self, trace: &[TraceEvent]) -> InvariantResult {
        let mut delivered = 0usize;
        let mut entered = 0usize;
        for (index, event) in trace.iter().enumerate() {
            match event {
                TraceEvent::Delivered { .. } => delivered += 1,
                TraceEvent::HandlerEntered { connection_id, .. } => {
                    entered += 1;
                    if entered > delivered {
                        return Err(self.violation(format!(
                            "handler for connection {connection_id} started at {index} with \
                             only {delivered} requests delivered"
                        )));
                    }
                },
                _ => {},
            }
        }
        Ok(())
    }
}

/// Handlers of one actor run one at a time.
pub struct HandlersDoNotOverlap;

impl Invariant for HandlersDoNotOverlap {
    fn name(&self) -> &'static str {
        "HandlersDoNotOverlap"
    }

    fn check(&self, trace: &[TraceEvent]) -> InvariantResult {
        let mut running: Option<ConnectionId> = None;
        for (index, event) in trace.iter().enumerate() {
            match event {
                TraceEvent::HandlerEntered { connection_id, .. } => {
                    if let Some(current) = running {
                        return Err(self.violation(format!(
                            "handler for connection {connection_id} started at {index} while \
                             connection {current} was still running"
                        )));
                    }
                    running = Some(*connection_id);
                },
                TraceEvent::HandlerExited { .. } => running = None,
                _ => {},
            }
        }
        Ok(())
    }
}

/// Each request drain is scheduled at most once, and only runs after being
/// scheduled.
pub struct DrainAtMostOnce;

impl Invariant for DrainAtMostOnce {
    fn name(&self) -> &'static str {
        "DrainAtMostOnce"
    }

    fn check(&self, trace: &[TraceEvent]) -> InvariantResult {
        let mut scheduled = HashSet::new();
        for event in trace {
            match event {
                TraceEvent::DrainScheduled { request } => {
                    if !scheduled.insert(*request) {
                        return Err(self.violation(format!("request {request} drained twice")));
                    }
                },
                TraceEvent::Drained { request } => {
                    if !scheduled.contains(request) {
                        return Err(self.violation(format!(
                            "request {request} drain ran without being scheduled"
                        )));
                    }
                },
                _ => {},
            }
        }
        Ok(())
    }
}

/// A connection is rebuilt at most once.
pub struct SingleWakePerConnection;

impl Invariant for SingleWakePerConnection {
    fn name(&self) -> &'static str {
        "SingleWakePerConnection"
    }

    fn check(&self, trace: &[TraceEvent]) -> InvariantResult {
        let mut wakes: HashMap<ConnectionId, usize> = HashMap::new();
        for event in trace {
            if let TraceEvent::Unhibernated { connection_id } = event {
                let count = wakes.entry(*connection_id).or_default();
                *count += 1;
                if *count > 1 {
                    return Err(self.violation(format!(
                        "connection {connection_id} woken {count} times"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every dispatch invariant.
    ///
    /// Includes:
    /// - [`DeliveredBeforeHandler`]
    /// - [`HandlersDoNotOverlap`]
    /// - [`DrainAtMostOnce`]
    /// - [`SingleWakePerConnection`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(DeliveredBeforeHandler);
        registry.add(HandlersDoNotOverlap);
        registry.add(DrainAtMostOnce);
        registry.add(SingleWakePerConnection);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the trace.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, trace: &[TraceEvent]) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(trace).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, trace: &[TraceEvent], context: &str) {
        if let Err(violations) = self.check_all(trace) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }
}
