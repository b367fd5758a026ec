//! Dispatch outcomes.

use std::fmt;

/// Result of delivering one event to the application.
///
/// Handler failures are folded into `Exception`; they never surface as a Rust
/// error to the runner's caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventOutcome {
    /// Handler completed successfully
    Ok,
    /// Handler (or handler resolution) failed
    Exception,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Exception => write!(f, "exception"),
        }
    }
}

/// Value returned by a custom event run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomEventResult {
    /// Outcome of the dispatch
    pub outcome: EventOutcome,
}

impl From<EventOutcome> for CustomEventResult {
    fn from(outcome: EventOutcome) -> Self {
        Self { outcome }
    }
}
