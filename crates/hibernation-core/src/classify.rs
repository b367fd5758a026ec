//! Handler failure classification.
//!
//! Failures carry a textual description. Two kinds of description are exempt
//! from the diagnostic log:
//!
//! - Tunneled: the error was raised by application code (possibly on a remote
//!   peer, in which case it is prefixed with one or more `remote.` markers)
//!   and is forwarded verbatim. The application already sees it.
//! - Do-not-log: the error was explicitly marked as not worth logging.
//!
//! Descriptions may be a `"; "`-separated chain of context segments; every
//! segment is inspected.

/// Marker prepended each time an error crosses a remote boundary.
pub const REMOTE_PREFIX: &str = "remote.";

/// Prefix of errors that were raised by application code and tunneled out.
pub const TUNNELED_PREFIX: &str = "jsg.";

/// Prefix of errors explicitly marked as not to be logged.
pub const DO_NOT_LOG_PREFIX: &str = "jsg-internal.DoNotLog";

/// Separator between context segments in a description.
const SEGMENT_DELIMITER: &str = "; ";

/// How a handler failure is treated for logging purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Forwarded application error; not logged
    Tunneled,
    /// Explicitly marked not-to-be-logged
    DoNotLog,
    /// Anything else; logged exactly once
    Uncategorized,
}

impl FailureClass {
    /// Whether a failure of this class gets a diagnostic log entry.
    pub fn should_log(self) -> bool {
        matches!(self, Self::Uncategorized)
    }
}

/// Rule set deciding which failures are exempt from logging.
pub trait ErrorClassifier: Send + Sync {
    /// Error was forwarded from application code or a remote peer.
    fn is_tunneled(&self, description: &str) -> bool;

    /// Error was explicitly marked as not to be logged.
    fn is_do_not_log(&self, description: &str) -> bool;

    /// Classify a description. Do-not-log wins over tunneled.
    fn classify(&self, description: &str) -> FailureClass {
        if self.is_do_not_log(description) {
            FailureClass::DoNotLog
        } else if self.is_tunneled(description) {
            FailureClass::Tunneled
        } else {
            FailureClass::Uncategorized
        }
    }
}

/// Prefix-based classifier matching the conventions documented above.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionClassifier;

impl DescriptionClassifier {
    /// Create the default classifier.
    pub fn new() -> Self {
        Self
    }
}

/// Strip leading whitespace and any number of remote markers.
fn strip_remote(mut segment: &str) -> &str {
    loop {
        segment = segment.trim_start();
        match segment.strip_prefix(REMOTE_PREFIX) {
            Some(rest) => segment = rest,
            None => return segment,
        }
    }
}

fn segments(description: &str) -> impl Iterator<Item = &str> {
    description.split(SEGMENT_DELIMITER).map(strip_remote)
}

impl ErrorClassifier for DescriptionClassifier {
    fn is_tunneled(&self, description: &str) -> bool {
        segments(description).any(|s| s.starts_with(TUNNELED_PREFIX))
    }

    fn is_do_not_log(&self, description: &str) -> bool {
        segments(description).any(|s| s.starts_with(DO_NOT_LOG_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_are_uncategorized() {
        let c = DescriptionClassifier::new();
        assert_eq!(c.classify("handler blew up"), FailureClass::Uncategorized);
        assert!(c.classify("handler blew up").should_log());
    }

    #[test]
    fn tunneled_errors_are_exempt() {
        let c = DescriptionClassifier::new();
        assert_eq!(c.classify("jsg.Error: boom"), FailureClass::Tunneled);
        assert_eq!(c.classify("remote.jsg.TypeError: nope"), FailureClass::Tunneled);
        assert_eq!(c.classify("remote.remote.jsg.Error: far"), FailureClass::Tunneled);
        assert!(!FailureClass::Tunneled.should_log());
    }

    #[test]
    fn tunneled_marker_found_in_later_segment() {
        let c = DescriptionClassifier::new();
        assert!(c.is_tunneled("worker threw; jsg.Error: inner"));
    }

    #[test]
    fn do_not_log_errors_are_exempt() {
        let c = DescriptionClassifier::new();
        assert_eq!(c.classify("jsg-internal.DoNotLog: quiet"), FailureClass::DoNotLog);
        assert_eq!(c.classify("remote.jsg-internal.DoNotLog"), FailureClass::DoNotLog);
        assert!(!FailureClass::DoNotLog.should_log());
    }

    #[test]
    fn markers_must_be_prefixes() {
        let c = DescriptionClassifier::new();
        assert_eq!(c.classify("failed near jsg.Error"), FailureClass::Uncategorized);
        assert_eq!(c.classify("jsgError"), FailureClass::Uncategorized);
    }
}
