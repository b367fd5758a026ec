//! Tracing capture for log assertions.

#![allow(clippy::disallowed_types, reason = "Synchronous recording only")]

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hibernation_runtime::DISPATCH_LOG_TARGET;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    subscriber::DefaultGuard,
};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
};

/// One captured tracing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLog {
    /// Event level
    pub level: Level,
    /// Event target
    pub target: String,
    /// Formatted message
    pub message: String,
    /// Other fields, formatted, in recording order
    pub fields: Vec<(String, String)>,
}

impl CapturedLog {
    /// Value of field `name`, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

struct FieldVisitor<'a>(&'a mut CapturedLog);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_string();
        } else {
            self.0.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.0.message = value;
        } else {
            self.0.fields.push((field.name().to_string(), value));
        }
    }
}

/// Layer that keeps every event it sees. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogCapture {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<CapturedLog>> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install as the thread's default subscriber until the guard drops.
    ///
    /// Only events emitted on this thread are captured; use a current-thread
    /// runtime.
    pub fn install(&self) -> DefaultGuard {
        tracing_subscriber::registry().with(self.clone()).set_default()
    }

    /// Every event captured so far.
    pub fn logs(&self) -> Vec<CapturedLog> {
        self.buffer().clone()
    }

    /// Events captured for `target`.
    pub fn at_target(&self, target: &str) -> Vec<CapturedLog> {
        self.buffer().iter().filter(|log| log.target == target).cloned().collect()
    }

    /// Handler failure diagnostics emitted by the dispatcher.
    pub fn dispatch_failures(&self) -> Vec<CapturedLog> {
        self.at_target(DISPATCH_LOG_TARGET)
            .into_iter()
            .filter(|log| log.level == Level::ERROR)
            .collect()
    }

    /// Number of events at `level`.
    pub fn count_at(&self, level: Level) -> usize {
        self.buffer().iter().filter(|log| log.level == level).count()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut log = CapturedLog {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut FieldVisitor(&mut log));
        self.buffer().push(log);
    }
}
