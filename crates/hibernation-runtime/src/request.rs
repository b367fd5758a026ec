//! Request pipeline seam and background task set.
//!
//! Every dispatch rides on an incoming request owned by the surrounding
//! pipeline. The runner marks it delivered before application code runs and
//! hands its drain future to a [`TaskSet`]; the drain is never awaited inline.

#![allow(clippy::disallowed_types, reason = "Mutex is never held across an await")]

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinSet};

/// Incoming request that a dispatch is delivered on.
pub trait IncomingRequest: Send {
    /// Mark the request as delivered. Called exactly once, before any
    /// application code runs.
    fn delivered(&mut self);

    /// Finalize the request. The returned future runs in the background.
    fn drain(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Background tasks that outlive the dispatch that scheduled them
/// ("wait until" tasks).
///
/// Cheap to clone; clones share the same set. Adding a task requires a Tokio
/// runtime context. Finished tasks are reaped whenever a task is added, so a
/// long-lived set only holds tasks that were still running at the last `add`.
#[derive(Clone, Default)]
pub struct TaskSet {
    inner: Arc<Mutex<Tasks>>,
}

#[derive(Default)]
struct Tasks {
    running: JoinSet<()>,
    /// Tasks reaped by `add` since the last `join_all`.
    reaped: usize,
}

impl Tasks {
    fn reap(&mut self) {
        while let Some(result) = self.running.try_join_next() {
            self.reaped += 1;
            log_join_error(result);
        }
    }
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::warn!("background task failed: {}", e);
    }
}

impl TaskSet {
    /// Create an empty task set.
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reap finished tasks, then spawn `task` into the set without waiting
    /// for it.
    pub fn add<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        tasks.reap();
        let _handle = tasks.running.spawn(task);
    }

    /// Number of tasks not yet reaped or joined.
    ///
    /// Tasks that finished after the last `add` are still counted.
    pub fn len(&self) -> usize {
        self.tasks().running.len()
    }

    /// Whether the set holds no unreaped tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks().running.is_empty()
    }

    /// Wait for every task, including ones added while waiting.
    ///
    /// Returns the number of tasks finished since the previous `join_all`,
    /// counting those already reaped by `add`. Panicked or cancelled tasks are
    /// logged and counted.
    pub async fn join_all(&self) -> usize {
        let mut joined = std::mem::take(&mut self.tasks().reaped);
        loop {
            let mut batch = std::mem::take(&mut self.tasks().running);
            if batch.is_empty() {
                joined += std::mem::take(&mut self.tasks().reaped);
                return joined;
            }

            while let Some(result) = batch.join_next().await {
                joined += 1;
                log_join_error(result);
            }
        }
    }
}
