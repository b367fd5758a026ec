//! Actor execution context.
//!
//! All application code of one actor runs under a single execution lock, the
//! same lock other (non-socket) work for that actor takes. Handlers receive
//! a reference to the held lock as proof they run inside the actor.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

/// Shared execution context of one actor.
#[derive(Debug, Clone)]
pub struct ActorContext {
    actor_id: u64,
    execution: Arc<Mutex<()>>,
}

impl ActorContext {
    /// Create the context for an actor.
    pub fn new(actor_id: u64) -> Self {
        Self { actor_id, execution: Arc::new(Mutex::new(())) }
    }

    /// Actor this context belongs to.
    pub fn actor_id(&self) -> u64 {
        self.actor_id
    }

    /// Wait for the actor's execution lock.
    pub async fn lock(&self) -> ExecutionLock<'_> {
        ExecutionLock { actor_id: self.actor_id, _guard: self.execution.lock().await }
    }

    /// Whether some task currently holds the execution lock.
    pub fn is_locked(&self) -> bool {
        self.execution.try_lock().is_err()
    }
}

/// Held execution lock of an actor. Released on drop.
#[derive(Debug)]
pub struct ExecutionLock<'a> {
    actor_id: u64,
    _guard: MutexGuard<'a, ()>,
}

impl ExecutionLock<'_> {
    /// Actor the lock belongs to.
    pub fn actor_id(&self) -> u64 {
        self.actor_id
    }
}
