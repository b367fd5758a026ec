//! Per-actor hibernation registry.
//!
//! Owns every connection record of one actor and the single dispatch slot.
//! The slot is guarded by a one-permit semaphore: holding the permit is what
//! makes a dispatch "in progress". The permit lives inside [`DispatchSlot`],
//! so dropping the slot (on completion, error or cancellation) always clears
//! the dispatch context and frees the actor for the next event.
//!
//! Record state sits behind a synchronous mutex. It is only ever held for the
//! duration of a lookup or a wake, never across an await.

#![allow(clippy::disallowed_types, reason = "Mutex is never held across an await")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hibernation_core::{
    ConnectionId, ConnectionStatus, DispatchContext, DispatchError, HibernatableConnection,
    SocketError,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::config::DispatchPolicy;

struct RegistryState<H> {
    /// Connection ID → record
    connections: HashMap<ConnectionId, HibernatableConnection<H>>,
    /// Present only while a dispatch holds the slot
    package: Option<DispatchContext>,
}

struct Inner<H> {
    state: Mutex<RegistryState<H>>,
    slot: Arc<Semaphore>,
    policy: DispatchPolicy,
}

/// Actor-scoped table of hibernatable connections.
///
/// Cheap to clone; clones share the same records and dispatch slot.
pub struct HibernationRegistry<H> {
    inner: Arc<Inner<H>>,
}

impl<H> Clone for HibernationRegistry<H> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<H: Clone> Default for HibernationRegistry<H> {
    fn default() -> Self {
        Self::new(DispatchPolicy::default())
    }
}

impl<H: Clone> HibernationRegistry<H> {
    /// Create an empty registry with the given overlap policy.
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState { connections: HashMap::new(), package: None }),
                slot: Arc::new(Semaphore::new(1)),
                policy,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState<H>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Policy applied to overlapping dispatches.
    pub fn policy(&self) -> DispatchPolicy {
        self.inner.policy
    }

    /// Register a hibernated connection.
    ///
    /// Returns `false` if the connection is already known.
    pub fn accept(&self, id: ConnectionId) -> bool {
        let mut state = self.state();
        if state.connections.contains_key(&id) {
            return false;
        }
        state.connections.insert(id, HibernatableConnection::hibernated(id));
        true
    }

    /// Forget a connection. Returns its last status, `None` if unknown.
    pub fn remove(&self, id: ConnectionId) -> Option<ConnectionStatus> {
        self.state().connections.remove(&id).map(|conn| conn.status())
    }

    /// Status of a connection. `None` if unknown.
    pub fn status(&self, id: ConnectionId) -> Option<ConnectionStatus> {
        self.state().connections.get(&id).map(HibernatableConnection::status)
    }

    /// Live handle of a connection, without waking it.
    pub fn active_handle(&self, id: ConnectionId) -> Option<H> {
        self.state().connections.get(&id).and_then(|conn| conn.active_handle().cloned())
    }

    /// Number of known connections.
    pub fn len(&self) -> usize {
        self.state().connections.len()
    }

    /// Whether no connections are known.
    pub fn is_empty(&self) -> bool {
        self.state().connections.is_empty()
    }

    /// Number of connections with a live handle.
    pub fn active_count(&self) -> usize {
        self.state()
            .connections
            .values()
            .filter(|conn| conn.status() == ConnectionStatus::Active)
            .count()
    }

    /// Whether a dispatch currently holds the slot.
    pub fn is_dispatching(&self) -> bool {
        self.state().package.is_some()
    }

    /// Snapshot of the current dispatch context.
    pub fn current(&self) -> Result<DispatchContext, DispatchError> {
        self.state().package.clone().ok_or(DispatchError::NoActiveDispatch)
    }

    /// Claim the dispatch slot and install `context` as the current package.
    ///
    /// The occupant's record is created (hibernated) if the registry has not
    /// seen it yet. Under [`DispatchPolicy::Queue`] this waits for the slot;
    /// under [`DispatchPolicy::Reject`] it fails immediately when occupied.
    ///
    /// # Errors
    ///
    /// - `DispatchError::DispatchInProgress` if the slot is taken (reject)
    /// - `DispatchError::RegistryClosed` if the registry was closed
    pub async fn begin_dispatch(
        &self,
        context: DispatchContext,
    ) -> Result<DispatchSlot<H>, DispatchError> {
        let slot = Arc::clone(&self.inner.slot);
        let permit = match self.inner.policy {
            DispatchPolicy::Reject => match slot.try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::Closed) => return Err(DispatchError::RegistryClosed),
                Err(TryAcquireError::NoPermits) => {
                    let occupant =
                        self.state().package.as_ref().map_or(context.occupant(), |p| p.occupant());
                    tracing::warn!(
                        occupant,
                        rejected = context.occupant(),
                        "rejecting overlapping hibernatable socket dispatch"
                    );
                    return Err(DispatchError::DispatchInProgress { occupant });
                },
            },
            DispatchPolicy::Queue => {
                slot.acquire_owned().await.map_err(|_| DispatchError::RegistryClosed)?
            },
        };

        let mut state = self.state();
        let occupant = context.occupant();
        state
            .connections
            .entry(occupant)
            .or_insert_with(|| HibernatableConnection::hibernated(occupant));
        debug_assert!(state.package.is_none(), "slot permit held but package already installed");
        state.package = Some(context);

        Ok(DispatchSlot { registry: self.clone(), _permit: permit })
    }

    /// Wake the current occupant and return its live handle.
    ///
    /// `unhibernate` is only called when the occupant has no handle yet. It
    /// runs while the registry is locked and must not call back into it.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NoActiveDispatch` outside a dispatch
    /// - `DispatchError::UnknownConnection` if the occupant was removed
    pub fn wake_occupant<F>(&self, unhibernate: F) -> Result<H, DispatchError>
    where
        F: FnOnce(ConnectionId) -> H,
    {
        let mut state = self.state();
        let occupant = state.package.as_ref().ok_or(DispatchError::NoActiveDispatch)?.occupant();
        let conn =
            state.connections.get_mut(&occupant).ok_or(DispatchError::UnknownConnection(occupant))?;

        if conn.status() == ConnectionStatus::Hibernated {
            tracing::debug!(connection_id = occupant, "waking hibernated connection");
        }

        Ok(conn.wake(unhibernate))
    }

    /// Error captured for the current dispatch.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NoActiveDispatch` outside a dispatch
    /// - `DispatchError::NotAnErrorEvent` unless the current event is an error
    pub fn captured_error(&self) -> Result<SocketError, DispatchError> {
        let state = self.state();
        let package = state.package.as_ref().ok_or(DispatchError::NoActiveDispatch)?;
        package.error().cloned()
    }

    /// Tear the registry down with its actor.
    ///
    /// Drops every record and closes the dispatch slot: queued and future
    /// dispatches fail with `DispatchError::RegistryClosed`. A dispatch that
    /// already holds the slot still clears it when it finishes or is dropped.
    pub fn close(&self) {
        self.inner.slot.close();
        self.state().connections.clear();
    }
}

/// Proof that a dispatch holds the registry's slot.
///
/// Dropping it clears the dispatch context and releases the slot.
pub struct DispatchSlot<H> {
    registry: HibernationRegistry<H>,
    _permit: OwnedSemaphorePermit,
}

impl<H> Drop for DispatchSlot<H> {
    fn drop(&mut self) {
        let mut state = self.registry.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.package = None;
    }
}
