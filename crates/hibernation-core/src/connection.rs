//! Per-socket hibernation state.
//!
//! A hibernatable connection outlives the actor's in-memory state. While the
//! actor is evicted the record only remembers the connection id; the live
//! handle the application talks to is rebuilt on demand by [`wake`].
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐   wake()    ┌────────┐
//! │ Hibernated │────────────>│ Active │──┐ wake() returns the same handle
//! └────────────┘             └────────┘<─┘
//! ```
//!
//! Eviction back to `Hibernated` is owned by whoever tears the actor down, so
//! there is no reverse transition here.
//!
//! [`wake`]: HibernatableConnection::wake

use crate::event::ConnectionId;

/// Lifecycle status of a connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No live handle; the socket is held open by the edge only
    Hibernated,
    /// Live handle constructed and owned by the record
    Active,
}

/// Connection record owned by the hibernation registry.
///
/// Generic over the live handle type so the record stays independent of the
/// execution engine that builds handles. Handles are expected to be cheap to
/// clone (reference counted); cloning never creates a new socket.
#[derive(Debug)]
pub struct HibernatableConnection<H> {
    id: ConnectionId,
    /// Present iff the connection is active
    active: Option<H>,
}

impl<H: Clone> HibernatableConnection<H> {
    /// Record for a resumed connection with no in-memory handle.
    pub fn hibernated(id: ConnectionId) -> Self {
        Self { id, active: None }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConnectionStatus {
        if self.active.is_some() { ConnectionStatus::Active } else { ConnectionStatus::Hibernated }
    }

    /// Live handle, if the connection is active.
    pub fn active_handle(&self) -> Option<&H> {
        self.active.as_ref()
    }

    /// Return the live handle, constructing it first if hibernated.
    ///
    /// `unhibernate` runs at most once per record. Once active, every call
    /// returns a clone of the same handle and the factory is not invoked.
    pub fn wake<F>(&mut self, unhibernate: F) -> H
    where
        F: FnOnce(ConnectionId) -> H,
    {
        let id = self.id;
        self.active.get_or_insert_with(|| unhibernate(id)).clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, sync::Arc};

    use super::*;

    #[test]
    fn new_record_is_hibernated() {
        let conn: HibernatableConnection<Arc<u64>> = HibernatableConnection::hibernated(9);
        assert_eq!(conn.id(), 9);
        assert_eq!(conn.status(), ConnectionStatus::Hibernated);
        assert!(conn.active_handle().is_none());
    }

    #[test]
    fn wake_activates_once() {
        let mut conn = HibernatableConnection::hibernated(3);
        let built = Cell::new(0);

        let first = conn.wake(|id| {
            built.set(built.get() + 1);
            Arc::new(id)
        });
        assert_eq!(conn.status(), ConnectionStatus::Active);

        let second = conn.wake(|id| {
            built.set(built.get() + 1);
            Arc::new(id)
        });

        assert_eq!(built.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, 3);
    }

    #[test]
    fn active_handle_is_the_woken_handle() {
        let mut conn = HibernatableConnection::hibernated(1);
        let handle = conn.wake(|_| Arc::new("socket"));

        let stored = conn.active_handle().cloned();
        assert!(stored.is_some_and(|h| Arc::ptr_eq(&h, &handle)));
    }
}
