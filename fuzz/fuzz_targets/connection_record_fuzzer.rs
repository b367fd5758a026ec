//! Fuzz target for connection records and dispatch contexts
//!
//! # Strategy
//!
//! - Random interleavings of wakes and status checks on a few records
//! - Dispatch contexts for every event kind, with error access attempts
//!
//! # Invariants
//!
//! - A record builds its handle at most once; later wakes return it
//! - A record is Active iff it has been woken
//! - Error access succeeds only for error contexts

#![no_main]

use std::{collections::HashMap, sync::Arc};

use arbitrary::Arbitrary;
use hibernation_core::{
    ConnectionStatus, DispatchContext, DispatchError, EventKind, HibernatableConnection,
    SocketError,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum RecordOp {
    Wake { record: u8 },
    CheckStatus { record: u8 },
    Context { occupant: u8, kind: KindChoice, description: String },
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum KindChoice {
    Text,
    Binary,
    Close,
    Error,
}

fuzz_target!(|ops: Vec<RecordOp>| {
    let mut records: Vec<HibernatableConnection<Arc<u64>>> =
        (0..4).map(HibernatableConnection::hibernated).collect();
    let mut handles: HashMap<u64, Arc<u64>> = HashMap::new();

    for op in ops {
        match op {
            RecordOp::Wake { record } => {
                let conn = &mut records[usize::from(record % 4)];
                let mut built = 0;
                let handle = conn.wake(|id| {
                    built += 1;
                    Arc::new(id)
                });

                match handles.get(&conn.id()) {
                    Some(existing) => {
                        assert_eq!(built, 0, "woken record rebuilt its handle");
                        assert!(Arc::ptr_eq(existing, &handle));
                    },
                    None => {
                        assert_eq!(built, 1);
                        handles.insert(conn.id(), handle);
                    },
                }
            },
            RecordOp::CheckStatus { record } => {
                let conn = &records[usize::from(record % 4)];
                let expected = if handles.contains_key(&conn.id()) {
                    ConnectionStatus::Active
                } else {
                    ConnectionStatus::Hibernated
                };
                assert_eq!(conn.status(), expected);
                assert_eq!(conn.active_handle().is_some(), expected == ConnectionStatus::Active);
            },
            RecordOp::Context { occupant, kind, description } => {
                let occupant = u64::from(occupant);
                let context = match kind {
                    KindChoice::Text => DispatchContext::new(occupant, EventKind::Text),
                    KindChoice::Binary => DispatchContext::new(occupant, EventKind::Binary),
                    KindChoice::Close => DispatchContext::new(occupant, EventKind::Close),
                    KindChoice::Error => {
                        DispatchContext::for_error(occupant, SocketError::new(description.clone()))
                    },
                };

                assert_eq!(context.occupant(), occupant);
                match (kind, context.error()) {
                    (KindChoice::Error, Ok(error)) => assert_eq!(error.description(), description),
                    (KindChoice::Error, Err(e)) => panic!("error context refused access: {e}"),
                    (_, Ok(_)) => panic!("non-error context exposed an error"),
                    (_, Err(e)) => {
                        assert_eq!(e, DispatchError::NotAnErrorEvent { kind: context.kind() });
                    },
                }
            },
        }
    }
});
