//! Custom event seam of the request pipeline.
//!
//! The pipeline runs events either locally or by forwarding them to another
//! process through a [`RemoteDispatcher`]. Event types that only exist
//! locally refuse the remote path.

use async_trait::async_trait;
use bytes::Bytes;
use hibernation_core::{CustomEventResult, DispatchError};

use crate::request::{IncomingRequest, TaskSet};

/// Transport used to deliver events to a remote process.
#[async_trait]
pub trait RemoteDispatcher: Send + Sync {
    /// Deliver an encoded event of type `type_id`.
    async fn dispatch(
        &self,
        type_id: u16,
        payload: Bytes,
    ) -> Result<CustomEventResult, DispatchError>;
}

/// An event the request pipeline can run.
#[async_trait]
pub trait CustomEvent: Send + Sized {
    /// Wire type id of the event category.
    fn type_id(&self) -> u16;

    /// Deliver the event locally on `request`.
    async fn run(
        self,
        request: Box<dyn IncomingRequest>,
        entrypoint: Option<&str>,
    ) -> Result<CustomEventResult, DispatchError>;

    /// Deliver the event through a remote dispatcher.
    async fn send_rpc(
        self,
        dispatcher: &dyn RemoteDispatcher,
        wait_until: &TaskSet,
    ) -> Result<CustomEventResult, DispatchError>;
}
