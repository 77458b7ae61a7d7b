//! Collaborator contracts of the relay core.
//!
//! A [`Resource`] is one live HTTP exchange owned by the network layer; an
//! [`HttpManager`] executes resources asynchronously. Drivers only talk to the
//! network through these two traits, so any HTTP stack can sit behind them.
//! [`loopback`] provides an in-process pair driven by hand.

use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::io::AsyncDataBuffer;
use crate::protocol::{HeaderList, IoToken, ResourceState};

pub mod loopback;

/// Per-connection state of one HTTP exchange, shared between a driver and the network layer.
///
/// Implementations use interior mutability: the network layer updates the
/// resource from its own threads while the driving task reads it. Whenever
/// the resource becomes done, or flushes outbound bytes, the implementation
/// must signal its io token through the scheduler.
#[trait_variant::make(Resource: Send)]
pub trait LocalResource: Sync {
    fn state(&self) -> ResourceState;

    fn io_token(&self) -> Option<IoToken>;

    fn set_io_token(&self, token: IoToken);

    /// Attaches the buffer incoming bytes are pushed into.
    ///
    /// Only a weak handle is kept: the driver owns the buffer, and bytes that
    /// arrive after it is gone are discarded.
    fn set_data_sink(&self, sink: Weak<AsyncDataBuffer>);

    /// Queues `data` on the outbound path.
    async fn add_send_data(&self, data: Bytes) -> Result<(), i32>;

    /// Outbound bytes queued but not yet flushed to the network.
    fn pending_send_bytes(&self) -> usize;

    /// Announces that no more outbound data will follow.
    fn finish_write(&self);

    /// Terminal result code; only meaningful once the state is done.
    fn result_code(&self) -> i32;

    fn response_headers(&self) -> HeaderList;

    fn set_send_length(&self, length: u64);

    fn append_header(&self, name: &str, value: &str);
}

/// Executes resources asynchronously.
pub trait HttpManager<R>: Send + Sync {
    /// Accepts `resource` for execution.
    ///
    /// # Errors
    ///
    /// Returns the manager's negative error code when the resource can't be submitted.
    fn add_request(&self, resource: Arc<R>) -> Result<(), i32>;
}
