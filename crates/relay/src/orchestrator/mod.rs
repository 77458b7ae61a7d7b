//! Orchestrators that run drivers from start to finish.
//!
//! - [`TransferOrchestrator`]: one resource, receive then forward, then drain
//! - [`SpliceOrchestrator`]: a source and a sink resource; the sink starts
//!   once the first response bytes (and so the response headers) exist
//!
//! Both own their drivers for exactly the duration of `run`, so drivers and
//! their buffers are released on every exit path. Any error aborts the run
//! at once; the orchestrator then sits in [`TransferPhase::Failed`] with the
//! error's numeric code.

use bytes::{Bytes, BytesMut};

use crate::driver::{DrainStatus, StreamDriver, WriteStatus};
use crate::protocol::RelayError;
use crate::resource::{HttpManager, Resource};

mod splice;
mod transfer;

pub use splice::SpliceOrchestrator;
pub use splice::SpliceReport;
pub use transfer::TransferOrchestrator;

/// Where an orchestrator currently is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferPhase {
    Init,
    Reading,
    Writing,
    Draining,
    Done,
    /// Aborted with this code
    Failed(i32),
}

impl TransferPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, TransferPhase::Done | TransferPhase::Failed(_))
    }
}

/// Counters of one orchestrator run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes received from the reading side
    pub bytes_read: u64,
    /// Bytes accepted by the writing side
    pub bytes_written: u64,
    /// Non-empty chunks read
    pub chunks: u64,
    pub read_calls: u64,
    pub write_calls: u64,
    /// Terminal result code of the drained resource
    pub result_code: i32,
}

/// Reads the next chunk, calling `read` again for as long as it is pending.
///
/// An empty chunk marks the end of the stream.
async fn read_chunk<R, M>(driver: &mut StreamDriver<R, M>, max_size: usize, report: &mut TransferReport) -> Result<Bytes, RelayError>
where
    R: Resource,
    M: HttpManager<R>,
{
    let mut chunk = BytesMut::new();
    loop {
        report.read_calls += 1;
        if !driver.read(&mut chunk, max_size).await?.is_pending() {
            return Ok(chunk.freeze());
        }
    }
}

/// Writes `chunk`, calling `write` again while the send window is full.
async fn write_chunk<R, M>(driver: &mut StreamDriver<R, M>, chunk: &Bytes, report: &mut TransferReport) -> Result<(), RelayError>
where
    R: Resource,
    M: HttpManager<R>,
{
    loop {
        report.write_calls += 1;
        let status = driver.write(chunk).await?;
        if !status.need_retry() {
            if status == WriteStatus::Submitted {
                report.bytes_written += chunk.len() as u64;
            }
            return Ok(());
        }
    }
}

/// Drains `driver` until its resource is done and returns the result code.
async fn drain<R, M>(driver: &mut StreamDriver<R, M>) -> Result<i32, RelayError>
where
    R: Resource,
    M: HttpManager<R>,
{
    loop {
        if let DrainStatus::Complete(code) = driver.drain_writes().await? {
            return Ok(code);
        }
    }
}
