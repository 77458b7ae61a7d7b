use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, error, trace, warn};

use crate::config::RelayConfig;
use crate::io::{AsyncDataBuffer, IoScheduler};
use crate::protocol::{IoToken, RelayError};
use crate::resource::{HttpManager, Resource};
use crate::ensure;

/// Outcome of one [`StreamDriver::read`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// Woken without data to claim; call again
    Pending,
    /// Data was appended to the output, or nothing was and the stream is exhausted
    Ready,
}

impl ReadStatus {
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, ReadStatus::Pending)
    }
}

/// Outcome of one [`StreamDriver::write`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// The chunk was queued on the outbound path
    Submitted,
    /// The send window was full; the chunk was not queued, call again
    Blocked,
    /// The resource is already done; the chunk was dropped
    Closed,
}

impl WriteStatus {
    #[inline]
    pub fn need_retry(self) -> bool {
        matches!(self, WriteStatus::Blocked)
    }
}

/// Outcome of one [`StreamDriver::drain_writes`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DrainStatus {
    /// The resource is not done yet; call again
    Retry,
    /// The resource finished with this result code
    Complete(i32),
}

impl DrainStatus {
    #[inline]
    pub fn need_retry(self) -> bool {
        matches!(self, DrainStatus::Retry)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DrainState {
    Idle,
    Finalized,
    Complete(i32),
}

/// Drives one live resource through buffered reads, writes and the final drain.
///
/// The three operations are independent: each can be suspended on the
/// resource's io token and re-entered by calling it again. A driver suspends
/// only while waiting for the network inside `read`, when yielding after a
/// submission (or waiting for send window) inside `write`, and while waiting
/// for completion inside `drain_writes`.
///
/// # Lifecycle
///
/// [`init`](StreamDriver::init) must be called exactly once before any other
/// operation. The driver owns the [`AsyncDataBuffer`] it attaches to the
/// resource; dropping the driver frees the buffer and releases its io token,
/// while the resource itself stays with whoever shared it.
#[derive(Debug)]
pub struct StreamDriver<R, M> {
    resource: Arc<R>,
    manager: Arc<M>,
    scheduler: IoScheduler,
    config: RelayConfig,
    token: Option<IoToken>,
    buffer: Option<Arc<AsyncDataBuffer>>,
    read_pending: bool,
    drain_state: DrainState,
}

impl<R, M> StreamDriver<R, M>
where
    R: Resource,
    M: HttpManager<R>,
{
    pub fn new(resource: Arc<R>, manager: Arc<M>, scheduler: IoScheduler, config: RelayConfig) -> Self {
        Self { resource, manager, scheduler, config, token: None, buffer: None, read_pending: false, drain_state: DrainState::Idle }
    }

    /// Registers an io token, attaches a fresh data buffer and submits the resource.
    ///
    /// # Errors
    ///
    /// [`RelayError::Submission`] with the manager's code if the manager
    /// refuses the resource, [`RelayError::InvalidState`] on a second call.
    pub fn init(&mut self) -> Result<(), RelayError> {
        ensure!(self.token.is_none(), RelayError::invalid_state("driver already initialized"));

        let token = self.scheduler.init_new_io(&*self.resource);
        let buffer = Arc::new(AsyncDataBuffer::new(self.scheduler.clone(), token));
        self.resource.set_data_sink(Arc::downgrade(&buffer));
        self.token = Some(token);
        self.buffer = Some(buffer);

        if let Err(code) = self.manager.add_request(Arc::clone(&self.resource)) {
            error!(%token, code, "failed to submit resource to http manager");
            return Err(RelayError::submission(code));
        }

        debug!(%token, "resource submitted");
        Ok(())
    }

    /// Claims up to `max_size` received bytes into `out`.
    ///
    /// Waits for the network only when the buffer is empty and the resource is
    /// still running. Returns [`ReadStatus::Pending`] when that wait ended
    /// without anything to claim. A `Ready` call that appended nothing means
    /// the resource is done and every received byte has been claimed.
    ///
    /// # Errors
    ///
    /// [`RelayError::StreamIncomplete`] once the input is exhausted if the
    /// resource finished with a negative code.
    pub async fn read(&mut self, out: &mut BytesMut, max_size: usize) -> Result<ReadStatus, RelayError> {
        ensure!(max_size > 0, RelayError::invalid_state("read size must be positive"));
        let (token, buffer) = self.io()?;

        if self.is_exhausted(&buffer) {
            return self.finish_read();
        }

        self.read_pending = true;
        if !buffer.has_data() {
            self.scheduler.io_block(token).await;
        }
        self.read_pending = false;

        let size = buffer.claim(out, max_size);
        if size > 0 {
            trace!(%token, size, "claimed received data");
            return Ok(ReadStatus::Ready);
        }

        if self.is_exhausted(&buffer) {
            return self.finish_read();
        }

        Ok(ReadStatus::Pending)
    }

    /// Queues `chunk` on the resource's outbound path, then yields once.
    ///
    /// Each call submits the chunk at most once. Nothing is submitted once the
    /// resource is done, or while the outbound bytes in flight fill the send
    /// window; in the latter case the call waits for the network to signal
    /// progress and returns [`WriteStatus::Blocked`].
    ///
    /// # Errors
    ///
    /// [`RelayError::Transfer`] if the submission fails,
    /// [`RelayError::StreamIncomplete`] if the resource already finished with
    /// a negative code.
    pub async fn write(&mut self, chunk: &Bytes) -> Result<WriteStatus, RelayError> {
        let (token, _) = self.io()?;

        if self.resource.state().is_done() {
            let code = self.resource.result_code();
            ensure!(code >= 0, RelayError::stream_incomplete(code));
            warn!(%token, size = chunk.len(), "resource already done, drop outbound chunk");
            return Ok(WriteStatus::Closed);
        }

        let in_flight = self.resource.pending_send_bytes();
        if in_flight >= self.config.send_window() {
            trace!(%token, in_flight, window = self.config.send_window(), "send window full");
            self.scheduler.io_block(token).await;
            return Ok(WriteStatus::Blocked);
        }

        self.resource.add_send_data(chunk.clone()).await.map_err(RelayError::transfer)?;
        tokio::task::yield_now().await;
        Ok(WriteStatus::Submitted)
    }

    /// Finishes the outbound side and waits for the resource to complete.
    ///
    /// The first call announces the end of writes and returns
    /// [`DrainStatus::Retry`]. Later calls wait for completion and keep
    /// returning `Retry` until the resource is done, then report its result
    /// code. The end of writes is announced only once.
    ///
    /// # Errors
    ///
    /// [`RelayError::Transfer`] if the resource finished with a negative code.
    pub async fn drain_writes(&mut self) -> Result<DrainStatus, RelayError> {
        let (token, _) = self.io()?;

        match self.drain_state {
            DrainState::Idle => {
                self.resource.finish_write();
                self.drain_state = DrainState::Finalized;
                debug!(%token, "finished writes");
                Ok(DrainStatus::Retry)
            }
            DrainState::Finalized => {
                if !self.resource.state().is_done() {
                    self.scheduler.io_block(token).await;
                    if !self.resource.state().is_done() {
                        return Ok(DrainStatus::Retry);
                    }
                }

                let code = self.resource.result_code();
                self.drain_state = DrainState::Complete(code);
                debug!(%token, code, "resource drained");
                Self::drain_result(code)
            }
            DrainState::Complete(code) => Self::drain_result(code),
        }
    }

    pub fn resource(&self) -> &Arc<R> {
        &self.resource
    }

    pub fn token(&self) -> Option<IoToken> {
        self.token
    }

    pub fn is_initialized(&self) -> bool {
        self.token.is_some()
    }

    /// True while a read is waiting for the network.
    pub fn is_read_pending(&self) -> bool {
        self.read_pending
    }

    fn io(&self) -> Result<(IoToken, Arc<AsyncDataBuffer>), RelayError> {
        match (self.token, &self.buffer) {
            (Some(token), Some(buffer)) => Ok((token, Arc::clone(buffer))),
            _ => Err(RelayError::invalid_state("driver is not initialized")),
        }
    }

    fn is_exhausted(&self, buffer: &AsyncDataBuffer) -> bool {
        self.resource.state().is_done() && !buffer.has_data()
    }

    fn finish_read(&self) -> Result<ReadStatus, RelayError> {
        let code = self.resource.result_code();
        ensure!(code >= 0, RelayError::stream_incomplete(code));
        Ok(ReadStatus::Ready)
    }

    fn drain_result(code: i32) -> Result<DrainStatus, RelayError> {
        ensure!(code >= 0, RelayError::transfer(code));
        Ok(DrainStatus::Complete(code))
    }
}

impl<R, M> Drop for StreamDriver<R, M> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.scheduler.release(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::loopback::{LoopbackManager, LoopbackResource};
    use futures::FutureExt;
    use std::time::Duration;

    type LoopbackDriver = StreamDriver<LoopbackResource, LoopbackManager>;

    fn new_driver(resource: &Arc<LoopbackResource>, scheduler: &IoScheduler, config: RelayConfig) -> LoopbackDriver {
        StreamDriver::new(Arc::clone(resource), Arc::new(LoopbackManager::new()), scheduler.clone(), config)
    }

    fn started(resource: LoopbackResource, scheduler: &IoScheduler) -> (Arc<LoopbackResource>, LoopbackDriver) {
        let resource = Arc::new(resource);
        let mut driver = new_driver(&resource, scheduler, RelayConfig::default());
        driver.init().unwrap();
        (resource, driver)
    }

    #[test]
    fn init_twice_is_rejected() {
        let scheduler = IoScheduler::new();
        let (_resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);

        assert!(matches!(driver.init(), Err(RelayError::InvalidState { .. })));
    }

    #[test]
    fn io_before_init_is_rejected() {
        let scheduler = IoScheduler::new();
        let resource = Arc::new(LoopbackResource::new(scheduler.clone()));
        let mut driver = new_driver(&resource, &scheduler, RelayConfig::default());
        let mut out = BytesMut::new();

        let read = driver.read(&mut out, 16).now_or_never().unwrap();
        assert!(matches!(read, Err(RelayError::InvalidState { .. })));

        let write = driver.write(&Bytes::from_static(b"x")).now_or_never().unwrap();
        assert!(matches!(write, Err(RelayError::InvalidState { .. })));

        let drain = driver.drain_writes().now_or_never().unwrap();
        assert!(matches!(drain, Err(RelayError::InvalidState { .. })));
    }

    #[test]
    fn submission_failure_keeps_manager_code() {
        let scheduler = IoScheduler::new();
        let resource = Arc::new(LoopbackResource::new(scheduler.clone()));
        let mut driver =
            StreamDriver::new(Arc::clone(&resource), Arc::new(LoopbackManager::failing(-111)), scheduler, RelayConfig::default());

        let error = driver.init().unwrap_err();
        assert_eq!(error, RelayError::submission(-111));
        assert_eq!(error.code(), -111);
    }

    #[test]
    fn read_on_exhausted_resource_returns_without_suspending() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        resource.complete(0);
        let mut out = BytesMut::new();

        let status = driver.read(&mut out, 16).now_or_never().expect("read must not suspend").unwrap();

        assert_eq!(status, ReadStatus::Ready);
        assert!(out.is_empty());
    }

    #[test]
    fn read_drains_buffer_after_done() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        resource.deliver(Bytes::from_static(b"0123456789"));
        resource.complete(0);
        let mut out = BytesMut::new();

        assert_eq!(driver.read(&mut out, 4).now_or_never().unwrap(), Ok(ReadStatus::Ready));
        assert_eq!(&out[..], b"0123");
        assert_eq!(driver.read(&mut out, 100).now_or_never().unwrap(), Ok(ReadStatus::Ready));
        assert_eq!(&out[..], b"0123456789");

        out.clear();
        assert_eq!(driver.read(&mut out, 100).now_or_never().unwrap(), Ok(ReadStatus::Ready));
        assert!(out.is_empty());
    }

    #[test]
    fn read_reports_failed_resource_once_exhausted() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        resource.deliver(Bytes::from_static(b"partial"));
        resource.complete(-104);
        let mut out = BytesMut::new();

        assert_eq!(driver.read(&mut out, 100).now_or_never().unwrap(), Ok(ReadStatus::Ready));
        assert_eq!(&out[..], b"partial");
        assert_eq!(driver.read(&mut out, 100).now_or_never().unwrap(), Err(RelayError::stream_incomplete(-104)));
    }

    #[test]
    fn read_with_zero_size_is_rejected() {
        let scheduler = IoScheduler::new();
        let (_resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        let mut out = BytesMut::new();

        assert!(matches!(driver.read(&mut out, 0).now_or_never().unwrap(), Err(RelayError::InvalidState { .. })));
    }

    #[test]
    fn cancelled_read_loses_nothing() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        let mut out = BytesMut::new();

        assert!(driver.read(&mut out, 16).now_or_never().is_none());
        assert!(driver.is_read_pending());

        resource.deliver(Bytes::from_static(b"late"));
        assert_eq!(driver.read(&mut out, 16).now_or_never().unwrap(), Ok(ReadStatus::Ready));
        assert_eq!(&out[..], b"late");
        assert!(!driver.is_read_pending());
    }

    #[test]
    fn wake_without_data_is_pending() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        let mut out = BytesMut::new();

        // the push leaves a permit behind because nobody was waiting
        resource.deliver(Bytes::from_static(b"abc"));
        assert_eq!(driver.read(&mut out, 16).now_or_never().unwrap(), Ok(ReadStatus::Ready));

        assert_eq!(driver.read(&mut out, 16).now_or_never().unwrap(), Ok(ReadStatus::Pending));
        assert_eq!(&out[..], b"abc");
    }

    #[tokio::test]
    async fn read_waits_for_network() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);

        let network = Arc::clone(&resource);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            network.deliver(Bytes::from_static(b"hello"));
        });

        let mut out = BytesMut::new();
        let status = tokio::time::timeout(Duration::from_secs(5), driver.read(&mut out, 16)).await.unwrap();

        assert_eq!(status, Ok(ReadStatus::Ready));
        assert_eq!(&out[..], b"hello");
    }

    #[tokio::test]
    async fn write_stops_submitting_once_done() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);

        assert_eq!(driver.write(&Bytes::from_static(b"one")).await, Ok(WriteStatus::Submitted));
        resource.complete(0);
        assert_eq!(driver.write(&Bytes::from_static(b"two")).await, Ok(WriteStatus::Closed));

        assert_eq!(resource.send_calls(), 1);
        assert_eq!(&resource.sent()[..], b"one");
    }

    #[tokio::test]
    async fn write_to_failed_resource_is_incomplete() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        resource.complete(-32);

        assert_eq!(driver.write(&Bytes::from_static(b"x")).await, Err(RelayError::stream_incomplete(-32)));
        assert_eq!(resource.send_calls(), 0);
    }

    #[tokio::test]
    async fn write_surfaces_submission_error() {
        let scheduler = IoScheduler::new();
        let (_resource, mut driver) = started(LoopbackResource::new(scheduler.clone()).fail_sends_with(-5), &scheduler);

        assert_eq!(driver.write(&Bytes::from_static(b"x")).await, Err(RelayError::transfer(-5)));
    }

    #[tokio::test]
    async fn write_blocks_on_full_send_window() {
        let scheduler = IoScheduler::new();
        let resource = Arc::new(LoopbackResource::new(scheduler.clone()).hold_outbound());
        let mut driver = new_driver(&resource, &scheduler, RelayConfig::default().with_send_window(4));
        driver.init().unwrap();
        let chunk = Bytes::from_static(b"abcd");

        assert_eq!(driver.write(&chunk).await, Ok(WriteStatus::Submitted));

        let network = Arc::clone(&resource);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            network.acknowledge(4);
        });

        let status = tokio::time::timeout(Duration::from_secs(5), driver.write(&chunk)).await.unwrap();
        assert_eq!(status, Ok(WriteStatus::Blocked));
        assert_eq!(resource.send_calls(), 1);

        assert_eq!(driver.write(&chunk).await, Ok(WriteStatus::Submitted));
        assert_eq!(&resource.sent()[..], b"abcdabcd");
    }

    #[tokio::test]
    async fn drain_finishes_writes_once_and_reports_code() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);

        assert_eq!(driver.drain_writes().await, Ok(DrainStatus::Retry));
        assert!(resource.is_write_finished());

        let network = Arc::clone(&resource);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            network.complete(0);
        });

        let mut statuses = Vec::new();
        loop {
            let status = tokio::time::timeout(Duration::from_secs(5), driver.drain_writes()).await.unwrap().unwrap();
            statuses.push(status);
            if !status.need_retry() {
                break;
            }
            assert!(!resource.state().is_done());
        }

        assert_eq!(statuses.last(), Some(&DrainStatus::Complete(0)));
        assert_eq!(statuses.iter().filter(|status| !status.need_retry()).count(), 1);
        // the terminal result is sticky
        assert_eq!(driver.drain_writes().await, Ok(DrainStatus::Complete(0)));
    }

    #[tokio::test]
    async fn drain_reports_negative_code() {
        let scheduler = IoScheduler::new();
        let (resource, mut driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        resource.complete(-5);

        assert_eq!(driver.drain_writes().await, Ok(DrainStatus::Retry));
        assert_eq!(driver.drain_writes().await, Err(RelayError::transfer(-5)));
        assert_eq!(driver.drain_writes().await, Err(RelayError::transfer(-5)));
    }

    #[test]
    fn drop_releases_token_and_buffer() {
        let scheduler = IoScheduler::new();
        let (resource, driver) = started(LoopbackResource::new(scheduler.clone()), &scheduler);
        assert_eq!(scheduler.registered(), 1);

        drop(driver);

        assert_eq!(scheduler.registered(), 0);
        // bytes arriving after teardown go nowhere
        resource.deliver(Bytes::from_static(b"late"));
    }
}
