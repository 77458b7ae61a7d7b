//! In-process [`Resource`] and [`HttpManager`] whose network side is driven by hand.
//!
//! The "network" is whoever holds the [`LoopbackResource`]: it delivers
//! inbound bytes with [`deliver`](LoopbackResource::deliver), finishes the
//! exchange with [`complete`](LoopbackResource::complete) and flushes held
//! outbound bytes with [`acknowledge`](LoopbackResource::acknowledge). Every
//! outbound byte and header a driver submits is recorded for inspection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::io::{AsyncDataBuffer, IoScheduler};
use crate::protocol::{HeaderList, IoToken, ResourceState};
use crate::resource::{HttpManager, Resource};

#[derive(Debug)]
pub struct LoopbackResource {
    scheduler: IoScheduler,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: ResourceState,
    result_code: i32,
    token: Option<IoToken>,
    sink: Option<Weak<AsyncDataBuffer>>,
    // inbound bytes delivered before a sink was attached
    backlog: Vec<Bytes>,
    response_headers: HeaderList,
    request_headers: HeaderList,
    send_length: Option<u64>,
    sent: BytesMut,
    send_calls: usize,
    in_flight: usize,
    write_finished: bool,
    hold_outbound: bool,
    complete_on_finish: bool,
    send_error: Option<i32>,
}

impl LoopbackResource {
    pub fn new(scheduler: IoScheduler) -> Self {
        Self { scheduler, inner: Mutex::new(Inner::default()) }
    }

    /// Sets the headers reported by [`Resource::response_headers`].
    pub fn with_response_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.lock().response_headers = headers.into_iter().map(|(name, value)| (name.into(), value.into())).collect();
        self
    }

    /// Completes the resource with code 0 as soon as writes are finished, like an upload sink.
    pub fn complete_on_finish_write(self) -> Self {
        self.lock().complete_on_finish = true;
        self
    }

    /// Keeps submitted bytes in flight until they are acknowledged.
    pub fn hold_outbound(self) -> Self {
        self.lock().hold_outbound = true;
        self
    }

    /// Makes every outbound submission fail with `code`.
    pub fn fail_sends_with(self, code: i32) -> Self {
        self.lock().send_error = Some(code);
        self
    }

    /// Marks the resource as picked up by a manager.
    pub fn activate(&self) {
        let mut inner = self.lock();
        if inner.state == ResourceState::Pending {
            inner.state = ResourceState::Active;
        }
    }

    /// Delivers inbound bytes as the network layer would.
    pub fn deliver(&self, mut data: Bytes) {
        let sink = {
            let mut inner = self.lock();
            let Some(sink) = inner.sink.as_ref().map(Weak::upgrade) else {
                inner.backlog.push(data);
                return;
            };
            sink
        };

        match sink {
            Some(sink) => {
                let len = data.len();
                sink.push(&mut data, len);
            }
            None => trace!(size = data.len(), "data sink is gone, discard delivered bytes"),
        }
    }

    /// Finishes the exchange with `code` and wakes whoever waits on it.
    pub fn complete(&self, code: i32) {
        let token = {
            let mut inner = self.lock();
            if inner.state.is_done() {
                warn!(code, "resource completed twice, keep the first result");
                return;
            }
            inner.state = ResourceState::Done;
            inner.result_code = code;
            inner.token
        };

        if let Some(token) = token {
            self.scheduler.io_complete(token);
        }
    }

    /// Flushes `size` held outbound bytes and wakes a writer waiting for window.
    pub fn acknowledge(&self, size: usize) {
        let token = {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(size);
            inner.token
        };

        if let Some(token) = token {
            self.scheduler.io_complete(token);
        }
    }

    /// All outbound bytes submitted so far.
    pub fn sent(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock().sent)
    }

    /// Number of outbound submissions.
    pub fn send_calls(&self) -> usize {
        self.lock().send_calls
    }

    /// Headers appended through [`Resource::append_header`], in order.
    pub fn request_headers(&self) -> HeaderList {
        self.lock().request_headers.clone()
    }

    pub fn send_length(&self) -> Option<u64> {
        self.lock().send_length
    }

    pub fn is_write_finished(&self) -> bool {
        self.lock().write_finished
    }

    fn record_send(&self, data: &Bytes) -> Result<(), i32> {
        let mut inner = self.lock();
        if let Some(code) = inner.send_error {
            return Err(code);
        }

        inner.sent.extend_from_slice(data);
        inner.send_calls += 1;
        if inner.hold_outbound {
            inner.in_flight += data.len();
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Resource for LoopbackResource {
    fn state(&self) -> ResourceState {
        self.lock().state
    }

    fn io_token(&self) -> Option<IoToken> {
        self.lock().token
    }

    fn set_io_token(&self, token: IoToken) {
        self.lock().token = Some(token);
    }

    fn set_data_sink(&self, sink: Weak<AsyncDataBuffer>) {
        let backlog = {
            let mut inner = self.lock();
            inner.sink = Some(Weak::clone(&sink));
            std::mem::take(&mut inner.backlog)
        };

        if let Some(buffer) = sink.upgrade() {
            for mut data in backlog {
                let len = data.len();
                buffer.push(&mut data, len);
            }
        }
    }

    async fn add_send_data(&self, data: Bytes) -> Result<(), i32> {
        self.record_send(&data)
    }

    fn pending_send_bytes(&self) -> usize {
        self.lock().in_flight
    }

    fn finish_write(&self) {
        let complete = {
            let mut inner = self.lock();
            inner.write_finished = true;
            inner.complete_on_finish && !inner.state.is_done()
        };

        if complete {
            self.complete(0);
        }
    }

    fn result_code(&self) -> i32 {
        self.lock().result_code
    }

    fn response_headers(&self) -> HeaderList {
        self.lock().response_headers.clone()
    }

    fn set_send_length(&self, length: u64) {
        self.lock().send_length = Some(length);
    }

    fn append_header(&self, name: &str, value: &str) {
        self.lock().request_headers.push((name.to_owned(), value.to_owned()));
    }
}

/// Accepts loopback resources, or refuses all of them with a fixed code.
#[derive(Debug, Default)]
pub struct LoopbackManager {
    submitted: AtomicUsize,
    failure: Option<i32>,
}

impl LoopbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(code: i32) -> Self {
        Self { submitted: AtomicUsize::new(0), failure: Some(code) }
    }

    /// Number of resources accepted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Acquire)
    }
}

impl HttpManager<LoopbackResource> for LoopbackManager {
    fn add_request(&self, resource: Arc<LoopbackResource>) -> Result<(), i32> {
        if let Some(code) = self.failure {
            return Err(code);
        }

        resource.activate();
        self.submitted.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
