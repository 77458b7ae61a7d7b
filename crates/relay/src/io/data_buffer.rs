use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::io::IoScheduler;
use crate::protocol::IoToken;

/// Byte accumulator between the network layer and the task reading a resource.
///
/// The network layer [`push`](AsyncDataBuffer::push)es bytes from whatever thread
/// it runs on; the owning driver [`claim`](AsyncDataBuffer::claim)s them. Every
/// access goes through one mutex, and a push signals the buffer's io token only
/// after the bytes are visible, so a woken reader always finds them.
#[derive(Debug)]
pub struct AsyncDataBuffer {
    inner: Mutex<Inner>,
    scheduler: IoScheduler,
    token: IoToken,
}

#[derive(Debug, Default)]
struct Inner {
    data: BytesMut,
    pushed: u64,
    claimed: u64,
}

impl AsyncDataBuffer {
    pub fn new(scheduler: IoScheduler, token: IoToken) -> Self {
        Self { inner: Mutex::new(Inner::default()), scheduler, token }
    }

    /// Moves the first `len` bytes of `chunk` into the buffer, then signals the io token.
    ///
    /// When `len` covers the whole chunk it is taken entirely; otherwise the
    /// remainder stays in `chunk`. Returns the number of bytes taken, which
    /// callers are free to ignore.
    pub fn push(&self, chunk: &mut Bytes, len: usize) -> usize {
        let part = if len >= chunk.len() { std::mem::take(chunk) } else { chunk.split_to(len) };
        let size = part.len();

        {
            let mut inner = self.lock();
            inner.data.extend_from_slice(&part);
            inner.pushed += size as u64;
        }

        trace!(token = %self.token, size, "pushed data");
        self.scheduler.io_complete(self.token);
        size
    }

    /// Moves up to `max` buffered bytes to the end of `dest`.
    ///
    /// Returns the number of bytes moved; zero when the buffer is empty.
    pub fn claim(&self, dest: &mut BytesMut, max: usize) -> usize {
        let mut inner = self.lock();
        if inner.data.is_empty() {
            return 0;
        }

        let size = inner.data.len().min(max);
        let part = inner.data.split_to(size);
        inner.claimed += size as u64;
        drop(inner);

        dest.unsplit(part);
        size
    }

    pub fn has_data(&self) -> bool {
        !self.lock().data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    /// Total bytes pushed over the buffer's lifetime.
    pub fn pushed_total(&self) -> u64 {
        self.lock().pushed
    }

    /// Total bytes claimed over the buffer's lifetime.
    pub fn claimed_total(&self) -> u64 {
        self.lock().claimed
    }

    pub fn token(&self) -> IoToken {
        self.token
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::loopback::LoopbackResource;
    use futures::FutureExt;
    use std::sync::Arc;

    fn new_buffer() -> (IoScheduler, AsyncDataBuffer) {
        let scheduler = IoScheduler::new();
        let token = scheduler.init_new_io(&LoopbackResource::new(scheduler.clone()));
        let buffer = AsyncDataBuffer::new(scheduler.clone(), token);
        (scheduler, buffer)
    }

    #[test]
    fn claim_on_empty_buffer_is_noop() {
        let (_scheduler, buffer) = new_buffer();
        let mut dest = BytesMut::new();

        assert_eq!(buffer.claim(&mut dest, 16), 0);
        assert!(dest.is_empty());
        assert!(!buffer.has_data());
    }

    #[test]
    fn claim_respects_max_and_keeps_order() {
        let (_scheduler, buffer) = new_buffer();
        buffer.push(&mut Bytes::from_static(b"hello "), usize::MAX);
        buffer.push(&mut Bytes::from_static(b"world"), usize::MAX);

        let mut dest = BytesMut::new();
        assert_eq!(buffer.claim(&mut dest, 4), 4);
        assert_eq!(&dest[..], b"hell");
        assert_eq!(buffer.len(), 7);

        assert_eq!(buffer.claim(&mut dest, 100), 7);
        assert_eq!(&dest[..], b"hello world");
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_push_leaves_remainder_with_caller() {
        let (_scheduler, buffer) = new_buffer();
        let mut chunk = Bytes::from_static(b"abcdef");

        assert_eq!(buffer.push(&mut chunk, 4), 4);

        assert_eq!(&chunk[..], b"ef");
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn push_signals_token() {
        let (scheduler, buffer) = new_buffer();

        assert!(scheduler.io_block(buffer.token()).now_or_never().is_none());
        buffer.push(&mut Bytes::from_static(b"x"), 1);
        assert!(scheduler.io_block(buffer.token()).now_or_never().is_some());
    }

    #[test]
    fn bytes_are_conserved_across_threads() {
        let (_scheduler, buffer) = new_buffer();
        let buffer = Arc::new(buffer);

        let producers = (0..4u8)
            .map(|n| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        buffer.push(&mut Bytes::from(vec![n; 7]), usize::MAX);
                    }
                })
            })
            .collect::<Vec<_>>();

        let mut dest = BytesMut::new();
        while producers.iter().any(|producer| !producer.is_finished()) {
            buffer.claim(&mut dest, 5);
        }
        for producer in producers {
            producer.join().unwrap();
        }
        while buffer.has_data() {
            buffer.claim(&mut dest, 5);
        }

        assert_eq!(dest.len(), 4 * 1000 * 7);
        assert_eq!(buffer.pushed_total(), buffer.claimed_total());
        for n in 0..4u8 {
            assert_eq!(dest.iter().filter(|&&b| b == n).count(), 7000);
        }
    }
}
