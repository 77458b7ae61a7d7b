use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::protocol::IoToken;
use crate::resource::Resource;

/// Hands out [`IoToken`]s and routes completion signals to the task blocked on them.
///
/// A completion that arrives while nobody waits is kept as a single permit, so
/// the next [`io_block`](IoScheduler::io_block) on that token returns at once.
/// Repeated completions before a wait collapse into that one permit.
///
/// The scheduler is cheap to clone; clones share the same token table.
#[derive(Debug, Clone, Default)]
pub struct IoScheduler {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    slots: Mutex<HashMap<IoToken, Arc<Notify>>>,
}

impl IoScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token and stores it on the resource.
    pub fn init_new_io<R: Resource>(&self, resource: &R) -> IoToken {
        let token = IoToken::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.slots().insert(token, Arc::new(Notify::new()));
        resource.set_io_token(token);
        trace!(%token, "registered io token");
        token
    }

    /// Signals that the operation identified by `token` can make progress.
    ///
    /// Safe to call from any thread. Signals for released tokens are dropped.
    pub fn io_complete(&self, token: IoToken) {
        let notify = self.slots().get(&token).cloned();
        match notify {
            Some(notify) => notify.notify_one(),
            None => trace!(%token, "completion for released io token"),
        }
    }

    /// Suspends the calling task until `token` is signaled.
    pub async fn io_block(&self, token: IoToken) {
        let notify = self.slots().get(&token).cloned();
        let Some(notify) = notify else {
            warn!(%token, "block on unknown io token, resume immediately");
            return;
        };

        trace!(%token, "io block");
        notify.notified().await;
        trace!(%token, "io resumed");
    }

    /// Forgets `token`; later completions for it are ignored.
    pub fn release(&self, token: IoToken) {
        if self.slots().remove(&token).is_some() {
            trace!(%token, "released io token");
        }
    }

    /// Number of tokens currently registered.
    pub fn registered(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<IoToken, Arc<Notify>>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
