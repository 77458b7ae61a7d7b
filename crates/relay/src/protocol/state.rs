use std::fmt;

/// Identifies one suspended operation and the completion event that resumes it.
///
/// Tokens are handed out by [`IoScheduler::init_new_io`](crate::io::IoScheduler::init_new_io)
/// and are never reused during the scheduler's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoToken(u64);

impl IoToken {
    #[inline]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io#{}", self.0)
    }
}

/// Lifecycle of a resource as seen by its driver.
///
/// The terminal result code is only meaningful once the state is `Done`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ResourceState {
    /// Created but not yet picked up by the http manager
    #[default]
    Pending,
    /// Submitted and moving bytes
    Active,
    /// Finished, successfully or not
    Done,
}

impl ResourceState {
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, ResourceState::Done)
    }

    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ResourceState::Active)
    }
}
