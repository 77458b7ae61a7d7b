//! Cross-context plumbing between the network layer and the driving task.
//!
//! - [`IoScheduler`]: io token registry with suspend/resume primitives
//! - [`AsyncDataBuffer`]: the mutex-guarded byte handoff filled by the
//!   network layer and drained by a driver

mod data_buffer;
mod scheduler;

pub use data_buffer::AsyncDataBuffer;
pub use scheduler::IoScheduler;
