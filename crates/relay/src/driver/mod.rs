//! Resumable drivers over a single live resource.
//!
//! A [`StreamDriver`] wraps one [`Resource`](crate::resource::Resource) and
//! exposes three re-enterable operations: `read`, `write` and `drain_writes`.
//! Each reports through a small status enum whether the caller should call
//! again ([`ReadStatus`], [`WriteStatus`], [`DrainStatus`]).

mod stream_driver;

pub use stream_driver::DrainStatus;
pub use stream_driver::ReadStatus;
pub use stream_driver::StreamDriver;
pub use stream_driver::WriteStatus;
