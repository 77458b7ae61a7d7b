//! Core vocabulary shared by the buffer, the drivers and the orchestrators.
//!
//! - **State** ([`state`]): [`IoToken`] and [`ResourceState`]
//! - **Headers** ([`header`]): ordered header lists and the length header
//!   translation applied during splice
//! - **Errors** ([`error`]): [`RelayError`], a single error type whose
//!   [`code`](RelayError::code) is the numeric diagnostic surfaced to callers

mod error;
pub use error::EINVAL;
pub use error::RelayError;

mod state;
pub use state::IoToken;
pub use state::ResourceState;

pub mod header;
pub use header::HeaderList;
