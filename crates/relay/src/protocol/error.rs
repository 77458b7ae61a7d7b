use thiserror::Error;

/// Code reported for local misuse and malformed metadata, mirroring `-EINVAL`.
pub const EINVAL: i32 = -22;

/// Every failure a driver or orchestrator can surface.
///
/// Each variant maps to a single numeric code through [`RelayError::code`],
/// which is the only diagnostic an orchestrator keeps once it has failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("failed to submit resource to http manager, code: {code}")]
    Submission { code: i32 },

    #[error("transfer failed, code: {code}")]
    Transfer { code: i32 },

    #[error("stream finished incomplete, code: {code}")]
    StreamIncomplete { code: i32 },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid driver state: {reason}")]
    InvalidState { reason: &'static str },
}

impl RelayError {
    pub fn submission(code: i32) -> Self {
        Self::Submission { code }
    }

    pub fn transfer(code: i32) -> Self {
        Self::Transfer { code }
    }

    pub fn stream_incomplete(code: i32) -> Self {
        Self::StreamIncomplete { code }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_state(reason: &'static str) -> Self {
        Self::InvalidState { reason }
    }

    /// The numeric code carried by this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Submission { code } | Self::Transfer { code } | Self::StreamIncomplete { code } => *code,
            Self::InvalidHeader { .. } | Self::InvalidState { .. } => EINVAL,
        }
    }
}
