//! Error taxonomy for the service seams.
//!
//! The storage layer reports failures through `anyhow` and they surface
//! here as `Store`; everything else is classified so callers can map an
//! error to a response without string matching.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("authentication required")]
    Unauthorized,

    #[error("insufficient role: {0}")]
    Forbidden(String),

    #[error("remote tracker unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same call without changes could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }

    /// Whether the error was detected before any write was attempted.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Forbidden(_) | Self::NotFound(_) | Self::Validation(_)
        )
    }

    /// Stable machine-readable code for CLI and API output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::RemoteUnavailable(_) => "REMOTE_UNAVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::Upload(_) => "UPLOAD",
            Self::Store(_) => "STORE",
        }
    }
}
