//! Unified status surface for sync operations.
//!
//! The protocol deliberately keeps a thin taxonomy: four failure kinds and
//! two success kinds for transfers. Anything the client does not recognize
//! collapses into [`SyncError::Cancelled`].

use thiserror::Error;

/// Unified error type for sync operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The per-call deadline expired on either side.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The requested file is absent on the server.
    #[error("file not found on server")]
    NotFound,

    /// The write lock is held by another client.
    #[error("write lock held by another client")]
    LockBusy,

    /// Any other failure: I/O error, stream abort, unrecognized status.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl SyncError {
    /// Create a cancelled error from any displayable cause.
    pub fn cancelled(cause: impl std::fmt::Display) -> Self {
        Self::Cancelled(cause.to_string())
    }

    /// Translate an HTTP status code per the protocol's mapping.
    ///
    /// 408 → DeadlineExceeded, 404 → NotFound, 429 → LockBusy; every other
    /// non-success code normalizes to Cancelled.
    pub fn from_http(code: u16) -> Self {
        match code {
            408 => Self::DeadlineExceeded,
            404 => Self::NotFound,
            429 => Self::LockBusy,
            other => Self::Cancelled(format!("unexpected status code {other}")),
        }
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Successful outcome of a store or fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Bytes were streamed and the destination now matches the source.
    Completed,
    /// Both sides already held identical content; only mtimes were aligned.
    AlreadyInSync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_terse() {
        assert_eq!(SyncError::DeadlineExceeded.to_string(), "deadline exceeded");
        assert_eq!(
            SyncError::cancelled("stream aborted").to_string(),
            "cancelled: stream aborted"
        );
    }

    #[test]
    fn http_codes_translate_per_taxonomy() {
        assert_eq!(SyncError::from_http(408), SyncError::DeadlineExceeded);
        assert_eq!(SyncError::from_http(404), SyncError::NotFound);
        assert_eq!(SyncError::from_http(429), SyncError::LockBusy);
        assert!(matches!(SyncError::from_http(500), SyncError::Cancelled(_)));
        assert!(matches!(SyncError::from_http(403), SyncError::Cancelled(_)));
    }
}
