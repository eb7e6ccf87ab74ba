//! Stable error taxonomy shared by the cache store and the event queue.
//!
//! Callers branch on [`ErrorKind`], never on backend-specific error values.
//! The numeric codes are part of the host contract and must not be renumbered.

use serde::{Deserialize, Serialize};

/// Classification of every failure the durable core can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed key/value/parameter. Caller's fault, never retried.
    InvalidInput,
    /// Underlying persistence I/O failed. Caller may retry the operation.
    StorageFailed,
    /// Read path failed, distinct from "not found".
    RetrievalFailed,
    /// Entry existed but its TTL elapsed. Treated as a miss by convention.
    Expired,
    /// Entry's schema version differs from the reader's expectation.
    VersionMismatch,
    /// Bulk clear could not complete atomically.
    ClearFailed,
    /// Remote send failed during a queue drain. Retried with backoff.
    NetworkFailure,
    /// Permanent delivery failure after exhausting the retry budget.
    DeadLettered,
}

impl ErrorKind {
    /// Stable numeric code surfaced across the bridge.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidInput => 1000,
            Self::StorageFailed => 1001,
            Self::RetrievalFailed => 1002,
            Self::Expired => 1003,
            Self::VersionMismatch => 1004,
            Self::ClearFailed => 1005,
            Self::NetworkFailure => 1006,
            Self::DeadLettered => 1007,
        }
    }

    /// Machine-readable identifier for logs and host dispatch.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::StorageFailed => "storage_failed",
            Self::RetrievalFailed => "retrieval_failed",
            Self::Expired => "expired",
            Self::VersionMismatch => "version_mismatch",
            Self::ClearFailed => "clear_failed",
            Self::NetworkFailure => "network_failure",
            Self::DeadLettered => "dead_lettered",
        }
    }

    /// Whether the same operation may succeed if the caller retries it.
    ///
    /// `Expired` and `VersionMismatch` are not retryable as-is: the caller is
    /// expected to regenerate and overwrite instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageFailed | Self::RetrievalFailed | Self::ClearFailed | Self::NetworkFailure
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Implemented by every error type the durable core exposes, so both stores
/// classify failures into the one taxonomy.
pub trait Classify {
    /// Map this failure to its stable kind.
    fn kind(&self) -> ErrorKind;
}
