use bridge_types::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Cache entry for key {key} expired {expired_for_seconds}s ago")]
    Expired {
        key: String,
        expired_for_seconds: i64,
    },

    #[error("Schema version mismatch for key {key}: stored {stored}, expected {expected}")]
    VersionMismatch {
        key: String,
        stored: i32,
        expected: i32,
    },

    #[error("Storage error: {0}")]
    Storage(sqlx::Error),

    #[error("Retrieval error: {0}")]
    Retrieval(sqlx::Error),

    #[error("Clear failed: {0}")]
    Clear(sqlx::Error),
}

impl Classify for CacheError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Expired { .. } => ErrorKind::Expired,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::Storage(_) => ErrorKind::StorageFailed,
            Self::Retrieval(_) => ErrorKind::RetrievalFailed,
            Self::Clear(_) => ErrorKind::ClearFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
