use bridge_types::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid event ID: {0}")]
    InvalidEventId(String),

    #[error("Invalid event state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(sqlx::Error),

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network send failed: {0}")]
    Network(String),

    #[error("Send timed out after {0} seconds")]
    SendTimeout(u64),

    #[error("Event {event_id} dead-lettered after {attempts} attempts")]
    DeadLettered { event_id: String, attempts: u32 },
}

impl Classify for QueueError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } | Self::InvalidEventId(_) => ErrorKind::InvalidInput,
            // A state string we cannot parse means the log itself is damaged.
            Self::InvalidState(_) | Self::Storage(_) | Self::Serialization(_) => {
                ErrorKind::StorageFailed
            }
            Self::Network(_) | Self::SendTimeout(_) => ErrorKind::NetworkFailure,
            Self::DeadLettered { .. } => ErrorKind::DeadLettered,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
