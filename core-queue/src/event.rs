//! Queued event model and its delivery state machine.
//!
//! `Pending -> (send attempt) -> Delivered (removed) | Pending (retry) |
//! DeadLettered (terminal)`. The invariant `attempt_count <= max_retries + 1`
//! holds throughout: the final permitted attempt either delivers the event or
//! dead-letters it.

use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-safe queued event identifier.
///
/// Generated locally; the remote side uses it for idempotent de-duplication,
/// so a redelivered event is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Create a new random event ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an event ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| QueueError::InvalidEventId(e.to_string()))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted delivery state.
///
/// Delivered events are removed from the log rather than stored in a
/// terminal state; dead letters are the only retained terminal rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventState {
    /// Waiting for a delivery attempt
    Pending,
    /// Retry budget exhausted; excluded from future drains
    DeadLettered,
}

impl EventState {
    /// Convert state to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DeadLettered => "dead_lettered",
        }
    }
}

impl std::str::FromStr for EventState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "dead_lettered" => Ok(Self::DeadLettered),
            _ => Err(QueueError::InvalidState(s.to_string())),
        }
    }
}

/// Caller-supplied event payload, immutable once enqueued.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One durably queued event awaiting delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEvent {
    /// Unique identifier, used for remote de-duplication
    pub id: EventId,
    /// Event name from the agreed vocabulary
    pub name: String,
    /// Payload attached at enqueue time
    pub properties: Properties,
    /// Unix timestamp of the enqueue
    pub enqueued_at: i64,
    /// Delivery attempts made so far
    pub attempt_count: u32,
    /// Retry ceiling supplied by the caller at enqueue time
    pub max_retries: u32,
    /// Current state
    pub state: EventState,
}

impl QueuedEvent {
    /// Create a pending event stamped with the given enqueue time.
    pub fn new(name: String, properties: Properties, max_retries: u32, enqueued_at: i64) -> Self {
        Self {
            id: EventId::new(),
            name,
            properties,
            enqueued_at,
            attempt_count: 0,
            max_retries,
            state: EventState::Pending,
        }
    }

    /// Whether another delivery attempt is permitted.
    pub fn can_retry(&self) -> bool {
        self.attempt_count <= self.max_retries
    }

    /// Record a failed delivery attempt.
    ///
    /// Increments the attempt count; once it exceeds `max_retries` the event
    /// moves to the dead-letter state. Returns the resulting state.
    pub fn record_failure(&mut self) -> EventState {
        self.attempt_count += 1;
        if self.attempt_count > self.max_retries {
            self.state = EventState::DeadLettered;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_round_trip() {
        let id = EventId::new();
        let parsed = EventId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_event_id_rejects_garbage() {
        assert!(EventId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(EventState::Pending.as_str(), "pending");
        assert_eq!(
            "dead_lettered".parse::<EventState>().unwrap(),
            EventState::DeadLettered
        );
        assert!("delivered".parse::<EventState>().is_err());
    }

    #[test]
    fn test_new_event_is_pending() {
        let event = QueuedEvent::new("login".to_string(), Properties::new(), 2, 1_000);
        assert_eq!(event.state, EventState::Pending);
        assert_eq!(event.attempt_count, 0);
        assert!(event.can_retry());
    }

    #[test]
    fn test_failure_transitions() {
        let mut event = QueuedEvent::new("login".to_string(), Properties::new(), 2, 1_000);

        // Pending(0) -> Pending(1) -> Pending(2) -> DeadLettered(3)
        assert_eq!(event.record_failure(), EventState::Pending);
        assert_eq!(event.record_failure(), EventState::Pending);
        assert_eq!(event.record_failure(), EventState::DeadLettered);

        assert_eq!(event.attempt_count, event.max_retries + 1);
        assert!(!event.can_retry());
    }

    #[test]
    fn test_zero_retries_dead_letters_after_one_attempt() {
        let mut event = QueuedEvent::new("login".to_string(), Properties::new(), 0, 1_000);
        assert_eq!(event.record_failure(), EventState::DeadLettered);
        assert_eq!(event.attempt_count, 1);
    }
}
