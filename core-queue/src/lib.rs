//! # Offline Event Queue
//!
//! Durable append-only queue for analytics and media events that could not be
//! delivered immediately, drained with bounded retry when connectivity
//! returns.
//!
//! ## Overview
//!
//! - **Durable append** (`enqueue`): never blocks on the network
//! - **Ordered drain** (`drain`): one delivery attempt per pending event, in
//!   enqueue order, against a snapshot taken at the start of the pass
//! - **Bounded retry** (`sync`): repeated passes with configurable
//!   exponential backoff; events that exhaust their retry budget move to a
//!   dead-letter state instead of retrying forever
//!
//! ## Usage
//!
//! ```ignore
//! use core_queue::{OfflineEventQueue, QueueConfig, EventSender};
//!
//! # async fn example(sender: &dyn EventSender) -> core_queue::Result<()> {
//! let queue = OfflineEventQueue::open(QueueConfig::new("events.db")).await?;
//!
//! let id = queue.enqueue("login", serde_json::Map::new(), 2).await?;
//! let report = queue.sync(sender).await?;
//! assert!(report.delivered.contains(&id));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod queue;

pub use error::{QueueError, Result};
pub use event::{EventId, EventState, Properties, QueuedEvent};
pub use queue::{
    BackoffPolicy, EventLogRepository, EventSender, OfflineEventQueue, QueueConfig, QueueStats,
    SqliteEventLogRepository, SyncReport,
};
