//! # Offline Event Queue
//!
//! Durable append log plus the drain/sync machinery that reconciles it with
//! the remote ingestion endpoint.
//!
//! ## Drain discipline
//!
//! A drain pass snapshots the pending set at entry and works only on that
//! snapshot, in enqueue order. Events enqueued while a pass is in flight are
//! picked up by the next pass, keeping the in-flight view of "pending"
//! stable. Passes are serialized by a drain lock; `enqueue` never waits for
//! a drain.
//!
//! Each send is bounded by a timeout so a hung remote degrades to an
//! ordinary failed attempt with normal retry accounting.

use crate::error::{QueueError, Result};
use crate::event::{EventId, EventState, Properties, QueuedEvent};
use async_trait::async_trait;
use bridge_types::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Growth curve for the wait between drain passes.
///
/// Exponential with a cap, so a failing endpoint is not hammered. A policy
/// parameter, not a constant: deployments tune it per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the second pass
    pub initial: Duration,
    /// Multiplier applied per subsequent pass
    pub factor: u32,
    /// Ceiling on the delay
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay to wait after the given zero-based failed pass.
    pub fn delay(&self, pass: u32) -> Duration {
        let multiplier = self.factor.checked_pow(pass).unwrap_or(u32::MAX);
        self.initial.saturating_mul(multiplier).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 2,
            max: Duration::from_secs(10),
        }
    }
}

/// Configuration for an offline event queue instance.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Database file path or `:memory:` for an in-memory log
    pub database_url: String,

    /// Maximum time to wait for the connection when opening the queue
    pub acquire_timeout: Duration,

    /// Ceiling on a single remote send before it counts as a failed attempt
    pub send_timeout: Duration,

    /// Wait curve between drain passes
    pub backoff: BackoffPolicy,
}

impl QueueConfig {
    /// Create a configuration for the given database file path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            acquire_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(15),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Create a configuration for an in-memory log (useful for testing).
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            acquire_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(15),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Set the per-send timeout.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the backoff curve between drain passes.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Remote delivery seam implemented by the host (analytics ingestion, media
/// backend). Failures are classified as network failures and retried up to
/// each event's budget.
#[async_trait]
pub trait EventSender: Send + Sync {
    /// Deliver one event. The event ID doubles as the remote idempotency
    /// token, so redelivery after an ambiguous failure is safe.
    async fn send(&self, event: &QueuedEvent) -> Result<()>;
}

/// Outcome of a drain pass or a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Events acknowledged by the remote and removed from the log
    pub delivered: Vec<EventId>,
    /// Events that exhausted their retry budget during this report's scope
    pub dead_lettered: Vec<EventId>,
    /// Events still pending after this report's scope
    pub still_pending: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: SyncReport) {
        self.delivered.extend(other.delivered);
        self.dead_lettered.extend(other.dead_lettered);
        self.still_pending = other.still_pending;
    }
}

/// Aggregate statistics over the event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Events awaiting delivery
    pub pending: u64,
    /// Events parked in the dead-letter state
    pub dead_lettered: u64,
}

/// Repository trait for persisting the event log.
#[async_trait]
pub trait EventLogRepository: Send + Sync {
    /// Append a new event to the log.
    async fn append(&self, event: &QueuedEvent) -> Result<()>;

    /// All pending events in enqueue order.
    async fn pending_snapshot(&self) -> Result<Vec<QueuedEvent>>;

    /// Persist updated attempt accounting and state for an event.
    async fn update_attempts(&self, event: &QueuedEvent) -> Result<()>;

    /// Remove a delivered event from the log.
    async fn delete(&self, id: EventId) -> Result<()>;

    /// Count events in the given state.
    async fn count_state(&self, state: EventState) -> Result<u64>;

    /// All dead-lettered events, oldest first.
    async fn dead_letters(&self) -> Result<Vec<QueuedEvent>>;

    /// Delete all dead-lettered events, returning how many were removed.
    async fn purge_dead_letters(&self) -> Result<u64>;
}

/// SQLite implementation of the event log.
pub struct SqliteEventLogRepository {
    pool: SqlitePool,
}

impl SqliteEventLogRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the backing database for a queue and create the log schema.
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        info!(database_url = %config.database_url, "Opening event log database");

        let connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(QueueError::Storage)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        // Single connection: the log is exclusively owned by this queue, and
        // in-memory databases would otherwise split across connections.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to open event log database");
                QueueError::Storage(e)
            })?;

        let repository = Self::new(pool);
        repository.initialize().await?;
        Ok(repository)
    }

    /// Create the log table if it does not exist.
    ///
    /// The autoincrement sequence is the enqueue-order authority: drains
    /// iterate by `seq`, never by timestamp, so same-second enqueues keep
    /// their order.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                properties TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL,
                state TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(QueueError::Storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_log_state_seq ON event_log(state, seq ASC)",
        )
        .execute(&self.pool)
        .await
        .map_err(QueueError::Storage)?;

        Ok(())
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<QueuedEvent> {
        let properties: Properties = serde_json::from_str(&row.get::<String, _>("properties"))?;

        Ok(QueuedEvent {
            id: EventId::from_string(&row.get::<String, _>("event_id"))?,
            name: row.get("name"),
            properties,
            enqueued_at: row.get("enqueued_at"),
            attempt_count: row.get::<i64, _>("attempt_count") as u32,
            max_retries: row.get::<i64, _>("max_retries") as u32,
            state: row.get::<String, _>("state").parse()?,
        })
    }
}

#[async_trait]
impl EventLogRepository for SqliteEventLogRepository {
    async fn append(&self, event: &QueuedEvent) -> Result<()> {
        let properties = serde_json::to_string(&event.properties)?;

        sqlx::query(
            r#"
            INSERT INTO event_log (
                event_id, name, properties, enqueued_at, attempt_count, max_retries, state
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.name)
        .bind(properties)
        .bind(event.enqueued_at)
        .bind(event.attempt_count as i64)
        .bind(event.max_retries as i64)
        .bind(event.state.as_str())
        .execute(&self.pool)
        .await
        .map_err(QueueError::Storage)?;

        Ok(())
    }

    async fn pending_snapshot(&self) -> Result<Vec<QueuedEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, name, properties, enqueued_at, attempt_count, max_retries, state
            FROM event_log
            WHERE state = 'pending'
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(QueueError::Storage)?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn update_attempts(&self, event: &QueuedEvent) -> Result<()> {
        sqlx::query("UPDATE event_log SET attempt_count = ?, state = ? WHERE event_id = ?")
            .bind(event.attempt_count as i64)
            .bind(event.state.as_str())
            .bind(event.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(QueueError::Storage)?;

        Ok(())
    }

    async fn delete(&self, id: EventId) -> Result<()> {
        sqlx::query("DELETE FROM event_log WHERE event_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(QueueError::Storage)?;

        Ok(())
    }

    async fn count_state(&self, state: EventState) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_log WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(QueueError::Storage)?;

        Ok(count as u64)
    }

    async fn dead_letters(&self) -> Result<Vec<QueuedEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, name, properties, enqueued_at, attempt_count, max_retries, state
            FROM event_log
            WHERE state = 'dead_lettered'
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(QueueError::Storage)?;

        rows.iter().map(Self::row_to_event).collect()
    }

    async fn purge_dead_letters(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM event_log WHERE state = 'dead_lettered'")
            .execute(&self.pool)
            .await
            .map_err(QueueError::Storage)?;

        Ok(result.rows_affected())
    }
}

/// Durable offline queue of pending analytics/media events.
///
/// Exclusively owns its log, independent of the general-purpose cache: the
/// log is append-ordered while the cache is keyed and order-independent.
/// Cloning shares the same queue instance.
#[derive(Clone)]
pub struct OfflineEventQueue {
    repository: Arc<dyn EventLogRepository>,
    // Serializes drain passes; enqueue stays concurrent.
    drain_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
    send_timeout: Duration,
    backoff: BackoffPolicy,
}

impl OfflineEventQueue {
    /// Open an event queue, creating the backing log if needed.
    pub async fn open(config: QueueConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open an event queue with an injected time source.
    pub async fn open_with_clock(config: QueueConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let repository = SqliteEventLogRepository::connect(&config).await?;

        Ok(Self {
            repository: Arc::new(repository),
            drain_lock: Arc::new(Mutex::new(())),
            clock,
            send_timeout: config.send_timeout,
            backoff: config.backoff,
        })
    }

    /// Create a queue over a custom repository.
    pub fn with_repository(
        repository: Arc<dyn EventLogRepository>,
        config: &QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            drain_lock: Arc::new(Mutex::new(())),
            clock,
            send_timeout: config.send_timeout,
            backoff: config.backoff,
        }
    }

    /// Durably append an event for later delivery.
    ///
    /// Never blocks on the network; the only failure mode is local storage.
    pub async fn enqueue(
        &self,
        name: &str,
        properties: Properties,
        max_retries: u32,
    ) -> Result<EventId> {
        if name.is_empty() {
            return Err(QueueError::InvalidInput {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let event = QueuedEvent::new(
            name.to_string(),
            properties,
            max_retries,
            self.clock.unix_timestamp(),
        );
        let id = event.id;

        self.repository.append(&event).await?;

        info!(
            event_id = %id,
            name = %name,
            max_retries,
            "Event enqueued"
        );

        Ok(id)
    }

    /// Run one drain pass: a single delivery attempt for every event that
    /// was pending when the pass began, in enqueue order.
    ///
    /// Events enqueued while the pass runs are left for the next pass.
    pub async fn drain(&self, sender: &dyn EventSender) -> Result<SyncReport> {
        let _guard = self.drain_lock.lock().await;

        let snapshot = self.repository.pending_snapshot().await?;
        debug!(snapshot_size = snapshot.len(), "Starting drain pass");

        let mut report = SyncReport::default();

        for mut event in snapshot {
            match self.attempt_send(sender, &event).await {
                Ok(()) => {
                    self.repository.delete(event.id).await?;
                    debug!(event_id = %event.id, name = %event.name, "Event delivered");
                    report.delivered.push(event.id);
                }
                Err(e) => {
                    let state = event.record_failure();
                    self.repository.update_attempts(&event).await?;

                    match state {
                        EventState::Pending => warn!(
                            event_id = %event.id,
                            attempt_count = event.attempt_count,
                            max_retries = event.max_retries,
                            error = %e,
                            "Event delivery failed, will retry"
                        ),
                        EventState::DeadLettered => {
                            warn!(
                                event_id = %event.id,
                                attempt_count = event.attempt_count,
                                error = %e,
                                "Event delivery failed permanently, dead-lettered"
                            );
                            report.dead_lettered.push(event.id);
                        }
                    }
                }
            }
        }

        report.still_pending = self.repository.count_state(EventState::Pending).await? as usize;

        info!(
            delivered = report.delivered.len(),
            dead_lettered = report.dead_lettered.len(),
            still_pending = report.still_pending,
            "Drain pass finished"
        );

        Ok(report)
    }

    /// Drain repeatedly, with backoff between passes, until no events remain
    /// pending.
    ///
    /// This is the manually triggered sync entry point; hosts also call it
    /// from their connectivity-restored signal. Termination is guaranteed
    /// for a fixed pending set: every pass either delivers an event or moves
    /// it closer to its dead-letter ceiling.
    pub async fn sync(&self, sender: &dyn EventSender) -> Result<SyncReport> {
        let mut report = self.drain(sender).await?;
        let mut pass: u32 = 0;

        while report.still_pending > 0 {
            let delay = self.backoff.delay(pass);
            debug!(pass, delay_ms = delay.as_millis() as u64, "Backing off before next drain pass");
            tokio::time::sleep(delay).await;

            report.absorb(self.drain(sender).await?);
            pass = pass.saturating_add(1);
        }

        Ok(report)
    }

    /// All events currently awaiting delivery, in enqueue order.
    pub async fn pending_events(&self) -> Result<Vec<QueuedEvent>> {
        self.repository.pending_snapshot().await
    }

    /// Number of events awaiting delivery.
    pub async fn pending_count(&self) -> Result<u64> {
        self.repository.count_state(EventState::Pending).await
    }

    /// All dead-lettered events, for caller visibility. They are never
    /// retried; the caller decides whether to drop or surface them.
    pub async fn dead_letters(&self) -> Result<Vec<QueuedEvent>> {
        self.repository.dead_letters().await
    }

    /// Drop all dead-lettered events from the log.
    pub async fn purge_dead_letters(&self) -> Result<u64> {
        let purged = self.repository.purge_dead_letters().await?;
        if purged > 0 {
            info!(purged, "Purged dead-lettered events");
        }
        Ok(purged)
    }

    /// Snapshot aggregate statistics over the log.
    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.repository.count_state(EventState::Pending).await?,
            dead_lettered: self
                .repository
                .count_state(EventState::DeadLettered)
                .await?,
        })
    }

    async fn attempt_send(&self, sender: &dyn EventSender, event: &QueuedEvent) -> Result<()> {
        match tokio::time::timeout(self.send_timeout, sender.send(event)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::SendTimeout(self.send_timeout.as_secs())),
        }
    }
}
