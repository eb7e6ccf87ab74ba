//! Integration tests for the offline event queue against an in-memory log.

use async_trait::async_trait;
use bridge_types::{Classify, ErrorKind};
use core_queue::{
    EventSender, OfflineEventQueue, Properties, QueueConfig, QueueError, QueuedEvent,
    Result as QueueResult,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Sender that always succeeds and records delivery order.
#[derive(Default)]
struct RecordingSender {
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl EventSender for RecordingSender {
    async fn send(&self, event: &QueuedEvent) -> QueueResult<()> {
        self.delivered.lock().unwrap().push(event.name.clone());
        Ok(())
    }
}

/// Sender that always fails and counts attempts per event.
#[derive(Default)]
struct FailingSender {
    attempts: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl EventSender for FailingSender {
    async fn send(&self, event: &QueuedEvent) -> QueueResult<()> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(event.id.to_string())
            .or_insert(0) += 1;
        Err(QueueError::Network("endpoint unreachable".to_string()))
    }
}

/// Sender that fails a fixed number of times, then succeeds.
struct FlakySender {
    fail_first: u32,
    calls: AtomicU32,
}

impl FlakySender {
    fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl EventSender for FlakySender {
    async fn send(&self, _event: &QueuedEvent) -> QueueResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(QueueError::Network("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Sender that enqueues a new event while the first drain pass is in flight.
struct EnqueueingSender {
    queue: OfflineEventQueue,
    injected: AtomicBool,
}

#[async_trait]
impl EventSender for EnqueueingSender {
    async fn send(&self, _event: &QueuedEvent) -> QueueResult<()> {
        if !self.injected.swap(true, Ordering::SeqCst) {
            self.queue.enqueue("late", Properties::new(), 0).await?;
        }
        Ok(())
    }
}

/// Sender that hangs far past any reasonable timeout.
struct HangingSender;

#[async_trait]
impl EventSender for HangingSender {
    async fn send(&self, _event: &QueuedEvent) -> QueueResult<()> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(())
    }
}

async fn open_queue() -> OfflineEventQueue {
    OfflineEventQueue::open(QueueConfig::in_memory()).await.unwrap()
}

#[tokio::test]
async fn drain_delivers_in_enqueue_order() {
    let queue = open_queue().await;

    let e1 = queue.enqueue("login", Properties::new(), 2).await.unwrap();
    let e2 = queue.enqueue("view_team", Properties::new(), 2).await.unwrap();
    let e3 = queue.enqueue("logout", Properties::new(), 2).await.unwrap();

    let sender = RecordingSender::default();
    let report = queue.drain(&sender).await.unwrap();

    assert_eq!(report.delivered, vec![e1, e2, e3]);
    assert!(report.dead_lettered.is_empty());
    assert_eq!(report.still_pending, 0);
    assert_eq!(
        *sender.delivered.lock().unwrap(),
        vec!["login", "view_team", "logout"]
    );
}

#[tokio::test]
async fn delivered_events_are_removed_from_the_log() {
    let queue = open_queue().await;
    queue.enqueue("login", Properties::new(), 2).await.unwrap();

    queue.drain(&RecordingSender::default()).await.unwrap();

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test]
async fn always_failing_sender_dead_letters_every_event() {
    let queue = open_queue().await;

    let mut ids = Vec::new();
    for name in ["login", "view_team", "logout"] {
        ids.push(queue.enqueue(name, Properties::new(), 2).await.unwrap());
    }

    let sender = FailingSender::default();
    let report = queue.sync(&sender).await.unwrap();

    assert!(report.delivered.is_empty());
    assert_eq!(report.dead_lettered.len(), 3);
    assert_eq!(report.still_pending, 0);

    // Each event was attempted exactly max_retries + 1 times.
    let attempts = sender.attempts.lock().unwrap();
    for id in &ids {
        assert_eq!(attempts[&id.to_string()], 3);
    }

    let dead = queue.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 3);
    for event in &dead {
        assert_eq!(event.attempt_count, 3);
    }
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn attempt_counts_advance_across_drain_passes() {
    let queue = open_queue().await;
    let id = queue.enqueue("login", Properties::new(), 2).await.unwrap();

    let sender = FlakySender::new(2);

    // Pending(0) -> Pending(1)
    let report = queue.drain(&sender).await.unwrap();
    assert_eq!(report.still_pending, 1);
    assert_eq!(queue.pending_events().await.unwrap()[0].attempt_count, 1);

    // Pending(1) -> Pending(2)
    let report = queue.drain(&sender).await.unwrap();
    assert_eq!(report.still_pending, 1);
    assert_eq!(queue.pending_events().await.unwrap()[0].attempt_count, 2);

    // Pending(2) -> Delivered
    let report = queue.drain(&sender).await.unwrap();
    assert_eq!(report.delivered, vec![id]);
    assert_eq!(report.still_pending, 0);
    assert!(queue.dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_retries_through_transient_failures() {
    let queue = open_queue().await;

    let mut props = Properties::new();
    props.insert("user_id".to_string(), json!("user-1"));
    let id = queue.enqueue("login", props, 2).await.unwrap();

    let report = queue.sync(&FlakySender::new(2)).await.unwrap();

    assert_eq!(report.delivered, vec![id]);
    assert!(report.dead_lettered.is_empty());
    assert_eq!(report.still_pending, 0);
}

#[tokio::test]
async fn event_enqueued_mid_drain_waits_for_next_pass() {
    let queue = open_queue().await;
    let early = queue.enqueue("early", Properties::new(), 0).await.unwrap();

    let sender = EnqueueingSender {
        queue: queue.clone(),
        injected: AtomicBool::new(false),
    };

    let report = queue.drain(&sender).await.unwrap();
    assert_eq!(report.delivered, vec![early]);
    // The mid-drain enqueue is visible as pending but was not attempted.
    assert_eq!(report.still_pending, 1);
    assert_eq!(queue.pending_events().await.unwrap()[0].name, "late");

    let report = queue.drain(&sender).await.unwrap();
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.still_pending, 0);
}

#[tokio::test]
async fn hung_send_times_out_and_counts_as_an_attempt() {
    let config = QueueConfig::in_memory().send_timeout(Duration::from_secs(1));
    let queue = OfflineEventQueue::open(config).await.unwrap();

    let id = queue.enqueue("generate_video", Properties::new(), 0).await.unwrap();

    let report = queue.drain(&HangingSender).await.unwrap();
    assert_eq!(report.dead_lettered, vec![id]);
    assert_eq!(report.still_pending, 0);
}

#[tokio::test]
async fn empty_event_name_is_rejected() {
    let queue = open_queue().await;

    let err = queue.enqueue("", Properties::new(), 2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn dead_letters_are_excluded_from_future_drains() {
    let queue = open_queue().await;
    queue.enqueue("login", Properties::new(), 0).await.unwrap();

    queue.drain(&FailingSender::default()).await.unwrap();
    assert_eq!(queue.dead_letters().await.unwrap().len(), 1);

    // A later successful drain does not resurrect the dead letter.
    let sender = RecordingSender::default();
    let report = queue.drain(&sender).await.unwrap();
    assert!(report.delivered.is_empty());
    assert!(sender.delivered.lock().unwrap().is_empty());
    assert_eq!(queue.dead_letters().await.unwrap().len(), 1);
}

#[tokio::test]
async fn purge_dead_letters_empties_the_parking_lot() {
    let queue = open_queue().await;
    queue.enqueue("login", Properties::new(), 0).await.unwrap();
    queue.enqueue("logout", Properties::new(), 0).await.unwrap();

    queue.sync(&FailingSender::default()).await.unwrap();
    assert_eq!(queue.stats().await.unwrap().dead_lettered, 2);

    let purged = queue.purge_dead_letters().await.unwrap();
    assert_eq!(purged, 2);
    assert_eq!(queue.stats().await.unwrap().dead_lettered, 0);
}

#[tokio::test]
async fn properties_survive_the_durable_round_trip() {
    let queue = open_queue().await;

    let mut props = Properties::new();
    props.insert("team_id".to_string(), json!("team-42"));
    props.insert("duration_ms".to_string(), json!(1250));
    queue.enqueue("view_team", props.clone(), 2).await.unwrap();

    let pending = queue.pending_events().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].properties, props);
}
