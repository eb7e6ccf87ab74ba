//! # TTL & Version Policy
//!
//! Pure validity decisions for stored entries. No I/O, no side effects; the
//! store consults this on every read and acts on the verdict (purge on
//! expiry, reject on version mismatch).

/// Sentinel TTL meaning "never expires".
///
/// `ttl_seconds == 0` deliberately means "already expired one tick after
/// write", not "no expiry"; a non-expiring entry must use this sentinel so
/// "not set" and "expired" stay unambiguous.
pub const TTL_NO_EXPIRY: i64 = i64::MAX;

/// Named TTL windows agreed with the backend for common payload classes.
pub mod ttl {
    /// Player statistics: 15 minutes.
    pub const PLAYER_STATS: i64 = 900;
    /// Weather data: 1 hour.
    pub const WEATHER_DATA: i64 = 3_600;
    /// Trade analysis results: 24 hours.
    pub const TRADE_ANALYSIS: i64 = 86_400;
    /// Generated video content: 7 days.
    pub const VIDEO_CONTENT: i64 = 604_800;
}

/// Metadata consulted by the validity decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Unix timestamp of the write
    pub stored_at: i64,
    /// Expiry window in seconds
    pub ttl_seconds: i64,
    /// Schema version stamped at write time
    pub schema_version: i32,
}

impl EntryMeta {
    /// Unix timestamp after which the entry is no longer valid.
    pub fn deadline(&self) -> i64 {
        self.stored_at.saturating_add(self.ttl_seconds)
    }
}

/// Verdict for a stored entry at a given point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Entry is live and readable
    Valid,
    /// TTL window elapsed; the entry must be purged
    Expired,
    /// Entry was written under a different schema version
    VersionMismatch,
}

/// Decide whether an entry is still valid at `now`.
///
/// Expiry is checked before the version: an expired entry is purged
/// regardless of what version wrote it.
pub fn evaluate(meta: &EntryMeta, now: i64, expected_version: i32) -> Validity {
    if now > meta.deadline() {
        return Validity::Expired;
    }
    if meta.schema_version != expected_version {
        return Validity::VersionMismatch;
    }
    Validity::Valid
}
