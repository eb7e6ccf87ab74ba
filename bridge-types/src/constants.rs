//! Frozen constant tables for analytics payloads.
//!
//! The event and property names form a closed vocabulary agreed with the
//! ingestion backend. They are modeled as enumerations rather than string
//! tables so a typo is a compile error on the core side; hosts that receive
//! free-form strings go through the `parse` lookups.

use serde::{Deserialize, Serialize};

/// Canonical analytics event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyticsEvent {
    Login,
    Logout,
    ViewTeam,
    UpdateLineup,
    RunSimulation,
    AnalyzeTrade,
    GenerateVideo,
    ViewPlayer,
    OfflineSync,
    PrivacyUpdate,
}

impl AnalyticsEvent {
    /// Wire name sent to the ingestion endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::ViewTeam => "view_team",
            Self::UpdateLineup => "update_lineup",
            Self::RunSimulation => "run_simulation",
            Self::AnalyzeTrade => "analyze_trade",
            Self::GenerateVideo => "generate_video",
            Self::ViewPlayer => "view_player",
            Self::OfflineSync => "offline_sync",
            Self::PrivacyUpdate => "privacy_update",
        }
    }

    /// Every event in the vocabulary, for host-side constant export.
    pub const ALL: [AnalyticsEvent; 10] = [
        Self::Login,
        Self::Logout,
        Self::ViewTeam,
        Self::UpdateLineup,
        Self::RunSimulation,
        Self::AnalyzeTrade,
        Self::GenerateVideo,
        Self::ViewPlayer,
        Self::OfflineSync,
        Self::PrivacyUpdate,
    ];
}

impl std::str::FromStr for AnalyticsEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Unknown analytics event: {}", s))
    }
}

impl std::fmt::Display for AnalyticsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical property keys attachable to analytics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    UserId,
    TeamId,
    SportType,
    PremiumStatus,
    FeatureName,
    DurationMs,
    ErrorType,
    ErrorCode,
    ErrorMessage,
    RetryCount,
    NetworkStatus,
    PrivacyLevel,
    PiiMasked,
}

impl PropertyKey {
    /// Wire key used in event property maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::TeamId => "team_id",
            Self::SportType => "sport_type",
            Self::PremiumStatus => "premium_status",
            Self::FeatureName => "feature_name",
            Self::DurationMs => "duration_ms",
            Self::ErrorType => "error_type",
            Self::ErrorCode => "error_code",
            Self::ErrorMessage => "error_message",
            Self::RetryCount => "retry_count",
            Self::NetworkStatus => "network_status",
            Self::PrivacyLevel => "privacy_level",
            Self::PiiMasked => "pii_masked",
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse error categories reported through analytics error events,
/// orthogonal to the operational [`ErrorKind`](crate::ErrorKind) taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Auth,
    Permission,
    Validation,
    RateLimit,
    System,
    Integration,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::System => "system",
            Self::Integration => "integration",
        }
    }

    /// Base of the thousand-banded code range agreed with the backend.
    /// Specific failures report an offset within their band (e.g. 3001 for
    /// a malformed field, 6002 for an upstream provider rejection).
    pub fn base_code(&self) -> i32 {
        match self {
            Self::Auth => 1000,
            Self::Permission => 2000,
            Self::Validation => 3000,
            Self::RateLimit => 4000,
            Self::System => 5000,
            Self::Integration => 6000,
        }
    }
}
