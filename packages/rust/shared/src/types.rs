//! Core domain types for Pagewatch monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{PagewatchError, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for target identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub Uuid);

impl TargetId {
    /// Generate a new time-sortable target identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TargetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A UUID v7 wrapper for snapshot identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SnapshotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// TargetStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a monitored target.
///
/// Transitions are externally driven (admin/billing surfaces); the pipeline
/// only reads status and never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Active,
    Paused,
    Error,
    PendingPayment,
}

impl TargetStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::PendingPayment => "pending_payment",
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetStatus {
    type Err = PagewatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "error" => Ok(Self::Error),
            "pending_payment" => Ok(Self::PendingPayment),
            other => Err(PagewatchError::validation(format!(
                "unknown target status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// A monitored URL belonging to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique target identifier (UUID v7).
    pub id: TargetId,
    /// The page URL to watch.
    pub url: String,
    /// Human-readable display name (defaults to the URL in alerts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address alerts for this target are sent to.
    pub owner_email: String,
    /// Check interval in hours.
    pub frequency_hours: u32,
    /// Lifecycle status.
    pub status: TargetStatus,
    /// When the pipeline last checked this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    /// When the target was registered.
    pub created_at: DateTime<Utc>,
}

impl Target {
    /// Create a new active target, validating the URL.
    pub fn new(url: &str, owner_email: &str, name: Option<String>) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(PagewatchError::validation("target URL is empty"));
        }
        let parsed = Url::parse(url)
            .map_err(|e| PagewatchError::validation(format!("invalid target URL '{url}': {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(PagewatchError::validation(format!(
                "target URL '{url}' must be http or https"
            )));
        }

        Ok(Self {
            id: TargetId::new(),
            url: url.to_string(),
            name,
            owner_email: owner_email.to_string(),
            frequency_hours: 24,
            status: TargetStatus::Active,
            last_checked: None,
            created_at: Utc::now(),
        })
    }

    /// Name shown in alerts: display name if set, URL otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A stored observation of a target's content state at one point in time.
///
/// Snapshots are append-only and immutable once written. The latest snapshot
/// for a target is the comparison baseline for its next check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique snapshot identifier (UUID v7).
    pub id: SnapshotId,
    /// Owning target.
    pub target_id: TargetId,
    /// SHA-256 hex digest of the normalized page text.
    pub content_hash: String,
    /// The normalized page text this snapshot recorded.
    pub clean_content: String,
    /// Human-readable change summary.
    pub summary: String,
    /// Short description of how the summary was produced.
    pub diff_description: String,
    /// When the snapshot was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ChangeSummary
// ---------------------------------------------------------------------------

/// Summary + description pair produced for a detected change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub summary: String,
    pub description: String,
}

impl ChangeSummary {
    /// Fixed pair recorded for a target's first observation; the
    /// summarization backend is not consulted for it.
    pub fn initial() -> Self {
        Self {
            summary: "Initial snapshot".into(),
            description: "Monitoring started".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_id_roundtrip() {
        let id = TargetId::new();
        let s = id.to_string();
        let parsed: TargetId = s.parse().expect("parse TargetId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn snapshot_ids_are_unique() {
        let a = SnapshotId::new();
        let b = SnapshotId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn target_new_validates_url() {
        assert!(Target::new("", "a@example.com", None).is_err());
        assert!(Target::new("not a url", "a@example.com", None).is_err());
        assert!(Target::new("ftp://example.com", "a@example.com", None).is_err());

        let target =
            Target::new("https://example.com/pricing", "a@example.com", None).expect("valid");
        assert_eq!(target.status, TargetStatus::Active);
        assert_eq!(target.frequency_hours, 24);
        assert!(target.last_checked.is_none());
    }

    #[test]
    fn display_name_falls_back_to_url() {
        let mut target =
            Target::new("https://example.com", "a@example.com", Some("Acme".into())).unwrap();
        assert_eq!(target.display_name(), "Acme");
        target.name = None;
        assert_eq!(target.display_name(), "https://example.com");
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            TargetStatus::Active,
            TargetStatus::Paused,
            TargetStatus::Error,
            TargetStatus::PendingPayment,
        ] {
            let parsed: TargetStatus = status.as_str().parse().expect("roundtrip");
            assert_eq!(parsed, status);
        }
        assert!("gone".parse::<TargetStatus>().is_err());
    }

    #[test]
    fn initial_summary_pair() {
        let initial = ChangeSummary::initial();
        assert_eq!(initial.summary, "Initial snapshot");
        assert_eq!(initial.description, "Monitoring started");
    }

    #[test]
    fn target_serialization() {
        let target = Target::new(
            "https://competitor.example/pricing",
            "owner@example.com",
            Some("Competitor pricing".into()),
        )
        .unwrap();

        let json = serde_json::to_string(&target).expect("serialize");
        assert!(json.contains(r#""status":"active""#));
        let parsed: Target = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.id, target.id);
        assert_eq!(parsed.owner_email, "owner@example.com");
    }
}
