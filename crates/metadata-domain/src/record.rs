use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque, structured payload carried by a [`MetadataRecord`]. The core never
/// interprets its contents; it is rendered as JSON on output and otherwise
/// kept out of hot paths.
pub type RawContent = Value;

/// The time-stamped, optionally tombstoned payload associated with a
/// [`crate::MonitoredResource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Schema tag of `raw_content`.
    pub version: String,
    /// When the underlying entity began.
    pub created_at: DateTime<Utc>,
    /// When the agent observed this record.
    pub collected_at: DateTime<Utc>,
    /// A tombstone record means the entity no longer exists upstream.
    pub is_deleted: bool,
    pub raw_content: RawContent,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MetadataRecord {
    pub fn new(
        version: impl Into<String>,
        created_at: DateTime<Utc>,
        collected_at: DateTime<Utc>,
        raw_content: RawContent,
    ) -> Self {
        Self {
            version: version.into(),
            created_at,
            collected_at,
            is_deleted: false,
            raw_content,
            expires_at: None,
        }
    }

    pub fn tombstone(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether `self` should replace `existing` per invariants 3 and 4:
    /// a strictly newer `collected_at` always wins; on a tie a tombstone
    /// wins over a non-tombstone.
    pub fn supersedes(&self, existing: &MetadataRecord) -> bool {
        match self.collected_at.cmp(&existing.collected_at) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => self.is_deleted && !existing.is_deleted,
            std::cmp::Ordering::Less => false,
        }
    }

    /// Whether this record is eligible for the expiry sweep given `now` and
    /// the resource's `last_collection_time`.
    pub fn eligible_for_purge(&self, now: DateTime<Utc>, last_collection_time: DateTime<Utc>, expire_after: chrono::Duration) -> bool {
        self.is_deleted
            || self.expires_at.is_some_and(|exp| now >= exp)
            || now.signed_duration_since(last_collection_time) > expire_after
    }
}
