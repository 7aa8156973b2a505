//! Values passed between discovery, policy and deletion

use chrono::{DateTime, Utc};

/// A tag name returned by discovery, before its creation time is known for sure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTag {
    pub name: String,
    /// Filled in when the listing endpoint already reports a timestamp (the hub does)
    pub last_updated: Option<DateTime<Utc>>,
}

impl DiscoveredTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_updated: None,
        }
    }
}

/// A tag with a resolved creation time, ready for the retention policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCandidate {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Manifest digest; registry v2 deletes by digest rather than by name
    pub digest: Option<String>,
}

impl TagCandidate {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
            digest: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    DryRun,
    Failed(String),
}

/// Result of one deletion task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub status: DeletionStatus,
}

impl DeletionOutcome {
    /// Dry-run deletions count as successes
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, DeletionStatus::Failed(_))
    }
}

/// Totals for one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Tags returned by the backend after name filtering
    pub discovered: usize,
    /// Tags whose creation time could be resolved
    pub candidates: usize,
    /// Tags selected by the retention policy
    pub selected: usize,
    pub deleted: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn record(&mut self, outcome: &DeletionOutcome) {
        if outcome.succeeded() {
            self.deleted += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn summary_line(&self) -> String {
        let verb = if self.dry_run {
            "would be deleted"
        } else {
            "deleted"
        };
        format!("{} tag(s) {}, {} failed", self.deleted, verb, self.failed)
    }
}
