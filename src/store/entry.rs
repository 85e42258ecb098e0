//! Stored result entries and the free/unlocked visibility policy

use crate::config::StoreSettings;
use crate::search::{Match, SearchReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Identifier of the user a result belongs to
pub type OwnerId = i64;

/// A completed search held by the store
#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub search_id: String,
    pub owner_id: OwnerId,
    pub report: Arc<SearchReport>,
    /// Monotonic creation time, drives expiry
    pub created_at: Instant,
    /// Wall-clock creation time, for display
    pub stored_at: DateTime<Utc>,
    /// All matches revealed
    pub unlocked: bool,
}

impl ResultEntry {
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// Time left before expiry, zero once expired
    pub fn expires_in(&self, now: Instant, ttl: Duration) -> Duration {
        ttl.saturating_sub(now.saturating_duration_since(self.created_at))
    }

    pub fn visibility(&self, policy: &VisibilityPolicy) -> Visibility {
        let total = self.report.displayed_count(policy.max_results);
        if self.unlocked {
            Visibility::Full { shown: total }
        } else {
            let shown = total.min(policy.free_results_count);
            Visibility::Preview {
                shown,
                hidden: total - shown,
            }
        }
    }

    /// Matches the owner may currently see
    pub fn visible_matches(&self, policy: &VisibilityPolicy) -> &[Match] {
        let shown = self.visibility(policy).shown();
        &self.report.matches[..shown]
    }
}

/// How many matches an entry shows before and after unlocking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    pub free_results_count: usize,
    pub max_results: usize,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::from(&StoreSettings::default())
    }
}

impl From<&StoreSettings> for VisibilityPolicy {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            free_results_count: settings.free_results_count,
            max_results: settings.max_results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Locked: the first `shown` matches are visible, `hidden` more exist
    Preview { shown: usize, hidden: usize },
    /// Unlocked: every displayable match is visible
    Full { shown: usize },
}

impl Visibility {
    pub fn shown(&self) -> usize {
        match *self {
            Visibility::Preview { shown, .. } | Visibility::Full { shown } => shown,
        }
    }
}

/// Snapshot of a live entry as its owner sees it
#[derive(Debug, Clone)]
pub struct ResultView {
    pub search_id: String,
    pub visibility: Visibility,
    pub matches: Vec<Match>,
    /// When the result was stored, wall clock
    pub stored_at: DateTime<Utc>,
    pub expires_in: Duration,
}
