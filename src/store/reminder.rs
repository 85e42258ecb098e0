//! One-shot pre-expiry reminders
//!
//! Each pending reminder owns a claim flag. Firing and cancelling both try to
//! flip it; whichever wins performs its effect and the other backs off.

use super::entry::{OwnerId, ResultEntry};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

pub(crate) type EntryMap = Arc<RwLock<HashMap<String, ResultEntry>>>;
pub(crate) type TimerRegistry = Arc<Mutex<HashMap<String, ReminderTimer>>>;

/// Delivers the "results expire soon" message to a result's owner
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn remind(&self, owner_id: OwnerId, search_id: &str) -> anyhow::Result<()>;
}

/// Handle to a scheduled reminder task
#[derive(Debug)]
pub(crate) struct ReminderTimer {
    claim: Arc<AtomicBool>,
    handle: AbortHandle,
}

impl ReminderTimer {
    /// Cancel the reminder; false if it already fired or is firing
    pub(crate) fn cancel(&self) -> bool {
        if try_claim(&self.claim) {
            self.handle.abort();
            true
        } else {
            false
        }
    }

    fn is(&self, claim: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.claim, claim)
    }
}

fn try_claim(claim: &AtomicBool) -> bool {
    claim
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Everything a reminder task needs once it wakes up
pub(crate) struct ReminderJob {
    pub entries: EntryMap,
    pub registry: TimerRegistry,
    pub notifier: Arc<dyn ReminderNotifier>,
    pub search_id: String,
    pub owner_id: OwnerId,
    /// Creation time of the entry this reminder belongs to
    pub created_at: Instant,
    pub deadline: Instant,
    pub ttl: Duration,
}

impl ReminderJob {
    /// Spawn the reminder and register it, replacing any earlier one for the same id
    pub(crate) fn schedule(self) {
        let registry = self.registry.clone();
        let search_id = self.search_id.clone();
        let claim = Arc::new(AtomicBool::new(false));

        // Hold the registry while spawning so the task cannot deregister before it is registered
        let mut timers = registry.lock();
        let task = tokio::spawn(self.run(claim.clone()));
        let timer = ReminderTimer {
            claim,
            handle: task.abort_handle(),
        };
        if let Some(previous) = timers.insert(search_id.clone(), timer) {
            if previous.cancel() {
                debug!("Replaced pending reminder for {}", search_id);
            }
        }
    }

    async fn run(self, claim: Arc<AtomicBool>) {
        sleep_until(self.deadline).await;

        if !try_claim(&claim) {
            // cancelled concurrently; the canceller already deregistered us
            return;
        }

        // the entry may have been replaced under the same id since scheduling
        let pending = self
            .entries
            .read()
            .get(&self.search_id)
            .map_or(false, |entry| {
                entry.owner_id == self.owner_id
                    && entry.created_at == self.created_at
                    && !entry.unlocked
                    && !entry.is_expired(Instant::now(), self.ttl)
            });

        if pending {
            match self.notifier.remind(self.owner_id, &self.search_id).await {
                Ok(()) => info!(
                    "Reminder sent to {} for search {}",
                    self.owner_id, self.search_id
                ),
                Err(e) => warn!("Failed to send reminder for {}: {}", self.search_id, e),
            }
        } else {
            debug!("Reminder for {} suppressed", self.search_id);
        }

        let mut timers = self.registry.lock();
        if timers.get(&self.search_id).map_or(false, |t| t.is(&claim)) {
            timers.remove(&self.search_id);
        }
    }
}
