//! Ephemeral result store
//!
//! Holds completed searches for a bounded window, applies the free/unlocked
//! visibility policy and reminds owners shortly before their results expire.
//! Expired entries read as absent whether or not they were purged yet.

mod entry;
mod reminder;

pub use entry::{OwnerId, ResultEntry, ResultView, Visibility, VisibilityPolicy};
pub use reminder::ReminderNotifier;

use crate::config::StoreSettings;
use crate::search::{Match, SearchReport};
use chrono::Utc;
use moka::future::Cache;
use parking_lot::{Mutex, RwLock};
use reminder::{EntryMap, ReminderJob, TimerRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Owned, shareable store of search results and their pending reminders
#[derive(Clone)]
pub struct ResultStore {
    entries: EntryMap,
    reminders: TimerRegistry,
    /// Most recent search per owner
    last_search: Cache<OwnerId, String>,
    notifier: Arc<dyn ReminderNotifier>,
    ttl: Duration,
    reminder_delay: Duration,
    policy: VisibilityPolicy,
}

impl ResultStore {
    /// Create a new store
    pub fn new(settings: &StoreSettings, notifier: Arc<dyn ReminderNotifier>) -> Self {
        let last_search = Cache::builder()
            .time_to_live(settings.results_ttl())
            .max_capacity(10_000)
            .build();

        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            reminders: Arc::new(Mutex::new(HashMap::new())),
            last_search,
            notifier,
            ttl: settings.results_ttl(),
            reminder_delay: settings.reminder_delay(),
            policy: VisibilityPolicy::from(settings),
        }
    }

    pub fn policy(&self) -> &VisibilityPolicy {
        &self.policy
    }

    /// Store a locked result and schedule its expiry reminder
    pub async fn put(
        &self,
        search_id: impl Into<String>,
        owner_id: OwnerId,
        report: SearchReport,
        now: Instant,
    ) {
        let search_id = search_id.into();
        self.insert(&search_id, owner_id, report, now, false).await;

        ReminderJob {
            entries: self.entries.clone(),
            registry: self.reminders.clone(),
            notifier: self.notifier.clone(),
            search_id: search_id.clone(),
            owner_id,
            created_at: now,
            deadline: now + self.reminder_delay,
            ttl: self.ttl,
        }
        .schedule();

        info!(
            "Stored search {} for {}, reminder in {:?}",
            search_id, owner_id, self.reminder_delay
        );
    }

    /// Store a result that is fully visible from the start; no reminder is scheduled
    pub async fn put_unlocked(
        &self,
        search_id: impl Into<String>,
        owner_id: OwnerId,
        report: SearchReport,
        now: Instant,
    ) {
        let search_id = search_id.into();
        self.insert(&search_id, owner_id, report, now, true).await;
        self.cancel_reminder(&search_id);
        info!("Stored unlocked search {} for {}", search_id, owner_id);
    }

    async fn insert(
        &self,
        search_id: &str,
        owner_id: OwnerId,
        report: SearchReport,
        now: Instant,
        unlocked: bool,
    ) {
        let entry = ResultEntry {
            search_id: search_id.to_string(),
            owner_id,
            report: Arc::new(report),
            created_at: now,
            stored_at: Utc::now(),
            unlocked,
        };

        let previous = self.entries.write().insert(search_id.to_string(), entry);
        if let Some(previous) = previous {
            // ids come from the service, a repeat means two searches share a key
            warn!(
                "Search id {} reused, replacing result of owner {}",
                search_id, previous.owner_id
            );
        }
        self.last_search.insert(owner_id, search_id.to_string()).await;
    }

    /// Live entry for `search_id`, absent if missing or expired
    pub fn get(&self, search_id: &str, now: Instant) -> Option<ResultEntry> {
        self.entries
            .read()
            .get(search_id)
            .filter(|entry| !entry.is_expired(now, self.ttl))
            .cloned()
    }

    /// Entry as its owner currently sees it
    pub fn view(&self, search_id: &str, now: Instant) -> Option<ResultView> {
        let entry = self.get(search_id, now)?;
        Some(ResultView {
            search_id: entry.search_id.clone(),
            visibility: entry.visibility(&self.policy),
            matches: entry.visible_matches(&self.policy).to_vec(),
            stored_at: entry.stored_at,
            expires_in: entry.expires_in(now, self.ttl),
        })
    }

    /// Reveal every match of a live entry and drop its reminder
    ///
    /// Returns false when the entry is missing or expired; the caller should
    /// then tell the user the results can no longer be unlocked.
    pub fn unlock(&self, search_id: &str, now: Instant) -> bool {
        {
            let mut entries = self.entries.write();
            match entries.get_mut(search_id) {
                Some(entry) if !entry.is_expired(now, self.ttl) => entry.unlocked = true,
                _ => return false,
            }
        }

        self.cancel_reminder(search_id);
        info!("Search {} unlocked", search_id);
        true
    }

    /// Single match of a live entry, for unlocking one link
    pub fn reveal(&self, search_id: &str, index: usize, now: Instant) -> Option<Match> {
        if index >= self.policy.max_results {
            return None;
        }
        let entry = self.get(search_id, now)?;
        entry.report.matches.get(index).cloned()
    }

    pub fn is_expired(&self, search_id: &str, now: Instant) -> bool {
        self.entries
            .read()
            .get(search_id)
            .map_or(true, |entry| entry.is_expired(now, self.ttl))
    }

    /// Delete an entry and its reminder; true if it existed
    pub fn remove(&self, search_id: &str) -> bool {
        let removed = self.entries.write().remove(search_id).is_some();
        self.cancel_reminder(search_id);
        removed
    }

    /// Latest live search of `owner_id`
    pub async fn last_search(&self, owner_id: OwnerId, now: Instant) -> Option<ResultEntry> {
        let search_id = self.last_search.get(&owner_id).await?;
        self.get(&search_id, now)
    }

    /// Physically drop expired entries, returning how many went
    pub fn purge_expired(&self, now: Instant) -> usize {
        let expired: Vec<String> = {
            let mut entries = self.entries.write();
            let ids: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now, self.ttl))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                entries.remove(id);
            }
            ids
        };

        for id in &expired {
            self.cancel_reminder(id);
        }
        expired.len()
    }

    /// Purge expired entries every `period` until the handle is aborted
    ///
    /// A zero period is raised to one second.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = period.max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired(Instant::now());
                if purged > 0 {
                    debug!("Purged {} expired results", purged);
                }
            }
        })
    }

    fn cancel_reminder(&self, search_id: &str) {
        let timer = self.reminders.lock().remove(search_id);
        if let Some(timer) = timer {
            if timer.cancel() {
                debug!("Reminder for {} cancelled", search_id);
            }
        }
    }

    /// Number of live and not yet purged entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn pending_reminders(&self) -> usize {
        self.reminders.lock().len()
    }

    pub fn has_reminder(&self, search_id: &str) -> bool {
        self.reminders.lock().contains_key(search_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(OwnerId, String)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ReminderNotifier for RecordingNotifier {
        async fn remind(&self, owner_id: OwnerId, search_id: &str) -> anyhow::Result<()> {
            self.calls.lock().push((owner_id, search_id.to_string()));
            if self.fail {
                anyhow::bail!("chat unreachable");
            }
            Ok(())
        }
    }

    fn store_with(notifier: Arc<RecordingNotifier>) -> ResultStore {
        ResultStore::new(&StoreSettings::default(), notifier)
    }

    fn report(count: usize) -> SearchReport {
        SearchReport {
            search_id: Some("S1".to_string()),
            matches: (0..count)
                .map(|i| Match::new(90.0, format!("https://example.com/{}", i)))
                .collect(),
            scanned_count: Some(100),
            elapsed_seconds: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let store = store_with(Arc::default());
        let t0 = Instant::now();
        store.put("S1", 1, report(5), t0).await;

        assert!(store.get("S1", t0 + 29 * MINUTE).is_some());
        assert!(store.get("S1", t0 + 31 * MINUTE).is_none());
        assert!(!store.is_expired("S1", t0 + 29 * MINUTE));
        assert!(store.is_expired("S1", t0 + 31 * MINUTE));
        assert!(store.is_expired("missing", t0));
        // lazily expired, not purged
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_fires_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        store.put("S1", 42, report(5), Instant::now()).await;
        assert!(store.has_reminder("S1"));

        tokio::time::sleep(24 * MINUTE).await;
        assert!(notifier.calls.lock().is_empty());

        tokio::time::sleep(2 * MINUTE).await;
        assert_eq!(*notifier.calls.lock(), vec![(42, "S1".to_string())]);
        assert_eq!(store.pending_reminders(), 0);

        tokio::time::sleep(60 * MINUTE).await;
        assert_eq!(notifier.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_suppresses_reminder() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put("S1", 42, report(5), t0).await;

        assert!(store.unlock("S1", t0 + MINUTE));
        assert!(!store.has_reminder("S1"));

        tokio::time::sleep(30 * MINUTE).await;
        assert!(notifier.calls.lock().is_empty());
        assert!(store.get("S1", t0 + 2 * MINUTE).unwrap().unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_missing_or_expired_has_no_effect() {
        let store = store_with(Arc::default());
        let t0 = Instant::now();
        store.put("S1", 1, report(5), t0).await;

        assert!(!store.unlock("nope", t0));
        assert!(!store.unlock("S1", t0 + 31 * MINUTE));
        assert!(store.has_reminder("S1"));
        assert_eq!(store.pending_reminders(), 1);
        assert!(!store.get("S1", t0).unwrap().unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_entry_never_reminds() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put("S1", 1, report(5), t0).await;

        assert!(store.remove("S1"));
        assert!(!store.remove("S1"));
        assert_eq!(store.pending_reminders(), 0);

        tokio::time::sleep(30 * MINUTE).await;
        assert!(notifier.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_put_keeps_single_reminder() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put("S1", 1, report(2), t0).await;
        store.put("S1", 2, report(4), t0 + MINUTE).await;

        assert_eq!(store.pending_reminders(), 1);
        assert_eq!(store.get("S1", t0 + MINUTE).unwrap().owner_id, 2);

        tokio::time::sleep(27 * MINUTE).await;
        assert_eq!(*notifier.calls.lock(), vec![(2, "S1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifier_failure_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put("S1", 1, report(5), t0).await;

        tokio::time::sleep(26 * MINUTE).await;
        assert_eq!(notifier.calls.lock().len(), 1);
        assert_eq!(store.pending_reminders(), 0);
        assert!(store.unlock("S1", t0 + 26 * MINUTE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_unlocked_schedules_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put_unlocked("P1", 9, report(12), t0).await;

        assert_eq!(store.pending_reminders(), 0);
        let view = store.view("P1", t0).unwrap();
        assert_eq!(view.visibility, Visibility::Full { shown: 10 });

        tokio::time::sleep(26 * MINUTE).await;
        assert!(notifier.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_and_reveal() {
        let store = store_with(Arc::default());
        let t0 = Instant::now();
        store.put("S1", 1, report(8), t0).await;

        let view = store.view("S1", t0 + 10 * MINUTE).unwrap();
        assert_eq!(view.visibility, Visibility::Preview { shown: 3, hidden: 5 });
        assert_eq!(view.stored_at, store.get("S1", t0).unwrap().stored_at);
        assert!(view.stored_at <= Utc::now());
        assert_eq!(view.matches.len(), 3);
        assert_eq!(view.expires_in, 20 * MINUTE);

        let revealed = store.reveal("S1", 6, t0).unwrap();
        assert_eq!(revealed.url, "https://example.com/6");
        assert!(store.reveal("S1", 8, t0).is_none());
        assert!(store.reveal("S1", 0, t0 + 31 * MINUTE).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_search_per_owner() {
        let store = store_with(Arc::default());
        let t0 = Instant::now();
        store.put("S1", 5, report(1), t0).await;
        store.put("S2", 5, report(2), t0).await;

        let last = store.last_search(5, t0).await.unwrap();
        assert_eq!(last.search_id, "S2");
        assert!(store.last_search(6, t0).await.is_none());
        assert!(store.last_search(5, t0 + 31 * MINUTE).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = store_with(Arc::default());
        let t0 = Instant::now();
        store.put("old", 1, report(1), t0).await;
        store.put("new", 1, report(1), t0 + 20 * MINUTE).await;

        assert_eq!(store.purge_expired(t0 + 35 * MINUTE), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.has_reminder("old"));
        assert!(store.get("new", t0 + 35 * MINUTE).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let store = store_with(Arc::default());
        store.put("S1", 1, report(1), Instant::now()).await;
        let sweeper = store.spawn_sweeper(MINUTE);

        tokio::time::sleep(32 * MINUTE).await;
        assert!(store.is_empty());
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_period_still_runs() {
        let store = store_with(Arc::default());
        store.put_unlocked("S1", 1, report(1), Instant::now()).await;
        let sweeper = store.spawn_sweeper(Duration::ZERO);

        tokio::time::sleep(31 * MINUTE + Duration::from_secs(2)).await;
        assert!(!sweeper.is_finished());
        assert!(store.is_empty());
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_put_reminds_only_the_current_owner() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = store_with(notifier.clone());
        let t0 = Instant::now();
        store.put("S1", 1, report(1), t0).await;
        tokio::time::sleep(25 * MINUTE + Duration::from_secs(1)).await;
        // the first reminder fired; a late replacement gets its own
        store.put("S1", 2, report(1), Instant::now()).await;

        tokio::time::sleep(26 * MINUTE).await;
        assert_eq!(
            *notifier.calls.lock(),
            vec![(1, "S1".to_string()), (2, "S1".to_string())]
        );
    }
}
