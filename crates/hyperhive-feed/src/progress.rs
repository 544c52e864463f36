use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use hyperhive_events::ui::VmProgressEvent;

/// How long an entry survives with no further update for its key.
pub const IDLE_EVICTION: Duration = Duration::from_millis(8000);

/// One in-flight long-running operation, as shown in the progress list.
#[derive(Debug, Clone)]
pub struct ProgressEntry {
    pub key: String,
    pub title: String,
    pub description: String,
    pub created_at: Instant,
    pub updated_at: Instant,
    /// Creation order, stable under updates.
    seq: u64,
}

/// Live set of progress entries with per-key idle eviction.
///
/// Every update for a key re-arms that key's eviction timer; a key that goes
/// quiet for the idle window is removed. Entries are only otherwise removed
/// by [`clear`](Self::clear), which also cancels every outstanding timer.
pub struct ProgressBoard {
    inner: Arc<BoardInner>,
}

struct BoardInner {
    idle_window: Duration,
    entries: Mutex<HashMap<String, ProgressEntry>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    next_seq: AtomicU64,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::with_idle_window(IDLE_EVICTION)
    }

    pub fn with_idle_window(idle_window: Duration) -> Self {
        Self {
            inner: Arc::new(BoardInner {
                idle_window,
                entries: Mutex::new(HashMap::new()),
                timers: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Upsert the entry for the event's key and re-arm its eviction timer.
    ///
    /// An existing entry keeps its `created_at` and list position; only
    /// title, description, and `updated_at` change.
    pub fn apply(&self, event: &VmProgressEvent) {
        let now = Instant::now();
        {
            let mut entries = self.inner.entries.lock();
            if let Some(entry) = entries.get_mut(&event.key) {
                entry.title = event.title.clone();
                entry.description = event.description.clone();
                entry.updated_at = now;
            } else {
                entries.insert(
                    event.key.clone(),
                    ProgressEntry {
                        key: event.key.clone(),
                        title: event.title.clone(),
                        description: event.description.clone(),
                        created_at: now,
                        updated_at: now,
                        seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
                    },
                );
            }
        }
        self.arm_timer(&event.key);
    }

    fn arm_timer(&self, key: &str) {
        let board = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();
        let idle_window = self.inner.idle_window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(idle_window).await;
            let Some(board) = board.upgrade() else { return };
            board.entries.lock().remove(&owned_key);
            board.timers.lock().remove(&owned_key);
            tracing::debug!(key = %owned_key, "progress entry idle-evicted");
        });
        if let Some(previous) = self.inner.timers.lock().insert(key.to_string(), timer) {
            previous.abort();
        }
    }

    /// Snapshot of the live entries, oldest creation first.
    pub fn entries(&self) -> Vec<ProgressEntry> {
        let mut entries: Vec<ProgressEntry> = self.inner.entries.lock().values().cloned().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Teardown: cancel every timer and drop every entry immediately. No
    /// eviction fires afterwards.
    pub fn clear(&self) {
        let timers: Vec<JoinHandle<()>> = {
            let mut timers = self.inner.timers.lock();
            timers.drain().map(|(_, timer)| timer).collect()
        };
        for timer in timers {
            timer.abort();
        }
        self.inner.entries.lock().clear();
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BoardInner {
    fn drop(&mut self) {
        for (_, timer) in self.timers.get_mut().drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperhive_events::ui::VmOp;

    fn progress(key: &str, description: &str) -> VmProgressEvent {
        VmProgressEvent {
            op: VmOp::Migrate,
            key: key.to_string(),
            subject: None,
            title: "Migrate VM".to_string(),
            description: description.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_merges_into_one_entry() {
        let board = ProgressBoard::new();
        board.apply(&progress("vm1-abc", "10%"));
        let created_at = board.entries()[0].created_at;

        board.apply(&progress("vm1-abc", "50%"));
        let entries = board.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "50%");
        assert_eq!(entries[0].created_at, created_at);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_stay_ordered_by_creation() {
        let board = ProgressBoard::new();
        board.apply(&progress("first", "a"));
        board.apply(&progress("second", "b"));
        // Updating the oldest entry must not reorder it.
        board.apply(&progress("first", "a2"));

        let entries = board.entries();
        let keys: Vec<&str> = entries
            .iter()
            .map(|entry| entry.key.as_str())
            .collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entry_is_evicted_after_the_window() {
        let board = ProgressBoard::new();
        board.apply(&progress("vm1-abc", "10%"));

        tokio::time::sleep(IDLE_EVICTION - Duration::from_millis(10)).await;
        assert_eq!(board.len(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(board.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_resets_the_eviction_countdown() {
        let board = ProgressBoard::new();
        board.apply(&progress("vm1-abc", "10%"));

        tokio::time::sleep(IDLE_EVICTION - Duration::from_millis(100)).await;
        board.apply(&progress("vm1-abc", "90%"));

        // Past the original deadline, but within the re-armed window.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(board.len(), 1);
        assert_eq!(board.entries()[0].description, "90%");

        tokio::time::sleep(IDLE_EVICTION).await;
        assert!(board.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn independent_keys_evict_independently() {
        let board = ProgressBoard::new();
        board.apply(&progress("old", "x"));
        tokio::time::sleep(IDLE_EVICTION / 2).await;
        board.apply(&progress("young", "y"));

        tokio::time::sleep(IDLE_EVICTION / 2 + Duration::from_millis(10)).await;
        let entries = board.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "young");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_all_timers() {
        let board = ProgressBoard::new();
        board.apply(&progress("vm1-abc", "10%"));
        board.apply(&progress("vm2-def", "20%"));
        board.clear();
        assert!(board.is_empty());

        // Nothing pending fires later.
        tokio::time::sleep(IDLE_EVICTION * 2).await;
        assert!(board.is_empty());
    }
}
