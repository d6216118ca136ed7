//! Visit counter persisted under `visitCount` / `lastVisit`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use evoweb_core::error::StorageError;
use evoweb_core::signals::VisitState;
use evoweb_core::storage::{KeyValueStore, LAST_VISIT_KEY, VISIT_COUNT_KEY};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ScopedStore;

/// Tracks how often this visitor has been seen.
#[derive(Clone)]
pub struct VisitTracker {
    store: Arc<dyn KeyValueStore>,
    // Serializes read-increment-write within one process.
    update: Arc<Mutex<()>>,
}

impl VisitTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            update: Arc::new(Mutex::new(())),
        }
    }

    /// The same tracker narrowed to one visitor's keys. Updates stay
    /// serialized with every other view of this tracker.
    pub fn for_visitor(&self, visitor_id: &str) -> Self {
        Self {
            store: Arc::new(ScopedStore::new(self.store.clone(), visitor_id)),
            update: self.update.clone(),
        }
    }

    /// Record a visit: increment the stored counter and stamp the time.
    ///
    /// Both keys are written before the new state is returned. A missing or
    /// unparseable counter counts as zero previous visits.
    pub async fn track_visit(&self) -> Result<VisitState, StorageError> {
        let _guard = self.update.lock().await;

        let previous = self.stored_count().await?.unwrap_or(0);
        let state = VisitState {
            visit_count: previous.saturating_add(1),
            last_visit: Utc::now(),
        };

        self.store
            .set(VISIT_COUNT_KEY, &state.visit_count.to_string())
            .await?;
        self.store.set(LAST_VISIT_KEY, &state.last_visit_iso()).await?;

        debug!(visit_count = state.visit_count, "Visit tracked");
        Ok(state)
    }

    /// The recorded state without counting a visit. Nothing recorded reads as
    /// a first visit.
    pub async fn current(&self) -> Result<VisitState, StorageError> {
        let visit_count = self.stored_count().await?.filter(|&c| c >= 1).unwrap_or(1);
        let last_visit = self
            .store
            .get(LAST_VISIT_KEY)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(VisitState {
            visit_count,
            last_visit,
        })
    }

    /// Forget all recorded visits.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let _guard = self.update.lock().await;
        self.store.remove(VISIT_COUNT_KEY).await?;
        self.store.remove(LAST_VISIT_KEY).await?;
        Ok(())
    }

    async fn stored_count(&self) -> Result<Option<u32>, StorageError> {
        let Some(raw) = self.store.get(VISIT_COUNT_KEY).await? else {
            return Ok(None);
        };
        match raw.trim().parse::<u32>() {
            Ok(count) => Ok(Some(count)),
            Err(_) => {
                warn!(value = %raw, "Unparseable visit counter, starting over");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    fn tracker() -> (VisitTracker, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (VisitTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn first_visit_is_one() {
        let (tracker, store) = tracker();
        let state = tracker.track_visit().await.unwrap();
        assert_eq!(state.visit_count, 1);
        assert_eq!(store.get(VISIT_COUNT_KEY).await.unwrap().as_deref(), Some("1"));
        assert!(store.get(LAST_VISIT_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn counter_increments_once_per_visit() {
        let (tracker, _) = tracker();
        for expected in 1..=5 {
            assert_eq!(tracker.track_visit().await.unwrap().visit_count, expected);
        }
        assert_eq!(tracker.current().await.unwrap().visit_count, 5);
    }

    #[tokio::test]
    async fn unparseable_counter_restarts() {
        let (tracker, store) = tracker();
        store.set(VISIT_COUNT_KEY, "lots").await.unwrap();
        assert_eq!(tracker.track_visit().await.unwrap().visit_count, 1);
    }

    #[tokio::test]
    async fn current_without_history_is_first_visit() {
        let (tracker, store) = tracker();
        assert_eq!(tracker.current().await.unwrap().visit_count, 1);
        // Reading does not write.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn current_reads_last_visit() {
        let (tracker, store) = tracker();
        store.set(VISIT_COUNT_KEY, "7").await.unwrap();
        store.set(LAST_VISIT_KEY, "2026-03-01T12:00:00+00:00").await.unwrap();

        let state = tracker.current().await.unwrap();
        assert_eq!(state.visit_count, 7);
        assert_eq!(state.last_visit_iso(), "2026-03-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn concurrent_visits_are_all_counted() {
        let (tracker, _) = tracker();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let t = tracker.clone();
                tokio::spawn(async move { t.track_visit().await.unwrap() })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(tracker.current().await.unwrap().visit_count, 10);
    }

    #[tokio::test]
    async fn visitors_are_counted_separately() {
        let (tracker, store) = tracker();
        let alice = tracker.for_visitor("alice");
        let bob = tracker.for_visitor("bob");

        alice.track_visit().await.unwrap();
        alice.track_visit().await.unwrap();
        assert_eq!(bob.track_visit().await.unwrap().visit_count, 1);
        assert_eq!(alice.current().await.unwrap().visit_count, 2);
        assert!(store.get(VISIT_COUNT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_forgets_history() {
        let (tracker, _) = tracker();
        tracker.track_visit().await.unwrap();
        tracker.track_visit().await.unwrap();
        tracker.reset().await.unwrap();
        assert_eq!(tracker.track_visit().await.unwrap().visit_count, 1);
    }
}
