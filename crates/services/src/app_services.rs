use std::sync::Arc;
use std::time::Duration;

use storage::repository::Storage;

use crate::Clock;
use crate::course_progress_service::CourseProgressService;
use crate::error::AppServicesError;
use crate::progress_tracker::ProgressTracker;
use crate::remote_sync_service::RemoteSyncService;

/// Assembles app-facing services over a storage backend.
///
/// The tracker is hydrated exactly once here, at startup.
#[derive(Clone)]
pub struct AppServices {
    tracker: Arc<ProgressTracker>,
    course_progress: Arc<CourseProgressService>,
    remote_sync: Arc<RemoteSyncService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        sync_debounce: Duration,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, sync_debounce).await)
    }

    /// Build services over an already-constructed storage backend.
    pub async fn from_storage(storage: Storage, clock: Clock, sync_debounce: Duration) -> Self {
        let tracker = Arc::new(ProgressTracker::new(Arc::clone(&storage.kv)));
        // Best-effort: a failed hydration leaves an empty cache and records
        // the error on the tracker; startup is never blocked.
        let _ = tracker.hydrate_from_storage().await;

        let remote_sync = Arc::new(RemoteSyncService::new(
            clock,
            Arc::clone(&storage.summaries),
            sync_debounce,
        ));
        let course_progress = Arc::new(CourseProgressService::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&tracker),
            Arc::clone(&remote_sync),
        ));

        Self {
            tracker,
            course_progress,
            remote_sync,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.tracker)
    }

    #[must_use]
    pub fn course_progress(&self) -> Arc<CourseProgressService> {
        Arc::clone(&self.course_progress)
    }

    #[must_use]
    pub fn remote_sync(&self) -> Arc<RemoteSyncService> {
        Arc::clone(&self.remote_sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::progress_tracker::PROGRESS_STORE_KEY;
    use course_core::model::ModuleId;
    use course_core::time::fixed_now;
    use storage::repository::{InMemoryStore, KeyValueStore};

    #[tokio::test]
    async fn from_storage_hydrates_existing_snapshot() {
        let store = InMemoryStore::new();
        store
            .set(PROGRESS_STORE_KEY, r#"{"m1":80}"#)
            .await
            .unwrap();
        let storage = Storage {
            kv: Arc::new(store.clone()),
            summaries: Arc::new(store.clone()),
            catalog: Arc::new(store),
        };

        let services = AppServices::from_storage(
            storage,
            Clock::fixed(fixed_now()),
            Duration::from_millis(10),
        )
        .await;

        let tracker = services.tracker();
        assert!(tracker.hydrated());
        assert_eq!(tracker.module_progress(&ModuleId::new("m1")).value(), 80);
    }

    #[tokio::test]
    async fn from_storage_absorbs_corrupt_snapshot() {
        let store = InMemoryStore::new();
        store.set(PROGRESS_STORE_KEY, "garbage").await.unwrap();
        let storage = Storage {
            kv: Arc::new(store.clone()),
            summaries: Arc::new(store.clone()),
            catalog: Arc::new(store),
        };

        let services = AppServices::from_storage(
            storage,
            Clock::fixed(fixed_now()),
            Duration::from_millis(10),
        )
        .await;

        let tracker = services.tracker();
        assert!(tracker.hydrated());
        assert!(tracker.snapshot().is_empty());
        assert!(tracker.last_error().is_some());
    }
}
