use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use course_core::Clock;
use course_core::model::{CourseId, CourseSummary, Percent, SlideId, UserId};
use storage::repository::SummaryRepository;

use crate::error::RemoteSyncError;

/// Debounce window for course progress upserts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Debounced writer for the remote per-(user, course) summary row.
///
/// Each queued value cancels any pending write and schedules a new one, so
/// at most one write is in flight per debounce window and the latest value
/// wins. The remote row is reconciled with last-write-wins semantics; the
/// local cache stays the read path for the UI.
pub struct RemoteSyncService {
    clock: Clock,
    summaries: Arc<dyn SummaryRepository>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl RemoteSyncService {
    #[must_use]
    pub fn new(clock: Clock, summaries: Arc<dyn SummaryRepository>, debounce: Duration) -> Self {
        Self {
            clock,
            summaries,
            debounce,
            pending: Mutex::new(None),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_default_debounce(clock: Clock, summaries: Arc<dyn SummaryRepository>) -> Self {
        Self::new(clock, summaries, DEFAULT_DEBOUNCE)
    }

    /// Queue a debounced course progress upsert, replacing any pending one.
    ///
    /// Fire-and-forget: upsert failures are captured in
    /// [`Self::last_error`], and the next queued value retries naturally.
    pub fn queue_progress(&self, user_id: UserId, course_id: CourseId, progress: Percent) {
        let summaries = Arc::clone(&self.summaries);
        let last_error = Arc::clone(&self.last_error);
        let debounce = self.debounce;
        let clock = self.clock;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let result = summaries
                .upsert_progress(&user_id, &course_id, progress, clock.now())
                .await;
            let mut guard = last_error.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = result.err().map(|err| err.to_string());
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = pending.replace(handle) {
            prev.abort();
        }
    }

    /// Record the last viewed slide immediately; the field is independent of
    /// the debounced progress writes.
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` if the upsert fails.
    pub async fn set_last_slide(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        slide_id: &SlideId,
    ) -> Result<(), RemoteSyncError> {
        self.summaries
            .upsert_last_slide(user_id, course_id, slide_id, self.clock.now())
            .await?;
        Ok(())
    }

    /// Read back the remote summary row (tests and diagnostics; the UI reads
    /// the local cache).
    ///
    /// # Errors
    ///
    /// Returns `RemoteSyncError` if repository access fails.
    pub async fn summary(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseSummary>, RemoteSyncError> {
        let summary = self.summaries.get_summary(user_id, course_id).await?;
        Ok(summary)
    }

    /// Wait for the pending debounced write, if any, to finish.
    pub async fn flush(&self) {
        let handle = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.take()
        };
        if let Some(handle) = handle {
            // An aborted or panicked task has nothing left to flush.
            let _ = handle.await;
        }
    }

    /// Most recent failure of a debounced upsert.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use course_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::{InMemoryStore, StorageError};

    const TEST_DEBOUNCE: Duration = Duration::from_millis(20);

    fn ids() -> (UserId, CourseId) {
        (UserId::new("u1"), CourseId::new("c1"))
    }

    /// Counts progress upserts so coalescing is observable.
    #[derive(Clone, Default)]
    struct CountingSummaryRepo {
        inner: InMemoryStore,
        progress_writes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SummaryRepository for CountingSummaryRepo {
        async fn upsert_progress(
            &self,
            user_id: &UserId,
            course_id: &CourseId,
            progress: Percent,
            updated_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.progress_writes.fetch_add(1, Ordering::SeqCst);
            self.inner
                .upsert_progress(user_id, course_id, progress, updated_at)
                .await
        }

        async fn upsert_last_slide(
            &self,
            user_id: &UserId,
            course_id: &CourseId,
            slide_id: &SlideId,
            updated_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.inner
                .upsert_last_slide(user_id, course_id, slide_id, updated_at)
                .await
        }

        async fn get_summary(
            &self,
            user_id: &UserId,
            course_id: &CourseId,
        ) -> Result<Option<CourseSummary>, StorageError> {
            self.inner.get_summary(user_id, course_id).await
        }
    }

    #[tokio::test]
    async fn queued_progress_is_written_after_debounce() {
        let (user, course) = ids();
        let service = RemoteSyncService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryStore::new()),
            TEST_DEBOUNCE,
        );

        service.queue_progress(user.clone(), course.clone(), Percent::from_raw(40.0));
        service.flush().await;

        let summary = service.summary(&user, &course).await.unwrap().unwrap();
        assert_eq!(summary.progress.value(), 40);
        assert_eq!(summary.updated_at, fixed_now());
        assert_eq!(service.last_error(), None);
    }

    #[tokio::test]
    async fn rapid_queues_coalesce_into_one_write() {
        let (user, course) = ids();
        let repo = CountingSummaryRepo::default();
        let service = RemoteSyncService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            TEST_DEBOUNCE,
        );

        service.queue_progress(user.clone(), course.clone(), Percent::from_raw(10.0));
        service.queue_progress(user.clone(), course.clone(), Percent::from_raw(50.0));
        service.queue_progress(user.clone(), course.clone(), Percent::from_raw(90.0));
        service.flush().await;
        // Let any aborted task unwind before counting.
        tokio::time::sleep(TEST_DEBOUNCE * 2).await;

        assert_eq!(repo.progress_writes.load(Ordering::SeqCst), 1);
        let summary = service.summary(&user, &course).await.unwrap().unwrap();
        assert_eq!(summary.progress.value(), 90);
    }

    #[tokio::test]
    async fn flush_with_nothing_pending_is_a_noop() {
        let (user, course) = ids();
        let service = RemoteSyncService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryStore::new()),
            TEST_DEBOUNCE,
        );

        service.flush().await;
        assert_eq!(service.summary(&user, &course).await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_slide_is_written_immediately() {
        let (user, course) = ids();
        let service = RemoteSyncService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryStore::new()),
            TEST_DEBOUNCE,
        );

        service
            .set_last_slide(&user, &course, &SlideId::new("s5"))
            .await
            .unwrap();

        let summary = service.summary(&user, &course).await.unwrap().unwrap();
        assert_eq!(summary.last_slide_id, Some(SlideId::new("s5")));
        assert_eq!(summary.progress, Percent::ZERO);
    }
}
