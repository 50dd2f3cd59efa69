use std::sync::Arc;

use course_core::model::{CourseId, ModuleId, Percent, UserId};
use storage::repository::ModuleCatalog;

use crate::error::CourseProgressError;
use crate::progress_tracker::ProgressTracker;
use crate::remote_sync_service::RemoteSyncService;

/// Course-level view over the module progress cache.
///
/// Resolves a course to its module list, aggregates per-module completion,
/// and feeds the debounced remote sync on each slide report.
pub struct CourseProgressService {
    catalog: Arc<dyn ModuleCatalog>,
    tracker: Arc<ProgressTracker>,
    sync: Arc<RemoteSyncService>,
}

impl CourseProgressService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ModuleCatalog>,
        tracker: Arc<ProgressTracker>,
        sync: Arc<RemoteSyncService>,
    ) -> Self {
        Self {
            catalog,
            tracker,
            sync,
        }
    }

    /// Mean completion across the course's modules. A course with no known
    /// modules yields 0.
    ///
    /// # Errors
    ///
    /// Returns `CourseProgressError::Storage` if the catalog cannot be read.
    pub async fn course_progress(
        &self,
        course_id: &CourseId,
    ) -> Result<Percent, CourseProgressError> {
        let modules = self.catalog.modules_for_course(course_id).await?;
        Ok(self.tracker.course_progress(&modules))
    }

    /// Record a slide-level progress report.
    ///
    /// Applies the scroll heuristic for the slide at zero-based
    /// `slide_index` out of `slide_count`, writes through the guarded setter
    /// (a finished module never regresses), queues the debounced remote
    /// upsert of the new course aggregate, and returns that aggregate.
    ///
    /// # Errors
    ///
    /// Returns `CourseProgressError::Persist` if the local snapshot write
    /// fails, or `CourseProgressError::Storage` if the catalog cannot be
    /// read.
    pub async fn report_slide_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        module_id: &ModuleId,
        slide_index: usize,
        slide_count: usize,
    ) -> Result<Percent, CourseProgressError> {
        let percent = Percent::from_slide_position(slide_index, slide_count);
        self.tracker
            .set_module_progress_safe(module_id, f64::from(percent.value()))
            .await?;

        let aggregate = self.course_progress(course_id).await?;
        self.sync
            .queue_progress(user_id.clone(), course_id.clone(), aggregate);
        Ok(aggregate)
    }
}
