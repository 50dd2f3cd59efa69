use chrono::{DateTime, Utc};

use crate::model::{CourseId, Percent, SlideId, UserId};

/// Authoritative per-(user, course) progress row held by the backend.
///
/// Reconciled asynchronously from the local cache; the local cache stays the
/// read path for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSummary {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress: Percent,
    pub last_slide_id: Option<SlideId>,
    pub updated_at: DateTime<Utc>,
}
