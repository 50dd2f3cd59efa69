use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use course_core::model::{CourseId, CourseSummary, Percent, SlideId, UserId};

use crate::repository::{StorageError, SummaryRepository};

use super::SqliteRepository;

#[async_trait]
impl SummaryRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        progress: Percent,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_summaries (user_id, course_id, progress, last_slide_id, updated_at)
            VALUES (?1, ?2, ?3, NULL, ?4)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                progress = excluded.progress,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(i64::from(progress.value()))
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn upsert_last_slide(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        slide_id: &SlideId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO course_summaries (user_id, course_id, progress, last_slide_id, updated_at)
            VALUES (?1, ?2, 0, ?3, ?4)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                last_slide_id = excluded.last_slide_id,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .bind(slide_id.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn get_summary(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseSummary>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT progress, last_slide_id, updated_at
            FROM course_summaries
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(course_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let progress: i64 = row
            .try_get("progress")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let last_slide_id: Option<String> = row
            .try_get("last_slide_id")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        // The column carries a CHECK constraint, so out-of-range is a defect.
        let progress = Percent::try_from(progress)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(Some(CourseSummary {
            user_id: user_id.clone(),
            course_id: course_id.clone(),
            progress,
            last_slide_id: last_slide_id.map(SlideId::new),
            updated_at,
        }))
    }
}
