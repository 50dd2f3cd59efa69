use async_trait::async_trait;
use sqlx::Row;

use course_core::model::{CourseId, ModuleId};

use crate::repository::{ModuleCatalog, StorageError};

use super::SqliteRepository;

#[async_trait]
impl ModuleCatalog for SqliteRepository {
    async fn modules_for_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<ModuleId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT module_id
            FROM course_modules
            WHERE course_id = ?1
            ORDER BY position
            ",
        )
        .bind(course_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let mut modules = Vec::with_capacity(rows.len());
        for row in rows {
            let module_id: String = row
                .try_get("module_id")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            modules.push(ModuleId::new(module_id));
        }
        Ok(modules)
    }

    async fn put_course_modules(
        &self,
        course_id: &CourseId,
        module_ids: &[ModuleId],
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        sqlx::query("DELETE FROM course_modules WHERE course_id = ?1")
            .bind(course_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        for (position, module_id) in module_ids.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            sqlx::query(
                r"
                INSERT INTO course_modules (course_id, module_id, position)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(course_id.as_str())
            .bind(module_id.as_str())
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
