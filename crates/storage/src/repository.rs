use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use course_core::model::{CourseId, CourseSummary, ModuleId, Percent, SlideId, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable device-local key-value facility.
///
/// Values are opaque strings; callers own serialization and key versioning.
/// Survives process restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value by key. Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, overwriting any prior one (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Repository contract for the remote per-(user, course) summary row.
///
/// The `progress` and `last_slide_id` fields are written independently, each
/// with last-write-wins upsert semantics on the (user, course) key.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Upsert the course progress field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        progress: Percent,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Upsert the last viewed slide field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_last_slide(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        slide_id: &SlideId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Fetch the summary row. Returns `Ok(None)` when no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    async fn get_summary(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseSummary>, StorageError>;
}

/// Resolver from a course to its ordered module list.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// List module ids for a course in content order. Unknown courses
    /// resolve to an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if repository access fails.
    async fn modules_for_course(&self, course_id: &CourseId) -> Result<Vec<ModuleId>, StorageError>;

    /// Replace the module list for a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be stored.
    async fn put_course_modules(
        &self,
        course_id: &CourseId,
        module_ids: &[ModuleId],
    ) -> Result<(), StorageError>;
}

/// Simple in-memory implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    summaries: Arc<Mutex<HashMap<(UserId, CourseId), CourseSummary>>>,
    courses: Arc<Mutex<HashMap<CourseId, Vec<ModuleId>>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SummaryRepository for InMemoryStore {
    async fn upsert_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        progress: Percent,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let row = guard
            .entry((user_id.clone(), course_id.clone()))
            .or_insert_with(|| CourseSummary {
                user_id: user_id.clone(),
                course_id: course_id.clone(),
                progress: Percent::ZERO,
                last_slide_id: None,
                updated_at,
            });
        row.progress = progress;
        row.updated_at = updated_at;
        Ok(())
    }

    async fn upsert_last_slide(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        slide_id: &SlideId,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let row = guard
            .entry((user_id.clone(), course_id.clone()))
            .or_insert_with(|| CourseSummary {
                user_id: user_id.clone(),
                course_id: course_id.clone(),
                progress: Percent::ZERO,
                last_slide_id: None,
                updated_at,
            });
        row.last_slide_id = Some(slide_id.clone());
        row.updated_at = updated_at;
        Ok(())
    }

    async fn get_summary(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<CourseSummary>, StorageError> {
        let guard = self
            .summaries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id.clone(), course_id.clone())).cloned())
    }
}

#[async_trait]
impl ModuleCatalog for InMemoryStore {
    async fn modules_for_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<ModuleId>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(course_id).cloned().unwrap_or_default())
    }

    async fn put_course_modules(
        &self,
        course_id: &CourseId,
        module_ids: &[ModuleId],
    ) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course_id.clone(), module_ids.to_vec());
        Ok(())
    }
}

/// Aggregates the storage contracts behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub catalog: Arc<dyn ModuleCatalog>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        let kv: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let summaries: Arc<dyn SummaryRepository> = Arc::new(store.clone());
        let catalog: Arc<dyn ModuleCatalog> = Arc::new(store);
        Self {
            kv,
            summaries,
            catalog,
        }
    }
}
