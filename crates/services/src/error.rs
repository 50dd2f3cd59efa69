//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading the persisted progress snapshot.
///
/// Never fatal: hydration failures degrade to an empty in-memory map.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HydrationError {
    #[error("progress snapshot could not be read: {0}")]
    Read(#[from] StorageError),
    #[error("progress snapshot could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors emitted while writing the progress snapshot.
///
/// Never fatal: the next mutation rewrites the full map, so a failed write
/// is reconciled by the next successful one.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    #[error("progress snapshot could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("progress snapshot could not be written: {0}")]
    Write(#[from] StorageError),
}

/// Errors emitted by `RemoteSyncService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteSyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
