#![forbid(unsafe_code)]

pub mod app_services;
pub mod course_progress_service;
pub mod error;
pub mod progress_tracker;
pub mod remote_sync_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use course_progress_service::CourseProgressService;
pub use error::{
    AppServicesError, CourseProgressError, HydrationError, PersistError, RemoteSyncError,
};
pub use progress_tracker::{LastError, PROGRESS_STORE_KEY, ProgressTracker};
pub use remote_sync_service::{DEFAULT_DEBOUNCE, RemoteSyncService};
