//! Postloop Scheduler Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod content_store;
pub mod dispatch;
pub mod scheduler;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use content_store::{ContentStore, SqliteContentStore};
pub use dispatch::{HttpUploadDispatcher, UploadDispatcher};
pub use scheduler::{create_scheduler, ScheduleIntake, SchedulerHandle};
