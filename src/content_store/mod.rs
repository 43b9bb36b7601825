//! Durable storage for contents and schedules.
//!
//! The scheduler core only sees the `ContentStore` trait; the production
//! implementation is SQLite-backed. All schedule/content mutation driven by
//! job execution goes through `commit_execution`, which updates one schedule
//! (and optionally its content's status) in a single transaction.

mod models;
mod schema;
mod sqlite_content_store;

pub use models::{
    Content, ContentStatus, Platform, PostType, Schedule, ScheduleStatus, StoreStats,
};
pub use schema::SCHEDULER_VERSIONED_SCHEMAS;
pub use sqlite_content_store::SqliteContentStore;

use anyhow::Result;

pub trait ContentStore: Send + Sync {
    // Contents

    fn insert_content(&self, content: &Content) -> Result<()>;

    fn get_content(&self, id: &str) -> Result<Option<Content>>;

    /// List contents, newest first.
    fn list_contents(&self, limit: usize, offset: usize) -> Result<Vec<Content>>;

    fn count_contents(&self) -> Result<i64>;

    fn update_content_status(&self, id: &str, status: ContentStatus) -> Result<()>;

    /// Delete a content item. Schedules referencing it are removed by the
    /// cascading foreign key. Returns false if the id was unknown.
    /// Administrative surface; the scheduler core never deletes.
    fn delete_content(&self, id: &str) -> Result<bool>;

    // Schedules

    fn insert_schedule(&self, schedule: &Schedule) -> Result<()>;

    fn get_schedule(&self, id: &str) -> Result<Option<Schedule>>;

    /// All schedules still participating in evaluation (pending or
    /// recurring), oldest first.
    fn list_active_schedules(&self) -> Result<Vec<Schedule>>;

    fn list_schedules_by_status(&self, status: ScheduleStatus) -> Result<Vec<Schedule>>;

    /// Persist the outcome of one execution: the schedule row and, when
    /// given, its content's status, committed in one transaction.
    fn commit_execution(
        &self,
        schedule: &Schedule,
        content_status: Option<ContentStatus>,
    ) -> Result<()>;

    // Stats

    fn stats(&self) -> Result<StoreStats>;
}
