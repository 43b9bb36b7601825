use super::models::{Content, ContentStatus, Platform, PostType, Schedule, ScheduleStatus};
use super::schema::SCHEDULER_VERSIONED_SCHEMAS;
use super::{ContentStore, StoreStats};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContentStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open scheduler database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if is_new_db {
            info!("Creating new scheduler database at {:?}", path);
            SCHEDULER_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;

            if db_version < 1 {
                anyhow::bail!(
                    "Scheduler database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let latest_version = SCHEDULER_VERSIONED_SCHEMAS.last().unwrap().version as i64;

            let schema = SCHEDULER_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown scheduler database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Scheduler database schema validation failed for version {}",
                    db_version
                )
            })?;

            if db_version < latest_version {
                info!(
                    "Migrating scheduler database from version {} to {}",
                    db_version, latest_version
                );
                Self::migrate_if_needed(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        SCHEDULER_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest = from_version;
        for schema in SCHEDULER_VERSIONED_SCHEMAS.iter() {
            if schema.version > from_version {
                info!(
                    "Running scheduler database migration from version {} to {}",
                    latest, schema.version
                );
                if let Some(migration_fn) = schema.migration {
                    migration_fn(&tx).with_context(|| {
                        format!("Failed to run migration to version {}", schema.version)
                    })?;
                }
                latest = schema.version;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn row_to_content(row: &rusqlite::Row) -> rusqlite::Result<Content> {
        let post_type_str: String = row.get("post_type")?;
        let post_type = PostType::from_str(&post_type_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(0, "post_type".to_string(), Type::Text)
        })?;

        let platform_str: String = row.get("platform")?;
        let platform = Platform::from_str(&platform_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(0, "platform".to_string(), Type::Text)
        })?;

        let status_str: String = row.get("status")?;
        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: String = row.get("updated_at")?;

        Ok(Content {
            id: row.get("id")?,
            file_path: row.get("file_path")?,
            caption: row.get("caption")?,
            post_type,
            platform,
            status: ContentStatus::from_str(&status_str).unwrap_or(ContentStatus::Failed),
            created_at: Self::parse_datetime(&created_at_str).unwrap_or_else(Utc::now),
            updated_at: Self::parse_datetime(&updated_at_str).unwrap_or_else(Utc::now),
        })
    }

    fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
        let platform_str: String = row.get("platform")?;
        let platform = Platform::from_str(&platform_str).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(0, "platform".to_string(), Type::Text)
        })?;

        let status_str: String = row.get("status")?;
        let scheduled_time_str: Option<String> = row.get("scheduled_time")?;
        let last_run_at_str: Option<String> = row.get("last_run_at")?;
        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: String = row.get("updated_at")?;

        Ok(Schedule {
            id: row.get("id")?,
            content_id: row.get("content_id")?,
            platform,
            status: ScheduleStatus::from_str(&status_str).unwrap_or(ScheduleStatus::Failed),
            scheduled_time: scheduled_time_str.as_deref().and_then(Self::parse_datetime),
            hour: row.get::<_, Option<i64>>("hour")?.map(|h| h as u32),
            minute: row.get::<_, Option<i64>>("minute")?.map(|m| m as u32),
            use_day_counter: row.get("use_day_counter")?,
            day_counter: row.get("day_counter")?,
            last_run_at: last_run_at_str.as_deref().and_then(Self::parse_datetime),
            error_message: row.get("error_message")?,
            retry_count: row.get("retry_count")?,
            created_at: Self::parse_datetime(&created_at_str).unwrap_or_else(Utc::now),
            updated_at: Self::parse_datetime(&updated_at_str).unwrap_or_else(Utc::now),
        })
    }
}

const SCHEDULE_COLUMNS: &str = "id, content_id, platform, status, scheduled_time, error_message, \
     retry_count, created_at, updated_at, hour, minute, use_day_counter, day_counter, last_run_at";

impl ContentStore for SqliteContentStore {
    fn insert_content(&self, content: &Content) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO contents (id, file_path, caption, post_type, platform, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                content.id,
                content.file_path,
                content.caption,
                content.post_type.as_str(),
                content.platform.as_str(),
                content.status.as_str(),
                Self::format_datetime(&content.created_at),
                Self::format_datetime(&content.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_content(&self, id: &str) -> Result<Option<Content>> {
        let conn = self.conn.lock().unwrap();
        let content = conn
            .query_row(
                "SELECT * FROM contents WHERE id = ?1",
                params![id],
                Self::row_to_content,
            )
            .optional()?;
        Ok(content)
    }

    fn list_contents(&self, limit: usize, offset: usize) -> Result<Vec<Content>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM contents ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
        )?;
        let contents = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_content)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contents)
    }

    fn count_contents(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM contents", [], |row| row.get(0))?;
        Ok(count)
    }

    fn update_content_status(&self, id: &str, status: ContentStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE contents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Self::format_datetime(&Utc::now()), id],
        )?;
        if updated == 0 {
            anyhow::bail!("Content {} not found", id);
        }
        Ok(())
    }

    fn delete_content(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM contents WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn insert_schedule(&self, schedule: &Schedule) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO schedules ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                SCHEDULE_COLUMNS
            ),
            params![
                schedule.id,
                schedule.content_id,
                schedule.platform.as_str(),
                schedule.status.as_str(),
                schedule.scheduled_time.as_ref().map(Self::format_datetime),
                schedule.error_message,
                schedule.retry_count,
                Self::format_datetime(&schedule.created_at),
                Self::format_datetime(&schedule.updated_at),
                schedule.hour.map(|h| h as i64),
                schedule.minute.map(|m| m as i64),
                schedule.use_day_counter,
                schedule.day_counter,
                schedule.last_run_at.as_ref().map(Self::format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_schedule(&self, id: &str) -> Result<Option<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let schedule = conn
            .query_row(
                "SELECT * FROM schedules WHERE id = ?1",
                params![id],
                Self::row_to_schedule,
            )
            .optional()?;
        Ok(schedule)
    }

    fn list_active_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM schedules WHERE status IN ('pending', 'recurring')
             ORDER BY created_at ASC, id",
        )?;
        let schedules = stmt
            .query_map([], Self::row_to_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schedules)
    }

    fn list_schedules_by_status(&self, status: ScheduleStatus) -> Result<Vec<Schedule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM schedules WHERE status = ?1 ORDER BY created_at ASC, id",
        )?;
        let schedules = stmt
            .query_map(params![status.as_str()], Self::row_to_schedule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(schedules)
    }

    fn commit_execution(
        &self,
        schedule: &Schedule,
        content_status: Option<ContentStatus>,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE schedules
             SET status = ?1, error_message = ?2, retry_count = ?3, day_counter = ?4,
                 last_run_at = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                schedule.status.as_str(),
                schedule.error_message,
                schedule.retry_count,
                schedule.day_counter,
                schedule.last_run_at.as_ref().map(Self::format_datetime),
                Self::format_datetime(&schedule.updated_at),
                schedule.id,
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("Schedule {} not found", schedule.id);
        }

        if let Some(status) = content_status {
            let updated = tx.execute(
                "UPDATE contents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    status.as_str(),
                    Self::format_datetime(&Utc::now()),
                    schedule.content_id,
                ],
            )?;
            if updated == 0 {
                anyhow::bail!(
                    "Content {} not found for schedule {}",
                    schedule.content_id,
                    schedule.id
                );
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().unwrap();

        let count_schedules = |status: &str| -> Result<i64> {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM schedules WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            Ok(count)
        };

        Ok(StoreStats {
            total_contents: conn.query_row("SELECT COUNT(*) FROM contents", [], |row| row.get(0))?,
            published_contents: conn.query_row(
                "SELECT COUNT(*) FROM contents WHERE status = 'published'",
                [],
                |row| row.get(0),
            )?,
            pending_schedules: count_schedules("pending")?,
            recurring_schedules: count_schedules("recurring")?,
            completed_schedules: count_schedules("completed")?,
            failed_schedules: count_schedules("failed")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_content() -> Content {
        Content::new(
            &["/media/photo.jpg"],
            "a caption",
            PostType::Photo,
            Platform::Instagram,
        )
    }

    #[test]
    fn test_insert_and_get_content_round_trip() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        let loaded = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(loaded.id, content.id);
        assert_eq!(loaded.file_path, "/media/photo.jpg");
        assert_eq!(loaded.caption, "a caption");
        assert_eq!(loaded.post_type, PostType::Photo);
        assert_eq!(loaded.platform, Platform::Instagram);
        assert_eq!(loaded.status, ContentStatus::Uploaded);
    }

    #[test]
    fn test_get_content_missing_returns_none() {
        let store = SqliteContentStore::in_memory().unwrap();
        assert!(store.get_content("nope").unwrap().is_none());
    }

    #[test]
    fn test_count_and_list_contents() {
        let store = SqliteContentStore::in_memory().unwrap();
        for _ in 0..3 {
            store.insert_content(&sample_content()).unwrap();
        }

        assert_eq!(store.count_contents().unwrap(), 3);
        assert_eq!(store.list_contents(10, 0).unwrap().len(), 3);
        assert_eq!(store.list_contents(2, 0).unwrap().len(), 2);
        assert_eq!(store.list_contents(10, 2).unwrap().len(), 1);
    }

    #[test]
    fn test_update_content_status() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        store
            .update_content_status(&content.id, ContentStatus::Published)
            .unwrap();
        let loaded = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(loaded.status, ContentStatus::Published);

        assert!(store
            .update_content_status("missing", ContentStatus::Failed)
            .is_err());
    }

    #[test]
    fn test_delete_content_cascades_to_schedules() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();
        let schedule = Schedule::one_time(&content.id, Platform::Instagram, Utc::now());
        store.insert_schedule(&schedule).unwrap();

        assert!(store.delete_content(&content.id).unwrap());
        assert!(store.get_schedule(&schedule.id).unwrap().is_none());
        assert!(!store.delete_content(&content.id).unwrap());
    }

    #[test]
    fn test_insert_and_get_schedule_round_trip() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        let last_run = Utc.with_ymd_and_hms(2024, 5, 31, 10, 30, 0).unwrap();
        let mut schedule =
            Schedule::daily(&content.id, Platform::Tiktok, 10, 30).with_day_counter(5);
        schedule.last_run_at = Some(last_run);
        store.insert_schedule(&schedule).unwrap();

        let loaded = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(loaded.content_id, content.id);
        assert_eq!(loaded.platform, Platform::Tiktok);
        assert_eq!(loaded.status, ScheduleStatus::Recurring);
        assert_eq!(loaded.hour, Some(10));
        assert_eq!(loaded.minute, Some(30));
        assert!(loaded.use_day_counter);
        assert_eq!(loaded.day_counter, 5);
        assert_eq!(loaded.last_run_at, Some(last_run));
        assert_eq!(loaded.scheduled_time, None);
    }

    #[test]
    fn test_list_active_schedules_filters_terminal() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        let pending = Schedule::one_time(&content.id, Platform::Instagram, Utc::now());
        let recurring = Schedule::daily(&content.id, Platform::Instagram, 9, 0);
        let mut completed = Schedule::one_time(&content.id, Platform::Instagram, Utc::now());
        completed.status = ScheduleStatus::Completed;
        let mut failed = Schedule::one_time(&content.id, Platform::Instagram, Utc::now());
        failed.status = ScheduleStatus::Failed;

        for s in [&pending, &recurring, &completed, &failed] {
            store.insert_schedule(s).unwrap();
        }

        let active = store.list_active_schedules().unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|s| s.is_active()));

        let failed_list = store
            .list_schedules_by_status(ScheduleStatus::Failed)
            .unwrap();
        assert_eq!(failed_list.len(), 1);
        assert_eq!(failed_list[0].id, failed.id);
    }

    #[test]
    fn test_commit_execution_updates_schedule_and_content() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        let mut schedule = Schedule::one_time(&content.id, Platform::Instagram, Utc::now());
        store.insert_schedule(&schedule).unwrap();

        schedule.status = ScheduleStatus::Completed;
        schedule.updated_at = Utc::now();
        store
            .commit_execution(&schedule, Some(ContentStatus::Published))
            .unwrap();

        let loaded_schedule = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(loaded_schedule.status, ScheduleStatus::Completed);
        let loaded_content = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(loaded_content.status, ContentStatus::Published);
    }

    #[test]
    fn test_commit_execution_without_content_change() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();

        let mut schedule = Schedule::daily(&content.id, Platform::Instagram, 10, 30);
        store.insert_schedule(&schedule).unwrap();

        schedule.error_message = Some("agent unreachable".to_string());
        schedule.retry_count = 1;
        store.commit_execution(&schedule, None).unwrap();

        let loaded = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(loaded.error_message.as_deref(), Some("agent unreachable"));
        assert_eq!(loaded.retry_count, 1);
        // Content untouched
        let loaded_content = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(loaded_content.status, ContentStatus::Uploaded);
    }

    #[test]
    fn test_commit_execution_unknown_schedule_errors() {
        let store = SqliteContentStore::in_memory().unwrap();
        let schedule = Schedule::one_time("ghost", Platform::Instagram, Utc::now());
        assert!(store.commit_execution(&schedule, None).is_err());
    }

    #[test]
    fn test_stats_counts() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample_content();
        store.insert_content(&content).unwrap();
        store
            .update_content_status(&content.id, ContentStatus::Published)
            .unwrap();

        store
            .insert_schedule(&Schedule::one_time(&content.id, Platform::Instagram, Utc::now()))
            .unwrap();
        store
            .insert_schedule(&Schedule::daily(&content.id, Platform::Instagram, 8, 0))
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_contents, 1);
        assert_eq!(stats.published_contents, 1);
        assert_eq!(stats.pending_schedules, 1);
        assert_eq!(stats.recurring_schedules, 1);
        assert_eq!(stats.completed_schedules, 0);
        assert_eq!(stats.failed_schedules, 0);
    }

    #[test]
    fn test_open_on_disk_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("scheduler.db");

        let content = sample_content();
        {
            let store = SqliteContentStore::new(&db_path).unwrap();
            store.insert_content(&content).unwrap();
        }

        let store = SqliteContentStore::new(&db_path).unwrap();
        assert!(store.get_content(&content.id).unwrap().is_some());
    }

    #[test]
    fn test_open_migrates_v1_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("scheduler.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            SCHEDULER_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        }

        let store = SqliteContentStore::new(&db_path).unwrap();

        // Recurrence fields only exist after the v2 migration
        let content = sample_content();
        store.insert_content(&content).unwrap();
        let schedule = Schedule::daily(&content.id, Platform::Instagram, 7, 45).with_day_counter(2);
        store.insert_schedule(&schedule).unwrap();
        let loaded = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(loaded.hour, Some(7));
        assert_eq!(loaded.day_counter, 2);
    }

    #[test]
    fn test_open_rejects_foreign_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("other.db");

        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE unrelated (id INTEGER PRIMARY KEY)", [])
                .unwrap();
        }

        assert!(SqliteContentStore::new(&db_path).is_err());
    }
}
