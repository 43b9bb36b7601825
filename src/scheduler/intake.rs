//! Creation of schedules for stored content.

use crate::content_store::{ContentStatus, ContentStore, Platform, Schedule};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("content {0} not found")]
    ContentNotFound(String),
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Creates schedules and marks the referenced content as scheduled.
pub struct ScheduleIntake {
    store: Arc<dyn ContentStore>,
}

impl ScheduleIntake {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Schedule a single publish at an absolute UTC instant.
    pub fn schedule_one_time(
        &self,
        content_id: &str,
        platform: Platform,
        scheduled_time: DateTime<Utc>,
    ) -> Result<Schedule, IntakeError> {
        self.require_content(content_id)?;

        let schedule = Schedule::one_time(content_id, platform, scheduled_time);
        self.store.insert_schedule(&schedule)?;
        self.store
            .update_content_status(content_id, ContentStatus::Scheduled)?;

        info!(
            "Created one-time schedule {} for content {} at {}",
            schedule.id, content_id, scheduled_time
        );
        Ok(schedule)
    }

    /// Schedule a daily publish at `hour:minute` in the scheduler's timezone.
    ///
    /// With `use_day_counter` the outgoing caption gets a "Day {n}" prefix,
    /// counting up from `start_day` (defaults to 1).
    pub fn schedule_daily(
        &self,
        content_id: &str,
        platform: Platform,
        hour: u32,
        minute: u32,
        use_day_counter: bool,
        start_day: Option<i64>,
    ) -> Result<Schedule, IntakeError> {
        if hour > 23 || minute > 59 {
            return Err(IntakeError::InvalidTime { hour, minute });
        }
        self.require_content(content_id)?;

        let mut schedule = Schedule::daily(content_id, platform, hour, minute);
        if use_day_counter {
            schedule = schedule.with_day_counter(start_day.unwrap_or(1));
        }
        self.store.insert_schedule(&schedule)?;
        self.store
            .update_content_status(content_id, ContentStatus::Scheduled)?;

        info!(
            "Created daily schedule {} for content {} at {:02}:{:02}",
            schedule.id, content_id, hour, minute
        );
        Ok(schedule)
    }

    fn require_content(&self, content_id: &str) -> Result<(), IntakeError> {
        match self.store.get_content(content_id)? {
            Some(_) => Ok(()),
            None => Err(IntakeError::ContentNotFound(content_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::{Content, PostType, ScheduleStatus, SqliteContentStore};
    use chrono::TimeZone;

    fn setup() -> (Arc<SqliteContentStore>, ScheduleIntake) {
        let store = Arc::new(SqliteContentStore::in_memory().unwrap());
        let intake = ScheduleIntake::new(store.clone());
        (store, intake)
    }

    fn insert_content(store: &SqliteContentStore) -> Content {
        let content = Content::new(
            &["/media/photo.jpg"],
            "caption",
            PostType::Photo,
            Platform::Instagram,
        );
        store.insert_content(&content).unwrap();
        content
    }

    #[test]
    fn test_schedule_one_time_persists_and_marks_content() {
        let (store, intake) = setup();
        let content = insert_content(&store);
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let schedule = intake
            .schedule_one_time(&content.id, Platform::Instagram, at)
            .unwrap();

        let stored = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Pending);
        assert_eq!(stored.scheduled_time, Some(at));

        let stored_content = store.get_content(&content.id).unwrap().unwrap();
        assert_eq!(stored_content.status, ContentStatus::Scheduled);
    }

    #[test]
    fn test_schedule_one_time_rejects_missing_content() {
        let (_store, intake) = setup();
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let result = intake.schedule_one_time("nope", Platform::Instagram, at);
        assert!(matches!(result, Err(IntakeError::ContentNotFound(id)) if id == "nope"));
    }

    #[test]
    fn test_schedule_daily_with_day_counter() {
        let (store, intake) = setup();
        let content = insert_content(&store);

        let schedule = intake
            .schedule_daily(&content.id, Platform::Tiktok, 7, 30, true, Some(10))
            .unwrap();

        let stored = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Recurring);
        assert_eq!(stored.hour, Some(7));
        assert_eq!(stored.minute, Some(30));
        assert!(stored.use_day_counter);
        assert_eq!(stored.day_counter, 10);
    }

    #[test]
    fn test_schedule_daily_defaults_start_day_to_one() {
        let (store, intake) = setup();
        let content = insert_content(&store);

        let schedule = intake
            .schedule_daily(&content.id, Platform::Tiktok, 7, 30, true, None)
            .unwrap();

        let stored = store.get_schedule(&schedule.id).unwrap().unwrap();
        assert_eq!(stored.day_counter, 1);
    }

    #[test]
    fn test_schedule_daily_rejects_invalid_time() {
        let (store, intake) = setup();
        let content = insert_content(&store);

        let result = intake.schedule_daily(&content.id, Platform::Tiktok, 24, 0, false, None);
        assert!(matches!(
            result,
            Err(IntakeError::InvalidTime { hour: 24, minute: 0 })
        ));

        let result = intake.schedule_daily(&content.id, Platform::Tiktok, 12, 60, false, None);
        assert!(matches!(
            result,
            Err(IntakeError::InvalidTime {
                hour: 12,
                minute: 60
            })
        ));

        // Nothing was persisted.
        assert!(store.list_active_schedules().unwrap().is_empty());
    }
}
