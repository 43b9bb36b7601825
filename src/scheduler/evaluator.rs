//! Decides which schedules are due at a given instant.
//!
//! One-shot schedules are due once their target time has passed and stay due
//! until they are executed. Daily schedules are due during the exact minute
//! they are configured for, at most once per calendar day in the configured
//! timezone. A minute that passes without an evaluation is simply skipped,
//! there is no catch-up for missed days.

use crate::content_store::{Schedule, ScheduleStatus};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Evaluates schedule dueness against a timezone.
pub struct DueEvaluator {
    timezone: Tz,
}

impl DueEvaluator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Whether `schedule` should fire at `now`.
    pub fn is_due(&self, schedule: &Schedule, now: DateTime<Utc>) -> bool {
        match schedule.status {
            ScheduleStatus::Pending => self.one_time_due(schedule, now),
            ScheduleStatus::Recurring => self.daily_due(schedule, now),
            ScheduleStatus::Completed | ScheduleStatus::Failed => false,
        }
    }

    fn one_time_due(&self, schedule: &Schedule, now: DateTime<Utc>) -> bool {
        match schedule.scheduled_time {
            Some(at) => now >= at,
            None => {
                warn!("Pending schedule {} has no scheduled_time", schedule.id);
                false
            }
        }
    }

    fn daily_due(&self, schedule: &Schedule, now: DateTime<Utc>) -> bool {
        let (Some(hour), Some(minute)) = (schedule.hour, schedule.minute) else {
            warn!("Recurring schedule {} has no time of day", schedule.id);
            return false;
        };

        let local_now = now.with_timezone(&self.timezone);
        if local_now.hour() != hour || local_now.minute() != minute {
            return false;
        }

        // At most one run per local calendar day.
        match schedule.last_run_at {
            None => true,
            Some(last_run) => {
                let last_run_day = last_run.with_timezone(&self.timezone).date_naive();
                last_run_day < local_now.date_naive()
            }
        }
    }
}
