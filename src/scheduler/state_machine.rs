//! Post-execution schedule transitions.
//!
//! Given a schedule and the outcome of one execution attempt, computes the
//! updated schedule row and the content status change that should be
//! committed together:
//!
//! * pending + success  -> completed, content published
//! * pending + failure  -> failed, content failed
//! * recurring + success -> stays recurring, last_run_at advances
//! * recurring + failure -> stays recurring, last_run_at unchanged so the
//!   next calendar day retries
//!
//! Failures record the reason and bump `retry_count`; successes clear any
//! previous error. The function is pure, committing is the caller's job.

use super::executor::ExecutionOutcome;
use crate::content_store::{ContentStatus, Schedule, ScheduleStatus};
use chrono::{DateTime, Utc};
use tracing::warn;

/// The committed result of one execution.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub schedule: Schedule,
    pub content_status: Option<ContentStatus>,
}

/// Apply `outcome` to `schedule` at time `now`.
pub fn apply_outcome(
    schedule: &Schedule,
    outcome: &ExecutionOutcome,
    now: DateTime<Utc>,
) -> StateTransition {
    let mut updated = schedule.clone();
    updated.updated_at = now;

    let content_status = match (schedule.status, outcome) {
        (ScheduleStatus::Pending, ExecutionOutcome::Success) => {
            updated.status = ScheduleStatus::Completed;
            updated.error_message = None;
            Some(ContentStatus::Published)
        }
        (ScheduleStatus::Pending, ExecutionOutcome::Failure { reason }) => {
            updated.status = ScheduleStatus::Failed;
            updated.error_message = Some(reason.clone());
            updated.retry_count += 1;
            Some(ContentStatus::Failed)
        }
        (ScheduleStatus::Recurring, ExecutionOutcome::Success) => {
            updated.last_run_at = Some(now);
            updated.error_message = None;
            if updated.use_day_counter {
                updated.day_counter += 1;
            }
            Some(ContentStatus::Published)
        }
        (ScheduleStatus::Recurring, ExecutionOutcome::Failure { reason }) => {
            updated.error_message = Some(reason.clone());
            updated.retry_count += 1;
            None
        }
        (ScheduleStatus::Completed | ScheduleStatus::Failed, _) => {
            // Terminal schedules are never handed to the executor.
            warn!(
                "Ignoring execution outcome for terminal schedule {} ({})",
                schedule.id,
                schedule.status.as_str()
            );
            return StateTransition {
                schedule: schedule.clone(),
                content_status: None,
            };
        }
    };

    StateTransition {
        schedule: updated,
        content_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::Platform;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn pending() -> Schedule {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();
        Schedule::one_time("content-1", Platform::Instagram, at)
    }

    fn recurring() -> Schedule {
        Schedule::daily("content-1", Platform::Instagram, 12, 0)
    }

    #[test]
    fn test_pending_success_completes_and_publishes() {
        let transition = apply_outcome(&pending(), &ExecutionOutcome::Success, now());

        assert_eq!(transition.schedule.status, ScheduleStatus::Completed);
        assert!(transition.schedule.error_message.is_none());
        assert_eq!(transition.schedule.retry_count, 0);
        assert_eq!(transition.content_status, Some(ContentStatus::Published));
        assert_eq!(transition.schedule.updated_at, now());
    }

    #[test]
    fn test_pending_failure_fails_schedule_and_content() {
        let outcome = ExecutionOutcome::failure("network down");
        let transition = apply_outcome(&pending(), &outcome, now());

        assert_eq!(transition.schedule.status, ScheduleStatus::Failed);
        assert_eq!(
            transition.schedule.error_message.as_deref(),
            Some("network down")
        );
        assert_eq!(transition.schedule.retry_count, 1);
        assert_eq!(transition.content_status, Some(ContentStatus::Failed));
    }

    #[test]
    fn test_pending_success_clears_previous_error() {
        let mut schedule = pending();
        schedule.error_message = Some("old failure".to_string());
        schedule.retry_count = 2;

        let transition = apply_outcome(&schedule, &ExecutionOutcome::Success, now());

        assert!(transition.schedule.error_message.is_none());
        // retry_count is a history counter, success does not reset it.
        assert_eq!(transition.schedule.retry_count, 2);
    }

    #[test]
    fn test_recurring_success_advances_last_run() {
        let transition = apply_outcome(&recurring(), &ExecutionOutcome::Success, now());

        assert_eq!(transition.schedule.status, ScheduleStatus::Recurring);
        assert_eq!(transition.schedule.last_run_at, Some(now()));
        assert!(transition.schedule.error_message.is_none());
        assert_eq!(transition.content_status, Some(ContentStatus::Published));
    }

    #[test]
    fn test_recurring_success_increments_day_counter_when_enabled() {
        let schedule = recurring().with_day_counter(5);
        let transition = apply_outcome(&schedule, &ExecutionOutcome::Success, now());
        assert_eq!(transition.schedule.day_counter, 6);

        let plain = recurring();
        let transition = apply_outcome(&plain, &ExecutionOutcome::Success, now());
        assert_eq!(transition.schedule.day_counter, plain.day_counter);
    }

    #[test]
    fn test_recurring_failure_keeps_schedule_alive() {
        let schedule = recurring().with_day_counter(5);
        let outcome = ExecutionOutcome::failure("upload rejected");
        let transition = apply_outcome(&schedule, &outcome, now());

        assert_eq!(transition.schedule.status, ScheduleStatus::Recurring);
        assert_eq!(
            transition.schedule.error_message.as_deref(),
            Some("upload rejected")
        );
        assert_eq!(transition.schedule.retry_count, 1);
        // last_run_at stays put so the next day is retried.
        assert!(transition.schedule.last_run_at.is_none());
        // A failed attempt does not consume a day.
        assert_eq!(transition.schedule.day_counter, 5);
        assert!(transition.content_status.is_none());
    }

    #[test]
    fn test_repeated_failures_accumulate_retry_count() {
        let outcome = ExecutionOutcome::failure("still broken");
        let first = apply_outcome(&recurring(), &outcome, now());
        let second = apply_outcome(&first.schedule, &outcome, now());

        assert_eq!(second.schedule.retry_count, 2);
    }

    #[test]
    fn test_terminal_schedule_is_left_untouched() {
        let mut schedule = pending();
        schedule.status = ScheduleStatus::Completed;

        let transition = apply_outcome(&schedule, &ExecutionOutcome::Success, now());

        assert_eq!(transition.schedule.status, ScheduleStatus::Completed);
        assert_eq!(transition.schedule.updated_at, schedule.updated_at);
        assert!(transition.content_status.is_none());
    }
}
