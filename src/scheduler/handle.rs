use crate::content_store::{ContentStore, Schedule, StoreStats};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Information about a schedule for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub id: String,
    pub content_id: String,
    pub platform: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    pub use_day_counter: bool,
    pub day_counter: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: i64,
}

impl From<Schedule> for ScheduleInfo {
    fn from(schedule: Schedule) -> Self {
        let time_of_day = match (schedule.hour, schedule.minute) {
            (Some(hour), Some(minute)) => Some(format!("{:02}:{:02}", hour, minute)),
            _ => None,
        };
        ScheduleInfo {
            id: schedule.id,
            content_id: schedule.content_id,
            platform: schedule.platform.as_str().to_string(),
            status: schedule.status.as_str().to_string(),
            scheduled_time: schedule.scheduled_time.map(|dt| dt.to_rfc3339()),
            time_of_day,
            use_day_counter: schedule.use_day_counter,
            day_counter: schedule.day_counter,
            last_run_at: schedule.last_run_at.map(|dt| dt.to_rfc3339()),
            error_message: schedule.error_message,
            retry_count: schedule.retry_count,
        }
    }
}

/// Errors from triggering a schedule by hand.
#[derive(Debug)]
pub enum TriggerError {
    NotFound,
    NotActive(String),
    Store(String),
    SchedulerUnavailable,
}

impl std::fmt::Display for TriggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerError::NotFound => write!(f, "Schedule not found"),
            TriggerError::NotActive(status) => {
                write!(f, "Schedule is {} and can no longer run", status)
            }
            TriggerError::Store(msg) => write!(f, "Store error: {}", msg),
            TriggerError::SchedulerUnavailable => write!(f, "Scheduler is not available"),
        }
    }
}

impl std::error::Error for TriggerError {}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    TriggerSchedule {
        schedule_id: String,
        response: oneshot::Sender<Result<(), TriggerError>>,
    },
}

/// Handle to interact with the running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Channel to send commands to the scheduler
    command_tx: mpsc::Sender<SchedulerCommand>,
    /// Store for read-only schedule queries
    store: Arc<dyn ContentStore>,
}

impl SchedulerHandle {
    pub fn new(command_tx: mpsc::Sender<SchedulerCommand>, store: Arc<dyn ContentStore>) -> Self {
        Self { command_tx, store }
    }

    /// Run a schedule now, regardless of its due time.
    pub async fn trigger_schedule(&self, schedule_id: &str) -> Result<(), TriggerError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerSchedule {
                schedule_id: schedule_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| TriggerError::SchedulerUnavailable)?;

        response_rx
            .await
            .map_err(|_| TriggerError::SchedulerUnavailable)?
    }

    /// Get information about all schedules still waiting to run.
    pub fn list_active_schedules(&self) -> Result<Vec<ScheduleInfo>> {
        let schedules = self.store.list_active_schedules()?;
        Ok(schedules.into_iter().map(ScheduleInfo::from).collect())
    }

    /// Get information about a specific schedule.
    pub fn get_schedule(&self, schedule_id: &str) -> Result<Option<ScheduleInfo>> {
        let schedule = self.store.get_schedule(schedule_id)?;
        Ok(schedule.map(ScheduleInfo::from))
    }

    /// Aggregate store counters.
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }
}
