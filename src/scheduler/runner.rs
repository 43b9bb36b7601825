//! The scheduler loop.
//!
//! Wakes up on a fixed interval, asks the evaluator which schedules are due,
//! runs them one at a time through the executor and commits the resulting
//! transition. Also serves manual trigger commands sent through the
//! [`SchedulerHandle`]. A failure in one schedule never affects another and
//! never stops the loop.

use super::clock::Clock;
use super::evaluator::DueEvaluator;
use super::executor::{ExecutionOutcome, JobExecutor};
use super::handle::{SchedulerCommand, SchedulerHandle, TriggerError};
use super::state_machine;
use crate::content_store::{ContentStore, Schedule, ScheduleStatus};
use crate::dispatch::UploadDispatcher;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives due-schedule evaluation and execution.
pub struct PublishScheduler {
    store: Arc<dyn ContentStore>,
    executor: JobExecutor,
    evaluator: DueEvaluator,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
    command_receiver: mpsc::Receiver<SchedulerCommand>,
    shutdown_token: CancellationToken,
}

impl PublishScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ContentStore>,
        dispatcher: Arc<dyn UploadDispatcher>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        check_interval: Duration,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
    ) -> Self {
        let executor = JobExecutor::new(store.clone(), dispatcher);
        Self {
            store,
            executor,
            evaluator: DueEvaluator::new(timezone),
            clock,
            check_interval,
            command_receiver,
            shutdown_token,
        }
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        self.startup_report();

        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            tokio::select! {
                // The first tick completes immediately, so overdue schedules
                // are picked up right at startup.
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        info!("Publish scheduler stopped");
    }

    /// Log what is waiting when the loop comes up.
    fn startup_report(&self) {
        match self.store.list_active_schedules() {
            Ok(schedules) => {
                let now = self.clock.now_utc();
                let overdue = schedules
                    .iter()
                    .filter(|s| {
                        s.status == ScheduleStatus::Pending
                            && s.scheduled_time.map(|at| at <= now).unwrap_or(false)
                    })
                    .count();
                info!(
                    "Starting publish scheduler with {} active schedule(s), {} overdue",
                    schedules.len(),
                    overdue
                );
            }
            Err(e) => {
                error!("Failed to read schedules at startup: {}", e);
            }
        }
    }

    /// One evaluation pass over all active schedules.
    async fn run_cycle(&self) {
        let now = self.clock.now_utc();
        let schedules = match self.store.list_active_schedules() {
            Ok(schedules) => schedules,
            Err(e) => {
                error!("Failed to list active schedules: {}", e);
                return;
            }
        };

        let due: Vec<Schedule> = schedules
            .into_iter()
            .filter(|schedule| self.evaluator.is_due(schedule, now))
            .collect();

        if due.is_empty() {
            debug!("No schedules due at {}", now);
            return;
        }

        info!("{} schedule(s) due at {}", due.len(), now);
        for schedule in &due {
            if self.shutdown_token.is_cancelled() {
                break;
            }
            self.process_schedule(schedule).await;
        }
    }

    /// Execute one schedule and commit the resulting transition.
    async fn process_schedule(&self, schedule: &Schedule) {
        info!(
            "Executing schedule {} ({} on {})",
            schedule.id,
            schedule.status.as_str(),
            schedule.platform.as_str()
        );

        let outcome = self.executor.execute(schedule).await;
        let transition = state_machine::apply_outcome(schedule, &outcome, self.clock.now_utc());

        if let Err(e) = self
            .store
            .commit_execution(&transition.schedule, transition.content_status)
        {
            error!(
                "Failed to commit execution of schedule {}: {}",
                schedule.id, e
            );
        }

        match &outcome {
            ExecutionOutcome::Success => {
                info!("Schedule {} executed successfully", schedule.id);
            }
            ExecutionOutcome::Failure { reason } => {
                warn!("Schedule {} failed: {}", schedule.id, reason);
            }
        }
    }

    /// Handle a command from the SchedulerHandle.
    async fn handle_command(&self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerSchedule {
                schedule_id,
                response,
            } => {
                let result = self.trigger_schedule(&schedule_id).await;
                let _ = response.send(result);
            }
        }
    }

    /// Run a schedule immediately, ignoring its due time.
    async fn trigger_schedule(&self, schedule_id: &str) -> Result<(), TriggerError> {
        let schedule = match self.store.get_schedule(schedule_id) {
            Ok(Some(schedule)) => schedule,
            Ok(None) => return Err(TriggerError::NotFound),
            Err(e) => {
                error!("Failed to load schedule {}: {}", schedule_id, e);
                return Err(TriggerError::Store(e.to_string()));
            }
        };

        if !schedule.is_active() {
            return Err(TriggerError::NotActive(
                schedule.status.as_str().to_string(),
            ));
        }

        info!("Manually triggering schedule {}", schedule_id);
        self.process_schedule(&schedule).await;
        Ok(())
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    store: Arc<dyn ContentStore>,
    dispatcher: Arc<dyn UploadDispatcher>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    check_interval: Duration,
    shutdown_token: CancellationToken,
) -> (PublishScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);

    let scheduler = PublishScheduler::new(
        store.clone(),
        dispatcher,
        clock,
        timezone,
        check_interval,
        command_rx,
        shutdown_token,
    );

    let handle = SchedulerHandle::new(command_tx, store);

    (scheduler, handle)
}
