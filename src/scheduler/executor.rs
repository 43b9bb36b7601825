//! Executes a single due schedule against the upload dispatcher.
//!
//! The executor is deliberately side-effect free with respect to the store:
//! it loads the content, prepares the outgoing copy and reports an outcome.
//! Persisting the consequences of that outcome is the state machine's job.

use crate::content_store::{Content, ContentStore, Schedule, ScheduleStatus};
use crate::dispatch::UploadDispatcher;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    Failure { reason: String },
}

impl ExecutionOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        ExecutionOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success)
    }
}

/// Runs one publish attempt for a schedule.
pub struct JobExecutor {
    store: Arc<dyn ContentStore>,
    dispatcher: Arc<dyn UploadDispatcher>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn ContentStore>, dispatcher: Arc<dyn UploadDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Execute `schedule` once and report the outcome.
    ///
    /// Never touches the store beyond reading the content row and never
    /// returns an error: every failure mode becomes a `Failure` outcome so
    /// the caller can run it through the state machine.
    pub async fn execute(&self, schedule: &Schedule) -> ExecutionOutcome {
        let content = match self.store.get_content(&schedule.content_id) {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!(
                    "Schedule {} references missing content {}",
                    schedule.id, schedule.content_id
                );
                return ExecutionOutcome::failure("content not found");
            }
            Err(e) => {
                error!(
                    "Failed to load content {} for schedule {}: {}",
                    schedule.content_id, schedule.id, e
                );
                return ExecutionOutcome::failure(format!("failed to load content: {}", e));
            }
        };

        let outgoing = prepare_outgoing(schedule, content);

        match self.dispatcher.publish(&outgoing, schedule.platform).await {
            Ok(()) => {
                info!(
                    "Published content {} for schedule {} on {}",
                    outgoing.id,
                    schedule.id,
                    schedule.platform.as_str()
                );
                ExecutionOutcome::Success
            }
            Err(e) => {
                error!(
                    "Publish of content {} for schedule {} failed: {}",
                    outgoing.id, schedule.id, e
                );
                ExecutionOutcome::failure(e.to_string())
            }
        }
    }
}

/// Build the copy of the content that goes out on the wire.
///
/// Daily schedules with the day counter enabled get a transient
/// "Day {n} {caption}" caption. The stored caption is never modified.
fn prepare_outgoing(schedule: &Schedule, content: Content) -> Content {
    if schedule.status == ScheduleStatus::Recurring && schedule.use_day_counter {
        let caption = format!("Day {} {}", schedule.day_counter, content.caption);
        content.with_caption(caption)
    } else {
        content
    }
}
