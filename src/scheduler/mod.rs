//! Content publication scheduling.
//!
//! This module provides the loop that turns stored schedules into publish
//! calls: a due-time evaluator, a per-schedule executor, the post-execution
//! state machine and the runner that wires them together on a fixed interval.

mod clock;
mod evaluator;
mod executor;
mod handle;
mod intake;
mod runner;
mod state_machine;

pub use clock::{Clock, SystemClock};
pub use evaluator::DueEvaluator;
pub use executor::{ExecutionOutcome, JobExecutor};
pub use handle::{ScheduleInfo, SchedulerCommand, SchedulerHandle, TriggerError};
pub use intake::{IntakeError, ScheduleIntake};
pub use runner::{create_scheduler, PublishScheduler};
pub use state_machine::{apply_outcome, StateTransition};
