//! Periodic and hook-triggered background work.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobRun, JobRunStatus, JobScheduler, SchedulerHandle};
