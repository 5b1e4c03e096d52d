use super::context::JobContext;
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const HOOK_QUEUE_SIZE: usize = 100;
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const MIN_TICK: Duration = Duration::from_millis(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl JobRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobRunStatus::Completed => "completed",
            JobRunStatus::Failed => "failed",
            JobRunStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of a job's latest execution.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

struct SharedJobState {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    running_jobs: HashSet<String>,
    last_runs: HashMap<String, JobRun>,
}

/// Cloneable access to the scheduler for the HTTP layer.
#[derive(Clone)]
pub struct SchedulerHandle {
    hook_sender: mpsc::Sender<HookEvent>,
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    /// Fires a hook without waiting. Dropped if the scheduler is backed up.
    pub fn notify(&self, event: HookEvent) {
        match self.hook_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Hook queue full, dropping {}", event),
            Err(TrySendError::Closed(_)) => debug!("Scheduler stopped, dropping {}", event),
        }
    }

    pub async fn is_job_running(&self, job_id: &str) -> bool {
        self.shared_state.read().await.running_jobs.contains(job_id)
    }

    pub async fn last_run(&self, job_id: &str) -> Option<JobRun> {
        self.shared_state.read().await.last_runs.get(job_id).cloned()
    }

    pub async fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared_state.read().await.jobs.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Runs registered jobs on their interval and in response to hooks.
pub struct JobScheduler {
    shared_state: Arc<RwLock<SharedJobState>>,
    running_handles: HashMap<String, JoinHandle<()>>,
    job_cancel_tokens: HashMap<String, CancellationToken>,
    next_runs: HashMap<String, Instant>,
    hook_receiver: mpsc::Receiver<HookEvent>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
}

pub fn create_scheduler(
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let (hook_sender, hook_receiver) = mpsc::channel(HOOK_QUEUE_SIZE);
    let shared_state = Arc::new(RwLock::new(SharedJobState {
        jobs: HashMap::new(),
        running_jobs: HashSet::new(),
        last_runs: HashMap::new(),
    }));
    let scheduler = JobScheduler {
        shared_state: shared_state.clone(),
        running_handles: HashMap::new(),
        job_cancel_tokens: HashMap::new(),
        next_runs: HashMap::new(),
        hook_receiver,
        shutdown_token,
        job_context,
    };
    (
        scheduler,
        SchedulerHandle {
            hook_sender,
            shared_state,
        },
    )
}

impl JobScheduler {
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        if let Some(interval) = job.schedule().interval() {
            // Interval-only jobs run right away; combined ones get their
            // first run from the startup hook.
            let first_run = if job.schedule().listens_to(HookEvent::OnStartup) {
                Instant::now() + interval
            } else {
                Instant::now()
            };
            self.next_runs.insert(job_id.clone(), first_run);
        }
        self.shared_state.write().await.jobs.insert(job_id, job);
    }

    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count().await
        );

        self.trigger_jobs_for_hook(HookEvent::OnStartup).await;

        loop {
            self.cleanup_completed_jobs();

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!("Scheduler sleeping for {:?}", sleep_duration);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(event) = self.hook_receiver.recv() => {
                    debug!("Received hook event: {}", event);
                    self.trigger_jobs_for_hook(event).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    /// A job still running when due is picked up on a later tick.
    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.next_runs
            .values()
            .map(|next| next.saturating_duration_since(now))
            .min()
            .unwrap_or(IDLE_CHECK_INTERVAL)
            .clamp(MIN_TICK, IDLE_CHECK_INTERVAL)
    }

    async fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = {
            let state = self.shared_state.read().await;
            self.next_runs
                .iter()
                .filter(|(job_id, next)| **next <= now && !state.running_jobs.contains(*job_id))
                .map(|(job_id, _)| job_id.clone())
                .collect()
        };
        for job_id in due {
            self.spawn_job(&job_id, "schedule").await;
        }
    }

    async fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let to_trigger: Vec<String> = {
            let state = self.shared_state.read().await;
            state
                .jobs
                .iter()
                .filter(|(job_id, job)| {
                    if !job.schedule().listens_to(event) {
                        return false;
                    }
                    if state.running_jobs.contains(*job_id) {
                        debug!("Skipping hook trigger for already running job: {}", job_id);
                        return false;
                    }
                    true
                })
                .map(|(job_id, _)| job_id.clone())
                .collect()
        };
        for job_id in to_trigger {
            self.spawn_job(&job_id, &format!("hook:{}", event)).await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = {
            let mut state = self.shared_state.write().await;
            let Some(job) = state.jobs.get(job_id).cloned() else {
                error!("Attempted to spawn unknown job: {}", job_id);
                return;
            };
            state.running_jobs.insert(job_id.to_string());
            job
        };

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        if let Some(interval) = job.schedule().interval() {
            self.next_runs
                .insert(job_id.to_string(), Instant::now() + interval);
        }

        let ctx = self.job_context.child();
        self.job_cancel_tokens
            .insert(job_id.to_string(), ctx.cancellation_token.clone());

        let shared_state = self.shared_state.clone();
        let job_id_owned = job_id.to_string();
        let triggered_by = triggered_by.to_string();

        let handle = tokio::spawn(async move {
            let started_at = Utc::now();
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, error_message) = match result {
                Ok(Ok(())) => {
                    info!("Job {} completed in {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Completed, None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Cancelled, Some("Cancelled".to_string()))
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, Some(format!("Task panic: {}", e)))
                }
            };
            metrics::record_background_job(&job_id_owned, status.as_str());

            let mut state = shared_state.write().await;
            state.running_jobs.remove(&job_id_owned);
            state.last_runs.insert(
                job_id_owned.clone(),
                JobRun {
                    job_id: job_id_owned,
                    started_at,
                    finished_at: Utc::now(),
                    status,
                    error_message,
                    triggered_by,
                },
            );
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();
        for job_id in completed {
            self.running_handles.remove(&job_id);
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        {
            let state = self.shared_state.read().await;
            for job_id in &state.running_jobs {
                let cancellable = state
                    .jobs
                    .get(job_id)
                    .map(|job| job.shutdown_behavior() == ShutdownBehavior::Cancellable)
                    .unwrap_or(true);
                if cancellable {
                    if let Some(token) = self.job_cancel_tokens.get(job_id) {
                        debug!("Cancelling job: {}", job_id);
                        token.cancel();
                    }
                }
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Job {} did not finish within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }
        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::JobSchedule;
    use crate::catalog::{MediaStores, SqliteMediaStore};
    use crate::charts::{ChartBuilder, SqliteChartStore};
    use crate::config::ChartSettings;
    use crate::realtime::ConnectionManager;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct TestJob {
        id: &'static str,
        schedule: JobSchedule,
        execution_count: Arc<AtomicUsize>,
        should_fail: Arc<AtomicBool>,
    }

    impl TestJob {
        fn new(id: &'static str, schedule: JobSchedule) -> (Arc<Self>, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    id,
                    schedule,
                    execution_count: count.clone(),
                    should_fail: Arc::new(AtomicBool::new(false)),
                }),
                count,
            )
        }
    }

    impl BackgroundJob for TestJob {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            "Test Job"
        }

        fn description(&self) -> &'static str {
            "A test job for unit tests"
        }

        fn schedule(&self) -> JobSchedule {
            self.schedule.clone()
        }

        fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.execution_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail.load(Ordering::SeqCst) {
                Err(JobError::ExecutionFailed("Test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn create_test_scheduler() -> (JobScheduler, SchedulerHandle, CancellationToken, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let media = Arc::new(SqliteMediaStore::new(temp_dir.path().join("media.db")).unwrap());
        let charts = Arc::new(SqliteChartStore::new(temp_dir.path().join("charts.db")).unwrap());
        let builder = Arc::new(ChartBuilder::new(
            MediaStores::new(media),
            charts,
            Arc::new(ConnectionManager::new()),
            ChartSettings::default(),
        ));
        let shutdown_token = CancellationToken::new();
        let job_context = JobContext::new(
            shutdown_token.child_token(),
            tokio::runtime::Handle::current(),
            builder,
        );
        let (scheduler, handle) = create_scheduler(shutdown_token.clone(), job_context);
        (scheduler, handle, shutdown_token, temp_dir)
    }

    #[tokio::test]
    async fn test_register_job() {
        let (mut scheduler, handle, _token, _dir) = create_test_scheduler();
        let (job, _) = TestJob::new("test_job", JobSchedule::Hook(HookEvent::OnStartup));
        scheduler.register_job(job).await;

        assert_eq!(scheduler.job_count().await, 1);
        assert_eq!(handle.job_ids().await, vec!["test_job".to_string()]);
        assert!(!handle.is_job_running("test_job").await);
    }

    #[tokio::test]
    async fn test_job_execution_on_startup_hook() {
        let (mut scheduler, handle, token, _dir) = create_test_scheduler();
        let (job, count) = TestJob::new("startup_job", JobSchedule::Hook(HookEvent::OnStartup));
        scheduler.register_job(job).await;

        let sched = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        let run = handle.last_run("startup_job").await.unwrap();
        assert_eq!(run.status, JobRunStatus::Completed);
        assert_eq!(run.triggered_by, "hook:OnStartup");

        token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched).await;
    }

    #[tokio::test]
    async fn test_hook_triggered_job_execution() {
        let (mut scheduler, handle, token, _dir) = create_test_scheduler();
        let (job, count) =
            TestJob::new("catalog_job", JobSchedule::Hook(HookEvent::OnCatalogChange));
        scheduler.register_job(job).await;

        let sched = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        handle.notify(HookEvent::OnCatalogChange);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            handle.last_run("catalog_job").await.unwrap().triggered_by,
            "hook:OnCatalogChange"
        );

        token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched).await;
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let (mut scheduler, handle, token, _dir) = create_test_scheduler();
        let (job, count) = TestJob::new("failing_job", JobSchedule::Hook(HookEvent::OnStartup));
        job.should_fail.store(true, Ordering::SeqCst);
        scheduler.register_job(job).await;

        let sched = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(count.load(Ordering::SeqCst) >= 1);
        let run = handle.last_run("failing_job").await.unwrap();
        assert_eq!(run.status, JobRunStatus::Failed);
        assert!(run.error_message.unwrap().contains("Test failure"));

        token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched).await;
    }

    #[tokio::test]
    async fn test_interval_job_repeats() {
        let (mut scheduler, _handle, token, _dir) = create_test_scheduler();
        let (job, count) = TestJob::new(
            "interval_job",
            JobSchedule::Interval(Duration::from_millis(50)),
        );
        scheduler.register_job(job).await;

        let sched = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(400)).await;
        token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched).await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
