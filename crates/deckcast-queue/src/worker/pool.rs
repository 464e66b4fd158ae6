//! Worker pool for job execution
//!
//! A pool owns one claim loop and one reap loop. The claim loop asks the
//! store for as many jobs as it has free slots, spawns the registered
//! handler for each under the job's wall-clock budget, and sleeps with a
//! doubling idle delay while the queue is empty. Any number of pools may
//! run against the same store; the store's claim exclusivity is the only
//! coordination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::store::{millis, ClaimedJob, JobStore, StoreError};

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Unique worker ID (generated if not provided)
    pub worker_id: String,

    /// Job types this worker handles
    pub job_types: Vec<String>,

    /// Maximum concurrent job executions
    pub max_concurrency: usize,

    /// Upper bound on jobs claimed in one store round-trip
    pub claim_batch: usize,

    /// Delay between claim rounds while the queue has work
    #[serde(with = "millis")]
    pub poll_floor: Duration,

    /// Idle delay ceiling; empty rounds double the delay up to this
    #[serde(with = "millis")]
    pub poll_ceiling: Duration,

    /// How often to scan for timed-out attempts
    #[serde(with = "millis")]
    pub reap_interval: Duration,

    /// Graceful shutdown timeout
    #[serde(with = "millis")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::now_v7()),
            job_types: vec![],
            max_concurrency: 4,
            claim_batch: 10,
            poll_floor: Duration::from_millis(100),
            poll_ceiling: Duration::from_secs(5),
            reap_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration
    pub fn new(job_types: Vec<String>) -> Self {
        Self {
            job_types,
            ..Default::default()
        }
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_claim_batch(mut self, batch: usize) -> Self {
        self.claim_batch = batch.max(1);
        self
    }

    /// Set the poll delay range: `floor` between busy rounds, growing to
    /// `ceiling` while idle.
    pub fn with_poll_intervals(mut self, floor: Duration, ceiling: Duration) -> Self {
        self.poll_floor = floor;
        self.poll_ceiling = ceiling.max(floor);
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Doubling idle delay for the claim loop.
///
/// Starts at the floor, doubles after every empty round, and snaps back
/// to the floor as soon as a round claims anything.
struct IdleBackoff {
    floor: Duration,
    ceiling: Duration,
    delay: Duration,
}

impl IdleBackoff {
    fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
            delay: floor,
        }
    }

    /// Record an empty round; returns the delay to sleep before the next.
    fn idle(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(self.ceiling);
        current
    }

    /// Record a round that found work; the next sleep is the floor.
    fn busy(&mut self) -> Duration {
        self.delay = self.floor;
        self.floor
    }
}

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Pool is running and claiming jobs
    Running,
    /// Pool is draining (completing current jobs, not claiming new ones)
    Draining,
    /// Pool has stopped
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Pool already running
    #[error("worker pool is already running")]
    AlreadyRunning,

    /// Shutdown timeout
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,
}

/// Job execution result: output payload, or an error message that feeds
/// the retry policy
pub type JobResult = Result<serde_json::Value, String>;

/// Job handler function type
pub type JobHandler = Arc<dyn Fn(ClaimedJob) -> BoxFuture<'static, JobResult> + Send + Sync>;

/// Worker pool for executing jobs
///
/// # Example
///
/// ```ignore
/// use deckcast_queue::{WorkerPool, WorkerPoolConfig};
///
/// let config = WorkerPoolConfig::new(vec!["generate_podcast".to_string()]);
/// let pool = WorkerPool::new(store, config);
///
/// pool.register_handler("generate_podcast", |job| async move {
///     // run the job
///     Ok(serde_json::json!({"audio_file": "episode.mp3"}))
/// });
///
/// pool.start().await?;
/// // ... later
/// pool.shutdown().await?;
/// ```
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    config: WorkerPoolConfig,
    handlers: std::sync::RwLock<HashMap<String, JobHandler>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    status: std::sync::RwLock<WorkerPoolStatus>,
    active_jobs: Arc<Semaphore>,
    claim_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    reap_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(store: Arc<dyn JobStore>, config: WorkerPoolConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            store,
            config: config.clone(),
            handlers: std::sync::RwLock::new(HashMap::new()),
            shutdown_tx,
            shutdown_rx,
            status: std::sync::RwLock::new(WorkerPoolStatus::Stopped),
            active_jobs: Arc::new(Semaphore::new(config.max_concurrency)),
            claim_handle: std::sync::Mutex::new(None),
            reap_handle: std::sync::Mutex::new(None),
        }
    }

    /// Register a job handler for a job type.
    ///
    /// The claim loop snapshots the handler map when `start` runs, so
    /// every handler must be registered before starting; a registration
    /// after that is not seen until the pool is restarted.
    pub fn register_handler<F, Fut>(&self, job_type: &str, handler: F)
    where
        F: Fn(ClaimedJob) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = JobResult> + Send + 'static,
    {
        let handler: JobHandler = Arc::new(move |job| Box::pin(handler(job)));
        self.handlers
            .write()
            .unwrap()
            .insert(job_type.to_string(), handler);
    }

    /// Start the worker pool
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn start(&self) -> Result<(), WorkerPoolError> {
        {
            let status = *self.status.read().unwrap();
            if status == WorkerPoolStatus::Running {
                return Err(WorkerPoolError::AlreadyRunning);
            }
        }

        info!(
            worker_id = %self.config.worker_id,
            job_types = ?self.config.job_types,
            max_concurrency = self.config.max_concurrency,
            "Starting worker pool"
        );

        *self.status.write().unwrap() = WorkerPoolStatus::Running;

        self.start_claim_loop();
        self.start_reap_loop();

        Ok(())
    }

    /// Shutdown the worker pool gracefully
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn shutdown(&self) -> Result<(), WorkerPoolError> {
        {
            let status = *self.status.read().unwrap();
            if status == WorkerPoolStatus::Stopped {
                return Ok(());
            }
        }

        info!(worker_id = %self.config.worker_id, "Initiating graceful shutdown");

        *self.status.write().unwrap() = WorkerPoolStatus::Draining;
        let _ = self.shutdown_tx.send(true);

        // Wait for in-flight jobs to finish, up to the drain budget
        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;

        loop {
            let available = self.active_jobs.available_permits();
            if available == self.config.max_concurrency {
                debug!("All jobs completed");
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining_jobs = self.config.max_concurrency - available,
                    "Shutdown timeout reached"
                );
                return Err(WorkerPoolError::ShutdownTimeout);
            }

            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        *self.status.write().unwrap() = WorkerPoolStatus::Stopped;

        info!(worker_id = %self.config.worker_id, "Worker pool stopped");
        Ok(())
    }

    /// Get current status
    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read().unwrap()
    }

    /// Get the worker ID
    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Number of jobs currently executing
    pub fn current_load(&self) -> usize {
        self.config.max_concurrency - self.active_jobs.available_permits()
    }

    fn start_claim_loop(&self) {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let handlers = self.handlers.read().unwrap().clone();
        let active_jobs = Arc::clone(&self.active_jobs);
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            let mut backoff = IdleBackoff::new(config.poll_floor, config.poll_ceiling);

            loop {
                if *shutdown_rx.borrow() {
                    debug!("Claim loop: shutdown requested");
                    break;
                }

                let slots = active_jobs.available_permits();
                let delay = if slots == 0 {
                    // Saturated; check again at the floor cadence without
                    // touching the store
                    backoff.busy()
                } else {
                    let batch = slots.min(config.claim_batch);
                    match store.claim(&config.worker_id, &config.job_types, batch).await {
                        Ok(jobs) if jobs.is_empty() => backoff.idle(),
                        Ok(jobs) => {
                            debug!(count = jobs.len(), "Claimed jobs");
                            for job in jobs {
                                run_job(&store, &handlers, &active_jobs, job).await;
                            }
                            backoff.busy()
                        }
                        Err(e) => {
                            error!("Claim failed: {}", e);
                            backoff.idle()
                        }
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => {
                        debug!("Claim loop: shutdown requested during wait");
                        break;
                    }
                }
            }

            debug!("Claim loop exited");
        });

        *self.claim_handle.lock().unwrap() = Some(handle);
    }

    fn start_reap_loop(&self) {
        let store = Arc::clone(&self.store);
        let interval = self.config.reap_interval;
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match store.reap_timed_out().await {
                            Ok(reaped) => {
                                if !reaped.is_empty() {
                                    info!(count = reaped.len(), "Reaped timed-out job attempts");
                                }
                            }
                            Err(e) => {
                                error!("Timeout reaping failed: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Reap loop: shutdown requested");
                        break;
                    }
                }
            }

            debug!("Reap loop exited");
        });

        *self.reap_handle.lock().unwrap() = Some(handle);
    }
}

/// Dispatch one claimed job onto its handler task.
async fn run_job(
    store: &Arc<dyn JobStore>,
    handlers: &HashMap<String, JobHandler>,
    active_jobs: &Arc<Semaphore>,
    job: ClaimedJob,
) {
    let handler = match handlers.get(&job.job_type) {
        Some(h) => Arc::clone(h),
        None => {
            warn!(job_type = %job.job_type, "No handler registered");
            if let Err(e) = store.fail(job.id, "no handler registered for job type").await {
                error!(job_id = %job.id, "Failed to fail job: {}", e);
            }
            return;
        }
    };

    let permit = match Arc::clone(active_jobs).try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            // The slot count was checked before claiming; losing the race
            // here still only delays the job until it is reaped or
            // re-claimed
            warn!(job_id = %job.id, "No execution slot for claimed job");
            return;
        }
    };

    let store = Arc::clone(store);
    tokio::spawn(async move {
        let job_id = job.id;
        let budget = job.timeout;

        // The local timeout catches slow attempts promptly; the reap
        // loop catches attempts orphaned by a crashed worker
        let outcome = match tokio::time::timeout(budget, handler(job)).await {
            Ok(result) => result,
            Err(_) => Err(format!("attempt exceeded {budget:?} execution timeout")),
        };

        match outcome {
            Ok(output) => {
                if let Err(e) = store.complete(job_id, output).await {
                    error!(%job_id, "Failed to complete job: {}", e);
                }
            }
            Err(message) => {
                // Internal detail stays in the log; callers only ever
                // see the terminal failed state
                warn!(%job_id, error = %message, "Job attempt failed");
                if let Err(e) = store.fail(job_id, &message).await {
                    error!(%job_id, "Failed to fail job: {}", e);
                }
            }
        }

        drop(permit);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryJobStore;
    use crate::retry::RetryPolicy;
    use crate::store::{JobOptions, JobState, NewJob};

    fn fast_config() -> WorkerPoolConfig {
        WorkerPoolConfig::new(vec!["generate_podcast".to_string()])
            .with_worker_id("test-worker")
            .with_poll_intervals(Duration::from_millis(10), Duration::from_millis(20))
            .with_reap_interval(Duration::from_millis(25))
    }

    async fn wait_for_state(
        store: &InMemoryJobStore,
        job_id: Uuid,
        expected: JobState,
    ) -> crate::store::JobSnapshot {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = store.fetch(job_id).await.unwrap();
            if snapshot.state == expected {
                return snapshot;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {job_id} stuck in {:?}, wanted {expected:?}",
                snapshot.state
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_idle_backoff_doubles_to_ceiling() {
        let mut backoff =
            IdleBackoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.idle(), Duration::from_millis(100));
        assert_eq!(backoff.idle(), Duration::from_millis(200));
        // Clamped: 400ms would overshoot
        assert_eq!(backoff.idle(), Duration::from_millis(350));
        assert_eq!(backoff.idle(), Duration::from_millis(350));
    }

    #[test]
    fn test_idle_backoff_resets_on_work() {
        let mut backoff = IdleBackoff::new(Duration::from_millis(100), Duration::from_secs(5));
        backoff.idle();
        backoff.idle();
        assert!(backoff.idle() > Duration::from_millis(100));

        assert_eq!(backoff.busy(), Duration::from_millis(100));
        assert_eq!(backoff.idle(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_poll_intervals_keep_ordering() {
        // A ceiling below the floor is raised to the floor
        let config = WorkerPoolConfig::new(vec![])
            .with_poll_intervals(Duration::from_secs(1), Duration::from_millis(10));
        assert_eq!(config.poll_ceiling, config.poll_floor);
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerPoolConfig::new(vec!["a".to_string()])
            .with_worker_id("w1")
            .with_max_concurrency(8)
            .with_claim_batch(3)
            .with_shutdown_timeout(Duration::from_secs(5));

        assert_eq!(config.worker_id, "w1");
        assert_eq!(config.job_types, vec!["a"]);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.claim_batch, 3);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_successful_job_finishes() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store.clone(), fast_config());
        pool.register_handler("generate_podcast", |_job| async move {
            Ok(serde_json::json!({"audio_file": "episode.mp3"}))
        });
        pool.start().await.unwrap();

        let job_id = store
            .enqueue(NewJob::new(
                "generate_podcast",
                serde_json::json!({"urls": ["https://youtu.be/xyz"]}),
            ))
            .await
            .unwrap();

        let snapshot = wait_for_state(&store, job_id, JobState::Finished).await;
        assert_eq!(
            snapshot.result,
            Some(serde_json::json!({"audio_file": "episode.mp3"}))
        );
        assert_eq!(snapshot.attempt, 1);

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_always_failing_job_exhausts_attempts() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store.clone(), fast_config());
        pool.register_handler("generate_podcast", |_job| async move {
            Err("generator unreachable".to_string())
        });
        pool.start().await.unwrap();

        // Zero back-off so retries happen within the test budget; the
        // 10s/30s/60s schedule itself is covered by the retry tests
        let job_id = store
            .enqueue(
                NewJob::new("generate_podcast", serde_json::json!({"urls": []})).with_options(
                    JobOptions {
                        timeout: Duration::from_secs(600),
                        retry: RetryPolicy {
                            max_attempts: 3,
                            backoff: vec![Duration::ZERO],
                        },
                    },
                ),
            )
            .await
            .unwrap();

        let snapshot = wait_for_state(&store, job_id, JobState::Failed).await;
        assert_eq!(snapshot.attempt, 3);
        assert!(snapshot.result.is_none());

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_job_times_out() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store.clone(), fast_config());
        pool.register_handler("generate_podcast", |_job| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::json!({"audio_file": "never.mp3"}))
        });
        pool.start().await.unwrap();

        let job_id = store
            .enqueue(
                NewJob::new("generate_podcast", serde_json::json!({"urls": []})).with_options(
                    JobOptions {
                        timeout: Duration::from_millis(50),
                        retry: RetryPolicy::no_retry(),
                    },
                ),
            )
            .await
            .unwrap();

        let snapshot = wait_for_state(&store, job_id, JobState::Failed).await;
        assert!(snapshot.last_error.unwrap().contains("timeout"));

        // The abandoned handler future must not resurrect the job
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = store.fetch(job_id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Failed);

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unhandled_job_type_fails() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut config = fast_config();
        config.job_types = vec!["mystery".to_string()];
        let pool = WorkerPool::new(store.clone(), config);
        // No handler registered for "mystery"
        pool.start().await.unwrap();

        let job_id = store
            .enqueue(
                NewJob::new("mystery", serde_json::json!({})).with_options(JobOptions {
                    timeout: Duration::from_secs(600),
                    retry: RetryPolicy::no_retry(),
                }),
            )
            .await
            .unwrap();

        let snapshot = wait_for_state(&store, job_id, JobState::Failed).await;
        assert!(snapshot.last_error.unwrap().contains("no handler"));

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store, fast_config());
        pool.start().await.unwrap();
        assert!(matches!(
            pool.start().await,
            Err(WorkerPoolError::AlreadyRunning)
        ));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_when_idle() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store, fast_config());
        pool.start().await.unwrap();
        pool.shutdown().await.unwrap();
        assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_idle_pool_stops_claiming_after_shutdown() {
        let store = Arc::new(InMemoryJobStore::new());
        let pool = WorkerPool::new(store.clone(), fast_config());
        pool.register_handler("generate_podcast", |_job| async move {
            Ok(serde_json::json!({}))
        });
        pool.start().await.unwrap();
        pool.shutdown().await.unwrap();

        // Work enqueued after shutdown must stay queued
        let job_id = store
            .enqueue(NewJob::new("generate_podcast", serde_json::json!({})))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let snapshot = store.fetch(job_id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Queued);
    }
}
