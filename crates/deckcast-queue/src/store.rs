//! JobStore trait definition

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::retry::RetryPolicy;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Job not found (never submitted, or expired from retention)
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Job state in the queue
///
/// Progression is monotonic: `queued -> started -> finished | failed`,
/// with `started -> queued` only via the internal retry path. Terminal
/// states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "started" => Ok(Self::Started),
            "finished" => Ok(Self::Finished),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// Execution budget and retry policy for a job.
///
/// Fixed per job type; submissions never override these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Wall-clock budget for a single attempt.
    #[serde(with = "millis")]
    pub timeout: Duration,

    /// Retry policy applied when an attempt fails or times out.
    pub retry: RetryPolicy,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::podcast()
    }
}

impl JobOptions {
    /// Options for podcast generation jobs: 600 s per attempt, podcast
    /// retry schedule.
    pub fn podcast() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            retry: RetryPolicy::podcast(),
        }
    }
}

/// Definition of a job to be enqueued
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub options: JobOptions,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            options: JobOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}

/// A job attempt handed exclusively to one worker
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub max_attempts: u32,
    pub timeout: Duration,
}

/// Read-only view of a job, as returned to status queries
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub job_type: String,
    pub state: JobState,
    pub attempt: u32,
    pub result: Option<serde_json::Value>,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of reporting a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempts remain; the job went back to queued and becomes visible
    /// again after `delay`.
    WillRetry { next_attempt: u32, delay: Duration },

    /// The attempt ceiling was reached; the job is terminally failed.
    Exhausted,

    /// The job was no longer in started state (already reaped, retried
    /// by another path, or terminal); the report was discarded.
    Discarded,
}

/// Store for background jobs
///
/// The single source of truth for job state. Implementations must be
/// thread-safe; `claim` must never hand the same queued job to two
/// workers.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Enqueue a job. Creates exactly one record and returns its id.
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, StoreError>;

    /// Fetch a job snapshot by id. Pure read; never blocks on
    /// completion.
    async fn fetch(&self, job_id: Uuid) -> Result<JobSnapshot, StoreError>;

    /// Claim up to `max_jobs` queued jobs of the given types for
    /// exclusive execution. Jobs delayed by a retry back-off are not
    /// visible until their delay elapses.
    async fn claim(
        &self,
        worker_id: &str,
        job_types: &[String],
        max_jobs: usize,
    ) -> Result<Vec<ClaimedJob>, StoreError>;

    /// Record a successful attempt. Ignored unless the job is currently
    /// started.
    async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> Result<(), StoreError>;

    /// Record a failed attempt; requeues with back-off or marks the job
    /// terminally failed per its retry policy.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<FailureOutcome, StoreError>;

    /// Fail every started job whose attempt has outlived its timeout.
    /// Returns the ids acted upon. Safe to run from any number of
    /// workers concurrently.
    async fn reap_timed_out(&self) -> Result<Vec<Uuid>, StoreError>;
}

/// Durations cross the serde boundary as integer milliseconds, matching
/// the `timeout_ms` column convention.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
