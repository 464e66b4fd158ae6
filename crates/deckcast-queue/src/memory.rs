//! In-memory implementation of JobStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::store::*;

/// Internal job row
struct JobRow {
    job_type: String,
    payload: serde_json::Value,
    options: JobOptions,
    state: JobState,
    attempt: u32,
    visible_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    claimed_by: Option<String>,
    result: Option<serde_json::Value>,
    last_error: Option<String>,
    error_history: Vec<String>,
    enqueued_at: DateTime<Utc>,
}

/// In-memory implementation of JobStore
///
/// Primarily for tests. Provides the same semantics as the PostgreSQL
/// implementation, including retry visibility delays and discarding of
/// stale outcome reports.
///
/// # Example
///
/// ```
/// use deckcast_queue::InMemoryJobStore;
///
/// let store = InMemoryJobStore::new();
/// ```
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobRow>>,
}

impl InMemoryJobStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of jobs ever enqueued and still retained
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    /// Number of jobs currently queued (visible or back-off delayed)
    pub fn queued_count(&self) -> usize {
        self.jobs
            .read()
            .values()
            .filter(|j| j.state == JobState::Queued)
            .count()
    }

}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared retry bookkeeping for `fail` and `reap_timed_out`.
///
/// Caller must hold the write lock and have verified the row is started.
fn fail_row(row: &mut JobRow, error: &str) -> FailureOutcome {
    row.error_history.push(error.to_string());
    row.last_error = Some(error.to_string());
    row.started_at = None;
    row.claimed_by = None;

    if row.options.retry.has_attempts_remaining(row.attempt) {
        let delay = row.options.retry.delay_after_failure(row.attempt);
        row.state = JobState::Queued;
        row.visible_at = Utc::now()
            + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::zero());
        FailureOutcome::WillRetry {
            next_attempt: row.attempt + 1,
            delay,
        }
    } else {
        row.state = JobState::Failed;
        FailureOutcome::Exhausted
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, StoreError> {
        let job_id = Uuid::now_v7();
        let now = Utc::now();
        self.jobs.write().insert(
            job_id,
            JobRow {
                job_type: job.job_type,
                payload: job.payload,
                options: job.options,
                state: JobState::Queued,
                attempt: 0,
                visible_at: now,
                started_at: None,
                claimed_by: None,
                result: None,
                last_error: None,
                error_history: vec![],
                enqueued_at: now,
            },
        );
        Ok(job_id)
    }

    async fn fetch(&self, job_id: Uuid) -> Result<JobSnapshot, StoreError> {
        let jobs = self.jobs.read();
        let row = jobs.get(&job_id).ok_or(StoreError::JobNotFound(job_id))?;

        Ok(JobSnapshot {
            id: job_id,
            job_type: row.job_type.clone(),
            state: row.state,
            attempt: row.attempt,
            result: row.result.clone(),
            last_error: row.last_error.clone(),
            enqueued_at: row.enqueued_at,
        })
    }

    async fn claim(
        &self,
        worker_id: &str,
        job_types: &[String],
        max_jobs: usize,
    ) -> Result<Vec<ClaimedJob>, StoreError> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let mut claimed = vec![];

        for (job_id, row) in jobs.iter_mut() {
            if claimed.len() >= max_jobs {
                break;
            }

            if row.state == JobState::Queued
                && row.visible_at <= now
                && job_types.contains(&row.job_type)
            {
                row.state = JobState::Started;
                row.claimed_by = Some(worker_id.to_string());
                row.started_at = Some(now);
                row.attempt += 1;

                claimed.push(ClaimedJob {
                    id: *job_id,
                    job_type: row.job_type.clone(),
                    payload: row.payload.clone(),
                    attempt: row.attempt,
                    max_attempts: row.options.retry.max_attempts,
                    timeout: row.options.timeout,
                });
            }
        }

        Ok(claimed)
    }

    async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write();
        let row = jobs.get_mut(&job_id).ok_or(StoreError::JobNotFound(job_id))?;

        // A completion for a job that was reaped or already terminal is stale
        if row.state != JobState::Started {
            return Ok(());
        }

        row.state = JobState::Finished;
        row.result = Some(result);
        row.started_at = None;
        row.claimed_by = None;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<FailureOutcome, StoreError> {
        let mut jobs = self.jobs.write();
        let row = jobs.get_mut(&job_id).ok_or(StoreError::JobNotFound(job_id))?;

        if row.state != JobState::Started {
            return Ok(FailureOutcome::Discarded);
        }

        Ok(fail_row(row, error))
    }

    async fn reap_timed_out(&self) -> Result<Vec<Uuid>, StoreError> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let mut reaped = vec![];

        for (job_id, row) in jobs.iter_mut() {
            if row.state != JobState::Started {
                continue;
            }
            let Some(started_at) = row.started_at else {
                continue;
            };
            let deadline = started_at
                + ChronoDuration::from_std(row.options.timeout)
                    .unwrap_or_else(|_| ChronoDuration::zero());
            if deadline < now {
                fail_row(row, "attempt exceeded execution timeout");
                reaped.push(*job_id);
            }
        }

        Ok(reaped)
    }
}
