//! PostgreSQL implementation of JobStore
//!
//! Production persistence using PostgreSQL with:
//! - Exclusive job claiming via SELECT ... FOR UPDATE SKIP LOCKED
//! - Retry back-off expressed as row visibility (visible_at)
//! - Timeout reaping driven by started_at + timeout_ms
//!
//! Every operation borrows a pooled connection for the duration of the
//! call; nothing holds a connection across requests.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::store::*;

/// PostgreSQL implementation of JobStore
///
/// # Example
///
/// ```ignore
/// use deckcast_queue::PostgresJobStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/deckcast").await?;
/// let store = PostgresJobStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the queue schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, job), fields(job_type = %job.job_type))]
    async fn enqueue(&self, job: NewJob) -> Result<Uuid, StoreError> {
        let job_id = Uuid::now_v7();
        let options_json = serde_json::to_value(&job.options)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, payload, options, max_attempts, timeout_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(job_id)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(&options_json)
        .bind(job.options.retry.max_attempts as i32)
        .bind(job.options.timeout.as_millis() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to enqueue job: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!(%job_id, job_type = %job.job_type, "enqueued job");
        Ok(job_id)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, job_id: Uuid) -> Result<JobSnapshot, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, job_type, state, attempt, result, last_error, enqueued_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fetch job: {}", e);
            StoreError::Database(e.to_string())
        })?
        .ok_or(StoreError::JobNotFound(job_id))?;

        let state: String = row.get("state");
        let state = state
            .parse::<JobState>()
            .map_err(StoreError::Serialization)?;

        Ok(JobSnapshot {
            id: row.get("id"),
            job_type: row.get("job_type"),
            state,
            attempt: row.get::<i32, _>("attempt") as u32,
            result: row.get("result"),
            last_error: row.get("last_error"),
            enqueued_at: row.get("enqueued_at"),
        })
    }

    #[instrument(skip(self, job_types))]
    async fn claim(
        &self,
        worker_id: &str,
        job_types: &[String],
        max_jobs: usize,
    ) -> Result<Vec<ClaimedJob>, StoreError> {
        if job_types.is_empty() {
            return Ok(vec![]);
        }

        // SKIP LOCKED keeps concurrent workers from contending on the
        // same rows; the CTE + UPDATE makes the claim atomic.
        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM jobs
                WHERE state = 'queued'
                  AND job_type = ANY($1)
                  AND visible_at <= NOW()
                ORDER BY visible_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs j
            SET state = 'started',
                claimed_by = $3,
                started_at = NOW(),
                attempt = attempt + 1
            FROM claimable c
            WHERE j.id = c.id
            RETURNING j.id, j.job_type, j.payload, j.attempt, j.max_attempts, j.timeout_ms
            "#,
        )
        .bind(job_types)
        .bind(max_jobs as i32)
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to claim jobs: {}", e);
            StoreError::Database(e.to_string())
        })?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            claimed.push(ClaimedJob {
                id: row.get("id"),
                job_type: row.get("job_type"),
                payload: row.get("payload"),
                attempt: row.get::<i32, _>("attempt") as u32,
                max_attempts: row.get::<i32, _>("max_attempts") as u32,
                timeout: std::time::Duration::from_millis(
                    row.get::<i64, _>("timeout_ms").max(0) as u64,
                ),
            });
        }

        if !claimed.is_empty() {
            debug!(worker_id, count = claimed.len(), "claimed jobs");
        }

        Ok(claimed)
    }

    #[instrument(skip(self, result))]
    async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> Result<(), StoreError> {
        // The state guard discards completions from workers whose
        // attempt was reaped or superseded; terminal rows never change.
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'finished',
                result = $2,
                started_at = NULL,
                claimed_by = NULL,
                finished_at = NOW()
            WHERE id = $1 AND state = 'started'
            "#,
        )
        .bind(job_id)
        .bind(&result)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to complete job: {}", e);
            StoreError::Database(e.to_string())
        })?;

        if updated.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if exists.is_none() {
                return Err(StoreError::JobNotFound(job_id));
            }
            debug!(%job_id, "discarded stale completion report");
        } else {
            debug!(%job_id, "job finished");
        }

        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<FailureOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT attempt, options, state
            FROM jobs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .ok_or(StoreError::JobNotFound(job_id))?;

        let state: String = row.get("state");
        if state != "started" {
            debug!(%job_id, %state, "discarded stale failure report");
            return Ok(FailureOutcome::Discarded);
        }

        let attempt = row.get::<i32, _>("attempt") as u32;
        let options: JobOptions = serde_json::from_value(row.get("options"))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let outcome = if options.retry.has_attempts_remaining(attempt) {
            let delay = options.retry.delay_after_failure(attempt);
            sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'queued',
                    claimed_by = NULL,
                    started_at = NULL,
                    visible_at = NOW() + ($2::bigint * INTERVAL '1 millisecond'),
                    last_error = $3,
                    error_history = error_history || to_jsonb($3::text)
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(delay.as_millis() as i64)
            .bind(error)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            FailureOutcome::WillRetry {
                next_attempt: attempt + 1,
                delay,
            }
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'failed',
                    claimed_by = NULL,
                    started_at = NULL,
                    finished_at = NOW(),
                    last_error = $2,
                    error_history = error_history || to_jsonb($2::text)
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            FailureOutcome::Exhausted
        };

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!(%job_id, attempt, ?outcome, "recorded failed attempt");
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn reap_timed_out(&self) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM jobs
            WHERE state = 'started'
              AND started_at + (timeout_ms * INTERVAL '1 millisecond') < NOW()
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to scan for timed out jobs: {}", e);
            StoreError::Database(e.to_string())
        })?;

        let mut reaped = vec![];
        for row in rows {
            let job_id: Uuid = row.get("id");
            // fail() re-checks state under lock, so a job that finished
            // between the scan and here is left alone
            match self.fail(job_id, "attempt exceeded execution timeout").await {
                Ok(FailureOutcome::Discarded) => {}
                Ok(_) => reaped.push(job_id),
                Err(StoreError::JobNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(reaped)
    }
}
