// Podcast job HTTP routes: submission and status polling

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use deckcast_contracts::{
    ErrorResponse, JobStatus, PodcastArtifact, PodcastJobInput, SubmitPodcastRequest,
    SubmitPodcastResponse, PODCAST_JOB_TYPE,
};
use deckcast_core::{validate_urls, AllowedDomainSet, ValidationError};
use deckcast_queue::{JobOptions, JobState, JobStore, NewJob, StoreError};

/// App state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub allowed: Arc<AllowedDomainSet>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, allowed: Arc<AllowedDomainSet>) -> Self {
        Self { store, allowed }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// Create podcast job routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/podcasts", axum::routing::post(submit_podcast))
        .route("/v1/podcasts/:job_id", get(podcast_status))
        .with_state(state)
}

/// POST /v1/podcasts - Submit a podcast generation job
///
/// Validation is all-or-nothing: any disallowed host rejects the whole
/// submission and nothing is enqueued.
#[utoipa::path(
    post,
    path = "/v1/podcasts",
    request_body = SubmitPodcastRequest,
    responses(
        (status = 202, description = "Job accepted", body = SubmitPodcastResponse),
        (status = 422, description = "Invalid URL list", body = ErrorResponse),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    ),
    tag = "podcasts"
)]
pub async fn submit_podcast(
    State(state): State<AppState>,
    Json(req): Json<SubmitPodcastRequest>,
) -> Result<(StatusCode, Json<SubmitPodcastResponse>), ApiError> {
    let urls = validate_urls(&req.urls, &state.allowed).map_err(|e| match e {
        ValidationError::Empty => {
            error(StatusCode::UNPROCESSABLE_ENTITY, "please enter one or more URLs")
        }
        other => error(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    })?;

    let payload = PodcastJobInput {
        urls: urls.into_iter().map(String::from).collect(),
    };
    let payload = serde_json::to_value(&payload).map_err(|e| {
        tracing::error!("Failed to encode job payload: {}", e);
        error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })?;

    let job = NewJob::new(PODCAST_JOB_TYPE, payload).with_options(JobOptions::podcast());
    let job_id = state.store.enqueue(job).await.map_err(|e| {
        tracing::error!("Failed to enqueue podcast job: {}", e);
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "could not queue the job, please try again",
        )
    })?;

    tracing::info!(%job_id, "Enqueued podcast generation job");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitPodcastResponse { job_id }),
    ))
}

/// GET /v1/podcasts/:job_id - Poll job status
///
/// Pure read: queued, started and retry-delayed jobs all report
/// `pending`; terminal states are stable across repeated polls.
#[utoipa::path(
    get,
    path = "/v1/podcasts/{job_id}",
    params(
        ("job_id" = Uuid, Path, description = "Job ID returned at submission")
    ),
    responses(
        (status = 200, description = "Current job status", body = JobStatus),
        (status = 404, description = "Unknown job ID", body = ErrorResponse)
    ),
    tag = "podcasts"
)]
pub async fn podcast_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
    let snapshot = state.store.fetch(job_id).await.map_err(|e| match e {
        StoreError::JobNotFound(_) => error(StatusCode::NOT_FOUND, "job not found"),
        other => {
            tracing::error!("Failed to fetch job: {}", other);
            error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    })?;

    let status = match snapshot.state {
        JobState::Finished => {
            let result: PodcastArtifact = snapshot
                .result
                .ok_or(())
                .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
                .map_err(|_| {
                    tracing::error!(%job_id, "Finished job has missing or malformed result");
                    error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                })?;
            JobStatus::Succeeded { result }
        }
        // The failure detail was logged by the worker; callers get the
        // generic terminal state only
        JobState::Failed => JobStatus::Failed,
        JobState::Queued | JobState::Started => JobStatus::Pending,
    };

    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use deckcast_queue::{
        ClaimedJob, FailureOutcome, InMemoryJobStore, JobSnapshot,
    };

    use super::*;

    fn test_state() -> (Arc<InMemoryJobStore>, AppState) {
        let store = Arc::new(InMemoryJobStore::new());
        let state = AppState::new(store.clone(), Arc::new(AllowedDomainSet::default()));
        (store, state)
    }

    async fn submit(state: AppState, urls: &str) -> (StatusCode, serde_json::Value) {
        let response = routes(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/podcasts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&serde_json::json!({"urls": urls})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn poll(state: AppState, job_id: &str) -> (StatusCode, serde_json::Value) {
        let response = routes(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/podcasts/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_disallowed_host_rejected_no_job_created() {
        let (store, state) = test_state();

        let (status, body) = submit(state, "youtube.com/watch?v=abc\nevil.com/x").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("evil.com"));
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_submission_rejected() {
        let (store, state) = test_state();

        let (status, _body) = submit(state, "\n   \n").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_valid_submission_is_pending_immediately() {
        let (store, state) = test_state();

        let (status, body) = submit(state.clone(), "youtu.be/xyz").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = body["job_id"].as_str().unwrap().to_string();
        assert_eq!(store.job_count(), 1);

        // First poll must be pending: the worker has not run
        let (status, body) = poll(state.clone(), &job_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "pending"}));

        // Idempotent: a second poll with no worker activity is identical
        let (status, body2) = poll(state, &job_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body2, body);
    }

    #[tokio::test]
    async fn test_completed_job_reports_succeeded_with_result() {
        let (store, state) = test_state();

        let (_, body) = submit(state.clone(), "youtu.be/xyz").await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        let parsed = Uuid::parse_str(&job_id).unwrap();

        // Simulate the worker
        store
            .claim("worker-1", &[PODCAST_JOB_TYPE.to_string()], 1)
            .await
            .unwrap();
        store
            .complete(parsed, serde_json::json!({"audio_file": "episode.mp3"}))
            .await
            .unwrap();

        let (status, body) = poll(state.clone(), &job_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "status": "succeeded",
                "result": {"audio_file": "episode.mp3"}
            })
        );

        // Terminal: stays succeeded on later polls
        let (_, body2) = poll(state, &job_id).await;
        assert_eq!(body2, body);
    }

    #[tokio::test]
    async fn test_failed_job_reports_generic_failure() {
        let (store, state) = test_state();

        // Enqueue directly with no retries so a single failure is terminal
        let options = deckcast_queue::JobOptions {
            retry: deckcast_queue::RetryPolicy::no_retry(),
            ..JobOptions::podcast()
        };
        let job_id = store
            .enqueue(
                NewJob::new(PODCAST_JOB_TYPE, serde_json::json!({"urls": []}))
                    .with_options(options),
            )
            .await
            .unwrap();

        store
            .claim("worker-1", &[PODCAST_JOB_TYPE.to_string()], 1)
            .await
            .unwrap();
        store
            .fail(job_id, "secret internal detail")
            .await
            .unwrap();

        let (status, body) = poll(state, &job_id.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        // Generic failure only; the internal detail is never relayed
        assert_eq!(body, serde_json::json!({"status": "failed"}));
    }

    /// Store whose every operation reports the database as gone.
    struct UnreachableStore;

    #[async_trait]
    impl JobStore for UnreachableStore {
        async fn enqueue(&self, _job: NewJob) -> Result<Uuid, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn fetch(&self, _job_id: Uuid) -> Result<JobSnapshot, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn claim(
            &self,
            _worker_id: &str,
            _job_types: &[String],
            _max_jobs: usize,
        ) -> Result<Vec<ClaimedJob>, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn complete(
            &self,
            _job_id: Uuid,
            _result: serde_json::Value,
        ) -> Result<(), StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn fail(&self, _job_id: Uuid, _error: &str) -> Result<FailureOutcome, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn reap_timed_out(&self) -> Result<Vec<Uuid>, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_queue_unavailable_is_503() {
        let state = AppState::new(
            Arc::new(UnreachableStore),
            Arc::new(AllowedDomainSet::default()),
        );

        let (status, body) = submit(state, "youtu.be/xyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        // Generic retry hint; the connection detail stays in the logs
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("try again"));
        assert!(!message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unknown_job_id_is_404() {
        let (_store, state) = test_state();

        let (status, body) = poll(state, &Uuid::now_v7().to_string()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "job not found");
    }

    #[tokio::test]
    async fn test_started_job_still_pending() {
        let (store, state) = test_state();

        let (_, body) = submit(state.clone(), "youtu.be/xyz").await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        store
            .claim("worker-1", &[PODCAST_JOB_TYPE.to_string()], 1)
            .await
            .unwrap();

        let (status, body) = poll(state, &job_id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "pending"}));
    }
}
