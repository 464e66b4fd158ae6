// Podcast job DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Queue job type under which podcast work is enqueued and claimed.
pub const PODCAST_JOB_TYPE: &str = "generate_podcast";

/// Request to submit a podcast generation job.
///
/// `urls` holds the raw textarea input: one source URL per line. Blank
/// lines are ignored; entries without a scheme get `https://` prefixed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitPodcastRequest {
    pub urls: String,
}

/// Handle returned after a successful submission.
///
/// The id is opaque to callers; its only use is polling the status
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitPodcastResponse {
    pub job_id: Uuid,
}

/// Reference to a generated podcast episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PodcastArtifact {
    /// Location of the rendered audio file, as reported by the generator.
    pub audio_file: String,
}

/// Caller-facing job status.
///
/// This is deliberately a tagged union rather than a set of boolean
/// flags: a job is pending, succeeded with a result, or failed, and
/// callers match exhaustively. Queue-internal states (`queued`,
/// `started`, retry-requeued) all map to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded { result: PodcastArtifact },
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Payload stored in the queue for a podcast job.
///
/// Always the full validated URL list; a submission is all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PodcastJobInput {
    pub urls: Vec<String>,
}

/// Error body returned by the API on any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
