// Synchronous video summary endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use deckcast_contracts::{ErrorResponse, SummaryRequest, SummaryResponse};
use deckcast_core::summarize::DEFAULT_SUMMARY_SENTENCES;
use deckcast_core::{extract_video_id, summarize_text, TranscriptError, TranscriptSource};

/// State for the summary routes
#[derive(Clone)]
pub struct SummaryState {
    pub transcripts: Arc<dyn TranscriptSource>,
}

impl SummaryState {
    pub fn new(transcripts: Arc<dyn TranscriptSource>) -> Self {
        Self { transcripts }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// Create summary routes
pub fn routes(state: SummaryState) -> Router {
    Router::new()
        .route("/v1/summaries", post(generate_summary))
        .with_state(state)
}

/// POST /v1/summaries - Summarize a YouTube video's transcript
///
/// Synchronous: the transcript is fetched and summarized within the
/// request. Long videos are bounded by the transcript service, not by
/// the queue.
#[utoipa::path(
    post,
    path = "/v1/summaries",
    request_body = SummaryRequest,
    responses(
        (status = 200, description = "Transcript and summary", body = SummaryResponse),
        (status = 400, description = "Not a recognizable YouTube URL", body = ErrorResponse),
        (status = 404, description = "No transcript available", body = ErrorResponse),
        (status = 502, description = "Transcript service failure", body = ErrorResponse)
    ),
    tag = "summaries"
)]
pub async fn generate_summary(
    State(state): State<SummaryState>,
    Json(req): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let video_id = extract_video_id(&req.video_url).ok_or_else(|| {
        error(
            StatusCode::BAD_REQUEST,
            "invalid YouTube URL, please check the URL and try again",
        )
    })?;

    let transcript = state.transcripts.fetch(&video_id).await.map_err(|e| match e {
        TranscriptError::NotAvailable(_) => error(
            StatusCode::NOT_FOUND,
            "no transcript is available for this video",
        ),
        TranscriptError::Service(detail) => {
            tracing::error!(%video_id, "Transcript service failure: {}", detail);
            error(StatusCode::BAD_GATEWAY, "transcript service unavailable")
        }
    })?;

    let summary = summarize_text(&transcript, DEFAULT_SUMMARY_SENTENCES)
        .unwrap_or_else(|| "No summary could be generated for this video.".to_string());

    Ok(Json(SummaryResponse {
        video_id,
        transcript,
        summary,
    }))
}
