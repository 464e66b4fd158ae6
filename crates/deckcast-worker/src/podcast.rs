//! Podcast generation collaborator.
//!
//! The queue treats podcast generation as an opaque operation: a URL
//! list goes in, an audio artifact reference comes out. The production
//! implementation calls the podcastfy service over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use deckcast_contracts::PodcastArtifact;

/// Errors the podcast generator can report.
///
/// All of these are treated as potentially transient by the retry
/// policy; only validation happens before enqueue.
#[derive(Debug, thiserror::Error)]
pub enum PodcastError {
    /// Transport-level failure reaching the generation service.
    #[error("podcast service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("podcast service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The service answered 2xx but the body was not understood.
    #[error("unexpected podcast service response: {0}")]
    Decode(String),
}

/// The domain task function: build a podcast episode from source URLs.
#[async_trait]
pub trait PodcastGenerator: Send + Sync + 'static {
    async fn generate(&self, urls: &[String]) -> Result<PodcastArtifact, PodcastError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    urls: &'a [String],
}

#[derive(Deserialize)]
struct GenerateResponse {
    audio_file: String,
}

/// HTTP client for the podcastfy generation service.
pub struct PodcastfyClient {
    http: reqwest::Client,
    base_url: String,
}

impl PodcastfyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PodcastGenerator for PodcastfyClient {
    #[instrument(skip(self, urls), fields(url_count = urls.len()))]
    async fn generate(&self, urls: &[String]) -> Result<PodcastArtifact, PodcastError> {
        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .json(&GenerateRequest { urls })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PodcastError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PodcastError::Decode(e.to_string()))?;

        Ok(PodcastArtifact {
            audio_file: body.audio_file,
        })
    }
}
