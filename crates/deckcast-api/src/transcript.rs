// HTTP transcript source backed by the transcript service

use async_trait::async_trait;
use serde::Deserialize;

use deckcast_core::{TranscriptError, TranscriptSource};

#[derive(Deserialize)]
struct TranscriptResponse {
    transcript: String,
}

/// Transcript source that calls the transcript service over HTTP.
#[derive(Clone)]
pub struct HttpTranscriptSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTranscriptSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranscriptSource for HttpTranscriptSource {
    async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError> {
        let url = format!("{}/transcripts/{}?lang=en", self.base_url, video_id);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TranscriptError::Service(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TranscriptError::NotAvailable(video_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(TranscriptError::Service(format!(
                "transcript service returned {}",
                response.status()
            )));
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| TranscriptError::Service(format!("malformed response: {e}")))?;

        Ok(body.transcript)
    }
}
