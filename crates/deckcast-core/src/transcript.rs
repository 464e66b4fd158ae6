//! Transcript retrieval collaborator.

use async_trait::async_trait;

/// Errors a transcript source can report.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    /// No transcript exists for the video (disabled captions, bad id).
    #[error("no transcript available for video {0}")]
    NotAvailable(String),

    /// The upstream service failed.
    #[error("transcript service error: {0}")]
    Service(String),
}

/// Source of video transcripts.
///
/// The production implementation talks to the transcript service over
/// HTTP; tests use a scripted fake.
#[async_trait]
pub trait TranscriptSource: Send + Sync + 'static {
    /// Fetch the English transcript for a video id as plain text.
    async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError>;
}
