//! The queue handler for podcast jobs.

use std::sync::Arc;

use tracing::info;

use deckcast_contracts::PodcastJobInput;
use deckcast_queue::{ClaimedJob, JobResult};

use crate::podcast::PodcastGenerator;

/// Execute one podcast job attempt.
///
/// Decodes the payload, invokes the generator, and encodes the artifact
/// as the job result. Any error becomes the attempt's failure message
/// and feeds the retry policy; a payload that fails to decode will fail
/// every attempt, which is the intended dead end for corrupt jobs.
pub async fn run_podcast_job(generator: Arc<dyn PodcastGenerator>, job: ClaimedJob) -> JobResult {
    let input: PodcastJobInput = serde_json::from_value(job.payload)
        .map_err(|e| format!("invalid podcast job payload: {e}"))?;

    info!(
        job_id = %job.id,
        attempt = job.attempt,
        url_count = input.urls.len(),
        "Generating podcast"
    );

    let artifact = generator
        .generate(&input.urls)
        .await
        .map_err(|e| e.to_string())?;

    serde_json::to_value(&artifact).map_err(|e| format!("failed to encode artifact: {e}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use deckcast_contracts::{PodcastArtifact, PODCAST_JOB_TYPE};

    use super::*;
    use crate::podcast::PodcastError;

    struct FakeGenerator {
        fail: bool,
    }

    #[async_trait]
    impl PodcastGenerator for FakeGenerator {
        async fn generate(&self, urls: &[String]) -> Result<PodcastArtifact, PodcastError> {
            if self.fail {
                return Err(PodcastError::Service {
                    status: 503,
                    message: "overloaded".to_string(),
                });
            }
            Ok(PodcastArtifact {
                audio_file: format!("episode-{}.mp3", urls.len()),
            })
        }
    }

    fn claimed(payload: serde_json::Value) -> ClaimedJob {
        ClaimedJob {
            id: Uuid::now_v7(),
            job_type: PODCAST_JOB_TYPE.to_string(),
            payload,
            attempt: 1,
            max_attempts: 3,
            timeout: Duration::from_secs(600),
        }
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let generator = Arc::new(FakeGenerator { fail: false });
        let job = claimed(serde_json::json!({"urls": ["https://youtu.be/a", "https://youtu.be/b"]}));

        let result = run_podcast_job(generator, job).await.unwrap();
        assert_eq!(result, serde_json::json!({"audio_file": "episode-2.mp3"}));
    }

    #[tokio::test]
    async fn test_generator_failure_becomes_error_message() {
        let generator = Arc::new(FakeGenerator { fail: true });
        let job = claimed(serde_json::json!({"urls": ["https://youtu.be/a"]}));

        let err = run_podcast_job(generator, job).await.unwrap_err();
        assert!(err.contains("503"));
    }

    #[tokio::test]
    async fn test_corrupt_payload_fails() {
        let generator = Arc::new(FakeGenerator { fail: false });
        let job = claimed(serde_json::json!({"not_urls": true}));

        let err = run_podcast_job(generator, job).await.unwrap_err();
        assert!(err.contains("invalid podcast job payload"));
    }
}
