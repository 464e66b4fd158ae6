//! Worker configuration from environment variables.

/// Configuration for the worker process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    podcastfy_url: Option<String>,
    concurrency: Option<usize>,
}

impl WorkerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            podcastfy_url: std::env::var("DECKCAST_PODCASTFY_URL").ok(),
            concurrency: std::env::var("DECKCAST_WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Base URL of the podcast generation service, with default
    pub fn podcastfy_url(&self) -> String {
        self.podcastfy_url
            .clone()
            .unwrap_or_else(|| "http://localhost:8800".to_string())
    }

    /// Maximum concurrent job executions, with default
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4).max(1)
    }
}
