// Worker-side podcast generation: the domain task function behind the
// queue, plus its HTTP collaborator client.

pub mod config;
pub mod handler;
pub mod podcast;

pub use config::WorkerConfig;
pub use deckcast_contracts::PODCAST_JOB_TYPE;
pub use handler::run_podcast_job;
pub use podcast::{PodcastError, PodcastGenerator, PodcastfyClient};
