// Deckcast worker process
//
// Pulls podcast jobs from the durable queue and runs them against the
// generation service. Any number of these may run concurrently; the
// queue's exclusive claiming is the only coordination.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckcast_queue::{PostgresJobStore, WorkerPool, WorkerPoolConfig};
use deckcast_worker::{run_podcast_job, PodcastfyClient, WorkerConfig, PODCAST_JOB_TYPE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckcast_worker=debug,deckcast_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    tracing::info!("deckcast-worker starting...");

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let store = PostgresJobStore::new(pool);
    store.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    let config = WorkerConfig::from_env();
    tracing::info!(
        podcastfy_url = %config.podcastfy_url(),
        concurrency = config.concurrency(),
        "Worker configured"
    );

    let generator = Arc::new(PodcastfyClient::new(config.podcastfy_url()));

    let pool_config = WorkerPoolConfig::new(vec![PODCAST_JOB_TYPE.to_string()])
        .with_max_concurrency(config.concurrency());
    let worker = WorkerPool::new(Arc::new(store), pool_config);

    worker.register_handler(PODCAST_JOB_TYPE, move |job| {
        let generator = Arc::clone(&generator);
        async move { run_podcast_job(generator, job).await }
    });

    worker.start().await.context("Failed to start worker pool")?;
    tracing::info!(worker_id = %worker.worker_id(), "Worker ready, waiting for shutdown signal...");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown signal received, draining...");
    worker.shutdown().await.context("Graceful shutdown failed")?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
