// Deckcast API server
// Submits podcast generation jobs to the durable queue and serves
// synchronous video summaries.

mod jobs;
mod summaries;
mod transcript;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use deckcast_contracts::{
    ErrorResponse, JobStatus, PodcastArtifact, SubmitPodcastRequest, SubmitPodcastResponse,
    SummaryRequest, SummaryResponse,
};
use deckcast_core::AllowedDomainSet;
use deckcast_queue::PostgresJobStore;

use transcript::HttpTranscriptSource;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// State for allowed-domains introspection
#[derive(Clone)]
struct DomainsState {
    allowed: Arc<AllowedDomainSet>,
}

#[derive(Serialize)]
struct AllowedDomainsResponse {
    domains: Vec<String>,
}

async fn allowed_domains(State(state): State<DomainsState>) -> Json<AllowedDomainsResponse> {
    let mut domains = state.allowed.domains();
    domains.sort();
    Json(AllowedDomainsResponse { domains })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        jobs::submit_podcast,
        jobs::podcast_status,
        summaries::generate_summary,
    ),
    components(
        schemas(
            SubmitPodcastRequest,
            SubmitPodcastResponse,
            JobStatus,
            PodcastArtifact,
            SummaryRequest,
            SummaryResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "podcasts", description = "Podcast job submission and polling"),
        (name = "summaries", description = "Synchronous video summaries")
    ),
    info(
        title = "Deckcast API",
        version = "0.1.0",
        description = "API for podcast generation jobs and video summaries"
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckcast_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    tracing::info!("deckcast-api starting...");

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    let store = PostgresJobStore::new(pool);
    store.migrate().await.context("Failed to run migrations")?;

    let allowed = match std::env::var("DECKCAST_ALLOWED_DOMAINS") {
        Ok(csv) => Arc::new(AllowedDomainSet::from_csv(&csv)),
        Err(_) => Arc::new(AllowedDomainSet::default()),
    };
    tracing::info!(domains = allowed.len(), "Host allow-list loaded");

    let transcript_url = std::env::var("DECKCAST_TRANSCRIPT_URL")
        .unwrap_or_else(|_| "http://localhost:8700".to_string());
    let transcripts = Arc::new(HttpTranscriptSource::new(transcript_url));

    let jobs_state = jobs::AppState::new(Arc::new(store), allowed.clone());
    let summaries_state = summaries::SummaryState::new(transcripts);
    let domains_state = DomainsState { allowed };

    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/v1/allowed-domains",
            get(allowed_domains).with_state(domains_state),
        )
        .merge(jobs::routes(jobs_state))
        .merge(summaries::routes(summaries_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
