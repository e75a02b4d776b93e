mod ai;
mod audit;
mod config;
mod db;
mod errors;
mod jobs;
mod linking;
mod metrics;
mod models;
mod nlp;
mod optimize;
mod routes;
mod scheduler;
mod serp;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::GeminiClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::queue::RedisJobQueue;
use crate::jobs::worker::{run_worker, JobWorker};
use crate::metrics::SearchConsoleClient;
use crate::nlp::TextAnalyzer;
use crate::routes::build_router;
use crate::serp::fetch::HttpPageFetcher;
use crate::serp::SerperClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (panics on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sitelens API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (queue substrate)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // One analyzer instance for the whole process, injected explicitly.
    let analyzer = Arc::new(TextAnalyzer::new());

    // Capability clients
    let fetcher = Arc::new(HttpPageFetcher::new(config.fetch_timeout_secs)?);
    let ranking = Arc::new(SerperClient::new(config.serper_api_key.clone()));
    let generator = Arc::new(GeminiClient::new(config.gemini_api_key.clone()));
    let search_metrics = Arc::new(SearchConsoleClient::new(config.gsc_access_token.clone()));
    info!("Capability clients initialized");

    let redis_queue = Arc::new(RedisJobQueue::new(redis));
    let queue: Arc<dyn jobs::JobQueue> = redis_queue.clone();

    // Spawn queue workers
    let worker = Arc::new(JobWorker::new(
        db.clone(),
        queue.clone(),
        analyzer.clone(),
        fetcher.clone(),
        ranking,
        search_metrics,
    ));
    for worker_id in 0..config.worker_count {
        tokio::spawn(run_worker(worker.clone(), redis_queue.clone(), worker_id));
    }
    info!("Spawned {} queue workers", config.worker_count);

    // Spawn the periodic scheduler
    tokio::spawn(scheduler::run(db.clone(), queue.clone()));

    // Build app state and router
    let state = AppState {
        db,
        queue,
        analyzer,
        fetcher,
        generator,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
