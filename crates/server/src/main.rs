mod auth;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use fyi_artifacts::ArtifactStore;
use fyi_crawler::{Crawler, CrawlerConfig as CrawlerRuntimeConfig};
use fyi_llm::LlmOrchestrator;
use fyi_pipeline::{Metrics, PipelineContext, Reaper};
use fyi_queue::{QueueStore, ThresholdCounter};

use crate::state::AppState;

fn load_config() -> fyi_core::Config {
    fyi_core::config::load_dotenv();
    fyi_core::Config::from_env()
}

async fn connect_pg(cfg: &fyi_core::config::LedgerConfig) -> anyhow::Result<sqlx::PgPool> {
    let url = cfg
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(url)
        .await?;
    fyi_ledger::run_migrations(&pool).await?;
    info!("connected to publisher ledger (postgres), migrations applied");
    Ok(pool)
}

async fn connect_mongo(uri: &str) -> anyhow::Result<mongodb::Client> {
    let client = mongodb::Client::with_uri_str(uri).await?;
    Ok(client)
}

/// Shared bootstrap for both the API server and the worker binary mode:
/// connects both stores, builds the crawler/LLM capability objects, and
/// creates the indexes named in §4.B/§4.C/§4.D.
async fn build_runtime(config: &fyi_core::Config) -> anyhow::Result<(sqlx::PgPool, QueueStore, ThresholdCounter, ArtifactStore, Crawler, LlmOrchestrator)> {
    let pg_pool = connect_pg(&config.ledger).await?;

    let queue_uri = config
        .queue_store
        .uri
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("MONGODB_URI is required"))?;
    let queue_client = connect_mongo(queue_uri).await?;
    let queue = QueueStore::new(&queue_client, &config.queue_store.database);
    let threshold = ThresholdCounter::new(&queue_client, &config.queue_store.database);
    queue.create_indexes().await?;
    threshold.create_indexes().await?;

    let artifact_uri = config
        .artifact_store
        .uri
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("MONGODB_URI (or ARTIFACT_MONGODB_URI) is required"))?;
    let artifact_client = connect_mongo(artifact_uri).await?;
    let artifacts = ArtifactStore::new(&artifact_client, &config.artifact_store.database);
    artifacts.create_indexes().await?;

    let crawler = Crawler::new(CrawlerRuntimeConfig {
        max_redirects: config.crawler.max_redirects,
        max_content_bytes: config.crawler.max_content_bytes,
        max_retries: config.crawler.max_retries,
        request_timeout_secs: config.crawler.timeout_seconds,
    })?;

    let llm = LlmOrchestrator::from_config(&config.llm);

    info!("stores, crawler, and LLM orchestrator initialized");
    Ok((pg_pool, queue, threshold, artifacts, crawler, llm))
}

/// Spawns the worker loop, heartbeat task, stall monitor, and reservation
/// reaper as background tasks inside the current process (§9 "Reaper
/// ownership": either the worker or a dedicated process may host it; this
/// binary runs both roles from the same `serve`/`worker` entry points for
/// a one-binary deployment, matching the donor's single-binary server).
fn spawn_pipeline_tasks(
    pg_pool: sqlx::PgPool,
    queue: QueueStore,
    artifacts: ArtifactStore,
    crawler: Crawler,
    llm: LlmOrchestrator,
    metrics: Arc<Metrics>,
    worker: &fyi_core::config::WorkerConfig,
) {
    let ctx = Arc::new(PipelineContext {
        pg_pool: pg_pool.clone(),
        queue: queue.clone(),
        artifacts,
        crawler,
        llm,
        metrics,
        worker_id: worker.worker_id.clone(),
    });

    tokio::spawn(ctx.clone().run_loop(worker.poll_interval_seconds, worker.batch_size));
    tokio::spawn(ctx.clone().run_heartbeat(worker.heartbeat_interval_seconds));
    tokio::spawn(ctx.run_stall_monitor(worker.heartbeat_interval_seconds, worker.stall_multiplier));

    let reaper = Reaper::new(pg_pool, queue);
    tokio::spawn(reaper.run_loop(worker.reaper_interval_seconds, worker.reservation_ttl_seconds));
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/questions/check-and-load", get(handlers::read::check_and_load))
        .route("/questions/by-url", get(handlers::read::questions_by_url))
        .route("/questions/{question_id}", get(handlers::read::question_by_id))
        .route("/questions/{blog_id}", delete(handlers::admin::delete_blog))
        .route("/search/similar", post(handlers::read::search_similar))
        .route("/qa/ask", post(handlers::read::qa_ask))
        .route("/publishers/metadata", get(handlers::read::publisher_metadata))
        .route(
            "/admin/publishers",
            get(handlers::admin::list_publishers).post(handlers::admin::create_publisher),
        )
        .route(
            "/admin/publishers/{id}",
            get(handlers::admin::get_publisher)
                .patch(handlers::admin::update_publisher)
                .delete(handlers::admin::delete_publisher),
        )
        .route("/admin/publishers/{id}/rotate-key", post(handlers::admin::regenerate_api_key))
        .route("/admin/reprocess", post(handlers::admin::reprocess))
        .route("/admin/queue-stats", get(handlers::admin::queue_stats))
        .route("/admin/jobs/status", get(handlers::admin::job_status))
        .route("/admin/metrics", get(handlers::admin::worker_metrics))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Runs the HTTP API. The worker loop, heartbeat, stall monitor, and
/// reaper are also spawned in-process by default (`RUN_WORKER_IN_SERVER`
/// can disable this for a split API/worker deployment — see
/// `worker_only` for the dedicated-process form).
async fn serve(config: fyi_core::Config) -> anyhow::Result<()> {
    config.log_summary();
    let (pg_pool, queue, threshold, artifacts, crawler, llm) = build_runtime(&config).await?;
    let metrics = Arc::new(Metrics::new());

    let run_worker_in_server = std::env::var("RUN_WORKER_IN_SERVER")
        .map(|v| v != "0" && v.to_lowercase() != "false")
        .unwrap_or(true);
    if run_worker_in_server {
        spawn_pipeline_tasks(
            pg_pool.clone(),
            queue.clone(),
            artifacts.clone(),
            crawler.clone(),
            llm.clone(),
            metrics.clone(),
            &config.worker,
        );
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        pg_pool,
        queue,
        threshold,
        artifacts,
        crawler,
        llm,
        metrics,
    });

    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs only the pipeline worker (no HTTP listener) — the dedicated-process
/// form of §5's worker role, for a deployment that scales workers
/// independently from API instances.
async fn worker_only(config: fyi_core::Config) -> anyhow::Result<()> {
    config.log_summary();
    let (pg_pool, queue, _threshold, artifacts, crawler, llm) = build_runtime(&config).await?;
    let metrics = Arc::new(Metrics::new());
    spawn_pipeline_tasks(pg_pool, queue, artifacts, crawler, llm, metrics, &config.worker);
    info!("worker running (worker_id={})", config.worker.worker_id);
    std::future::pending::<()>().await;
    Ok(())
}

async fn migrate(config: fyi_core::Config) -> anyhow::Result<()> {
    let pool = connect_pg(&config.ledger).await?;
    fyi_ledger::run_migrations(&pool).await?;
    info!("migrations applied");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let config = load_config();
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("worker") => worker_only(config).await,
        Some("migrate") => migrate(config).await,
        Some("serve") | None => serve(config).await,
        Some(other) => {
            println!("fyi-server v0.1.0");
            println!("Usage: fyi-server [serve|worker|migrate]");
            println!("  serve    Start the HTTP API (default); also runs the pipeline worker unless RUN_WORKER_IN_SERVER=0");
            println!("  worker   Run only the pipeline worker loop, no HTTP listener");
            println!("  migrate  Apply publisher-ledger migrations and exit");
            anyhow::bail!("unknown subcommand: {other}");
        }
    }
}
