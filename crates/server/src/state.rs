use std::sync::Arc;

use fyi_artifacts::ArtifactStore;
use fyi_core::Config;
use fyi_crawler::Crawler;
use fyi_llm::LlmOrchestrator;
use fyi_pipeline::Metrics;
use fyi_queue::{QueueStore, ThresholdCounter};
use sqlx::PgPool;

/// Shared application state, grounded on the donor's `AppState`
/// (`crates/server/src/state.rs`): one struct of connection pools and
/// store handles, cheaply cloned via `Arc` into every handler.
pub struct AppState {
    pub config: Config,
    pub pg_pool: PgPool,
    pub queue: QueueStore,
    pub threshold: ThresholdCounter,
    pub artifacts: ArtifactStore,
    pub crawler: Crawler,
    pub llm: LlmOrchestrator,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn admin_key_matches(&self, provided: &str) -> bool {
        self.config
            .server
            .admin_api_key
            .as_deref()
            .map(|expected| expected == provided)
            .unwrap_or(false)
    }
}
