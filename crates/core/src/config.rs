use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub queue_store: QueueStoreConfig,
    pub artifact_store: ArtifactStoreConfig,
    pub crawler: CrawlerConfig,
    pub llm: LlmConfig,
    pub worker: WorkerConfig,
}

const PROFILE_MARKER_KEYS: &[&str] = &["DATABASE_URL", "MONGODB_URI", "GEMINI_API_KEY"];

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FYI_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FYI_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            ledger: LedgerConfig::from_env_profiled(p),
            queue_store: QueueStoreConfig::from_env_profiled(p),
            artifact_store: ArtifactStoreConfig::from_env_profiled(p),
            crawler: CrawlerConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
        }
    }

    pub fn available_profiles() -> Vec<String> {
        let mut profiles = std::collections::BTreeSet::new();
        profiles.insert("default".to_string());
        for (key, _) in env::vars() {
            for marker in PROFILE_MARKER_KEYS {
                if let Some(prefix) = key.strip_suffix(&format!("_{}", marker)) {
                    if !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_uppercase() || c == '_')
                    {
                        profiles.insert(prefix.to_string());
                    }
                }
            }
        }
        profiles.into_iter().collect()
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() {
            "default"
        } else {
            &self.profile
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      addr={}:{}", self.server.host, self.server.port);
        tracing::info!("  ledger:      configured={}", self.ledger.is_configured());
        tracing::info!(
            "  queue_store: db={}, configured={}",
            self.queue_store.database,
            self.queue_store.is_configured()
        );
        tracing::info!(
            "  artifacts:   db={}, configured={}",
            self.artifact_store.database,
            self.artifact_store.is_configured()
        );
        tracing::info!("  llm:         configured={}", self.llm.is_configured());
        tracing::info!(
            "  worker:      poll={}s batch={} pool={}",
            self.worker.poll_interval_seconds,
            self.worker.batch_size,
            self.worker.task_pool_size
        );
    }

    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "ledger": { "configured": self.ledger.is_configured() },
            "queue_store": { "database": self.queue_store.database, "configured": self.queue_store.is_configured() },
            "artifact_store": { "database": self.artifact_store.database, "configured": self.artifact_store.is_configured() },
            "llm": { "configured": self.llm.is_configured() },
            "worker": {
                "poll_interval_seconds": self.worker.poll_interval_seconds,
                "batch_size": self.worker.batch_size,
                "task_pool_size": self.worker.task_pool_size,
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub admin_api_key: Option<String>,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u32(p, "PORT", 8080) as u16,
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            admin_api_key: profiled_env_opt(p, "ADMIN_API_KEY"),
        }
    }
}

// ── Publisher Ledger (Postgres) ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl LedgerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            database_url: profiled_env_opt(p, "DATABASE_URL"),
            max_connections: profiled_env_u32(p, "LEDGER_MAX_CONNECTIONS", 10),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.database_url.is_some()
    }
}

// ── Queue Store / Artifact Store (MongoDB) ─────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStoreConfig {
    pub uri: Option<String>,
    pub database: String,
}

impl QueueStoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            uri: profiled_env_opt(p, "MONGODB_URI"),
            database: profiled_env_or(p, "MONGODB_DATABASE", "fyi_widget"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStoreConfig {
    pub uri: Option<String>,
    pub database: String,
}

impl ArtifactStoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            // Artifacts live alongside the queue in the same Mongo cluster by
            // default (the original stores both via the same `motor` client);
            // a distinct URI may still be supplied to split them.
            uri: profiled_env_opt(p, "ARTIFACT_MONGODB_URI")
                .or_else(|| profiled_env_opt(p, "MONGODB_URI")),
            database: profiled_env_or(p, "MONGODB_DATABASE", "fyi_widget"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }
}

// ── Crawler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub max_redirects: u32,
    pub max_content_bytes: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl CrawlerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_redirects: profiled_env_u32(p, "CRAWLER_MAX_REDIRECTS", 5),
            max_content_bytes: profiled_env_u64(p, "CRAWLER_MAX_CONTENT_BYTES", 10 * 1024 * 1024),
            timeout_seconds: profiled_env_u64(p, "CRAWLER_TIMEOUT_SECONDS", 30),
            max_retries: profiled_env_u32(p, "CRAWLER_MAX_RETRIES", 3),
        }
    }
}

// ── LLM Orchestrator ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub max_parallel_llm_calls: u32,
    pub request_timeout_seconds: u64,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            max_parallel_llm_calls: profiled_env_u32(p, "MAX_PARALLEL_LLM_CALLS", 8),
            request_timeout_seconds: profiled_env_u64(p, "LLM_REQUEST_TIMEOUT_SECONDS", 60),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gemini_api_key.is_some() || self.openai_api_key.is_some() || self.anthropic_api_key.is_some()
    }
}

// ── Worker / Pipeline ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval_seconds: u64,
    pub batch_size: u32,
    pub task_pool_size: u32,
    pub heartbeat_interval_seconds: u64,
    pub stall_multiplier: u32,
    pub reaper_interval_seconds: u64,
    pub reservation_ttl_seconds: u64,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            worker_id: profiled_env_opt(p, "WORKER_ID")
                .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4())),
            poll_interval_seconds: profiled_env_u64(p, "POLL_INTERVAL_SECONDS", 5),
            batch_size: profiled_env_u32(p, "BATCH_SIZE", 5),
            task_pool_size: profiled_env_u32(p, "TASK_POOL_SIZE", 10),
            heartbeat_interval_seconds: profiled_env_u64(p, "HEARTBEAT_INTERVAL_SECONDS", 30),
            stall_multiplier: profiled_env_u32(p, "STALL_MULTIPLIER", 3),
            reaper_interval_seconds: profiled_env_u64(p, "REAPER_INTERVAL_SECONDS", 60),
            reservation_ttl_seconds: profiled_env_u64(p, "RESERVATION_TTL_SECONDS", 3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.worker.batch_size, 5);
        assert!(!cfg.ledger.is_configured());
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
    }
}
