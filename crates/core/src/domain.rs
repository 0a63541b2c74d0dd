//! Shared domain types crossing the Publisher Ledger, Queue Store, Artifact
//! Store, and Read API crate boundaries. Kept storage-agnostic; each store
//! crate maps these to its own wire representation (`sqlx::FromRow` for the
//! ledger, `serde`/`bson` for the document stores).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Publisher (component A) ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherStatus {
    Active,
    Inactive,
    Suspended,
    Trial,
}

impl Default for PublisherStatus {
    fn default() -> Self {
        Self::Trial
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub email: Option<String>,
    pub api_key: String,
    pub status: PublisherStatus,
    pub config: PublisherConfig,
    pub total_blogs_processed: i64,
    pub total_questions_generated: i64,
    pub blog_slots_reserved: i64,
    pub subscription_tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// A versionless publisher configuration record. Every field is
/// `#[serde(default)]` so a partial JSON document (an older config missing
/// newly added keys) deserializes with sane defaults, matching
/// `_ensure_use_grounding_in_config`'s patch-on-read behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub questions_per_blog: u8,
    pub summary_model: String,
    pub questions_model: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub summary_temperature: f32,
    pub questions_temperature: f32,
    pub chat_temperature: f32,
    pub summary_max_tokens: u32,
    pub questions_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub custom_summary_prompt: Option<String>,
    pub custom_question_prompt: Option<String>,
    pub use_grounding: bool,
    pub daily_blog_limit: Option<u32>,
    pub max_total_blogs: Option<i64>,
    pub threshold_before_processing_blog: u32,
    pub whitelisted_blog_urls: Option<Vec<String>>,
    /// Opaque to the pipeline; consulted only by the read path's
    /// `/publishers/metadata` endpoint.
    pub widget: serde_json::Value,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            questions_per_blog: 5,
            summary_model: "gemini-1.5-flash".to_string(),
            questions_model: "gemini-1.5-flash".to_string(),
            chat_model: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            summary_temperature: 0.3,
            questions_temperature: 0.5,
            chat_temperature: 0.3,
            summary_max_tokens: 1024,
            questions_max_tokens: 2048,
            chat_max_tokens: 350,
            custom_summary_prompt: None,
            custom_question_prompt: None,
            use_grounding: false,
            daily_blog_limit: None,
            max_total_blogs: None,
            threshold_before_processing_blog: 0,
            whitelisted_blog_urls: None,
            widget: serde_json::json!({}),
        }
    }
}

impl PublisherConfig {
    /// Whether `url_or_domain` is permitted for this publisher. An empty
    /// list, a missing list, or a literal `"*"` entry means unrestricted.
    pub fn is_whitelisted(&self, url: &str) -> bool {
        match &self.whitelisted_blog_urls {
            None => true,
            Some(entries) if entries.is_empty() => true,
            Some(entries) => entries.iter().any(|e| e == "*" || url.contains(e.as_str())),
        }
    }
}

// ── Queue Entry (component B) ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Retry,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Retry => "retry",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub url: String,
    pub publisher_id: Uuid,
    pub status: QueueStatus,
    pub attempt_count: u32,
    pub max_retries: u32,
    pub reprocessed_count: u32,
    pub current_job_id: Option<Uuid>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    pub error_type: Option<String>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub heartbeat_interval_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_reprocessed_at: Option<DateTime<Utc>>,
    pub was_previously_completed: bool,
    /// Count of prior genuine completions of the pipeline for this URL
    /// (incremented only by the step-8 terminal transition, never by the
    /// threshold-skip completion or any `queued`/`retry` transition). The
    /// single source of truth for §4.G step 8's "no prior completed run"
    /// check — see `fyi_pipeline::worker::process_job`.
    pub completed_count: u32,
}

// ── Artifact Store (component C) ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub word_count: u32,
    pub metadata: serde_json::Value,
    pub triggered_no_of_times: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub blog_id: String,
    pub blog_url: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub blog_id: String,
    pub blog_url: String,
    pub question: String,
    pub answer: String,
    pub keyword_anchor: Option<String>,
    pub probability: Option<f32>,
    pub embedding: Vec<f32>,
    pub click_count: u64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ── Error code taxonomy (§6) ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    DomainMismatch,
    NotWhitelisted,
    UsageLimitExceeded,
    DailyLimitExceeded,
    NotFound,
    ValidationError,
    QueueConflict,
    LlmBlocked,
    CrawlFailed,
    InternalError,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthRequired => 401,
            Self::DomainMismatch | Self::NotWhitelisted | Self::ValidationError => 400,
            Self::UsageLimitExceeded | Self::DailyLimitExceeded => 403,
            Self::NotFound => 404,
            Self::QueueConflict => 409,
            Self::LlmBlocked | Self::CrawlFailed => 502,
            Self::InternalError => 500,
        }
    }
}
