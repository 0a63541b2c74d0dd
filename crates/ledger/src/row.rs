use chrono::{DateTime, Utc};
use fyi_core::domain::{Publisher, PublisherConfig, PublisherStatus};
use uuid::Uuid;

/// Wire shape of the `publishers` table row. `sqlx::FromRow` maps the
/// `status` column (stored as text) and the `config` column (stored as
/// `jsonb`) directly; `Publisher`/`PublisherConfig` stay storage-agnostic
/// in `fyi-core` and this type is the only place that knows about columns.
#[derive(Debug, sqlx::FromRow)]
pub struct PublisherRow {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub email: Option<String>,
    pub api_key: String,
    pub status: String,
    pub config: serde_json::Value,
    pub total_blogs_processed: i64,
    pub total_questions_generated: i64,
    pub blog_slots_reserved: i64,
    pub subscription_tier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl PublisherRow {
    pub fn into_domain(self) -> Publisher {
        let status = match self.status.as_str() {
            "active" => PublisherStatus::Active,
            "inactive" => PublisherStatus::Inactive,
            "suspended" => PublisherStatus::Suspended,
            _ => PublisherStatus::Trial,
        };
        let config: PublisherConfig =
            serde_json::from_value(self.config).unwrap_or_default();
        Publisher {
            id: self.id,
            name: self.name,
            domain: self.domain,
            email: self.email,
            api_key: self.api_key,
            status,
            config,
            total_blogs_processed: self.total_blogs_processed,
            total_questions_generated: self.total_questions_generated,
            blog_slots_reserved: self.blog_slots_reserved,
            subscription_tier: self.subscription_tier,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_active_at: self.last_active_at,
        }
    }
}

pub fn status_str(status: PublisherStatus) -> &'static str {
    match status {
        PublisherStatus::Active => "active",
        PublisherStatus::Inactive => "inactive",
        PublisherStatus::Suspended => "suspended",
        PublisherStatus::Trial => "trial",
    }
}
