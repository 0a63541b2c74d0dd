//! Wire shape of the `blog_processing_queue` collection (component B).
//!
//! Grounded on `blog_processing_queue_repository.py`'s `atomic_get_or_create`
//! document literal: every field it sets on insert has a corresponding field
//! here, `status` stored as the BSON string the Python repository uses
//! directly (`"queued"`, `"processing"`, ...) rather than a bson enum, so a
//! hand-rolled `mongosh` query against the collection reads the same way the
//! original did.

use chrono::{DateTime, Utc};
use fyi_core::domain::{QueueEntry, QueueStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntryDoc {
    pub url: String,
    pub publisher_id: Uuid,
    pub status: String,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub reprocessed_count: u32,
    #[serde(default)]
    pub current_job_id: Option<Uuid>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub heartbeat_at: Option<DateTime<Utc>>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_reprocessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub was_previously_completed: bool,
    #[serde(default)]
    pub completed_count: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_heartbeat_interval() -> u32 {
    30
}

pub fn status_str(status: QueueStatus) -> &'static str {
    status.as_str()
}

pub fn parse_status(raw: &str) -> QueueStatus {
    match raw {
        "queued" => QueueStatus::Queued,
        "processing" => QueueStatus::Processing,
        "retry" => QueueStatus::Retry,
        "completed" => QueueStatus::Completed,
        _ => QueueStatus::Failed,
    }
}

impl QueueEntryDoc {
    pub fn new_queued(url: String, publisher_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            url,
            publisher_id,
            status: status_str(QueueStatus::Queued).to_string(),
            attempt_count: 0,
            max_retries: default_max_retries(),
            reprocessed_count: 0,
            current_job_id: None,
            worker_id: None,
            last_error: None,
            error_type: None,
            heartbeat_at: None,
            heartbeat_interval_seconds: default_heartbeat_interval(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            last_reprocessed_at: None,
            was_previously_completed: false,
            completed_count: 0,
        }
    }

    pub fn into_domain(self) -> QueueEntry {
        QueueEntry {
            url: self.url,
            publisher_id: self.publisher_id,
            status: parse_status(&self.status),
            attempt_count: self.attempt_count,
            max_retries: self.max_retries,
            reprocessed_count: self.reprocessed_count,
            current_job_id: self.current_job_id,
            worker_id: self.worker_id,
            last_error: self.last_error,
            error_type: self.error_type,
            heartbeat_at: self.heartbeat_at,
            heartbeat_interval_seconds: self.heartbeat_interval_seconds,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_reprocessed_at: self.last_reprocessed_at,
            was_previously_completed: self.was_previously_completed,
            completed_count: self.completed_count,
        }
    }
}

/// Keyed by `(url, publisher_id)`; the per-request demand gauge consulted
/// exclusively by the read path (§4.D, §4.H step 3). Deliberately a
/// separate collection from `blog_content.triggered_no_of_times` — see
/// DESIGN.md's Open Question #1 resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDoc {
    pub url: String,
    pub publisher_id: Uuid,
    pub request_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_queued_has_zero_attempts() {
        let doc = QueueEntryDoc::new_queued("https://example.com/a".into(), Uuid::new_v4());
        assert_eq!(doc.attempt_count, 0);
        assert_eq!(doc.status, "queued");
        assert!(doc.worker_id.is_none());
    }

    #[test]
    fn status_roundtrips() {
        for s in [
            QueueStatus::Queued,
            QueueStatus::Processing,
            QueueStatus::Retry,
            QueueStatus::Completed,
            QueueStatus::Failed,
        ] {
            assert_eq!(parse_status(status_str(s)), s);
        }
    }

    #[test]
    fn unknown_status_defaults_to_failed() {
        assert_eq!(parse_status("bogus"), QueueStatus::Failed);
    }
}
