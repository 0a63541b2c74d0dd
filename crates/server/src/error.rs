//! Top-level API error carried in the response envelope's `error.code`.
//! Grounded on `crate::api::ingestion::sources::store_err` (donor), promoted
//! from a one-off closure to a typed `IntoResponse` impl since every route
//! in this crate needs the same mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fyi_core::domain::ErrorCode;
use fyi_core::envelope::Envelope;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    AuthRequired,

    #[error("the blog url's domain does not match the authenticated publisher")]
    DomainMismatch,

    #[error("url is not whitelisted for this publisher")]
    NotWhitelisted,

    #[error("{0}")]
    UsageLimitExceeded(String),

    #[error("{0}")]
    DailyLimitExceeded(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    QueueConflict(String),

    #[error("{0}")]
    LlmBlocked(String),

    #[error("{0}")]
    CrawlFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthRequired => ErrorCode::AuthRequired,
            Self::DomainMismatch => ErrorCode::DomainMismatch,
            Self::NotWhitelisted => ErrorCode::NotWhitelisted,
            Self::UsageLimitExceeded(_) => ErrorCode::UsageLimitExceeded,
            Self::DailyLimitExceeded(_) => ErrorCode::DailyLimitExceeded,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::QueueConflict(_) => ErrorCode::QueueConflict,
            Self::LlmBlocked(_) => ErrorCode::LlmBlocked,
            Self::CrawlFailed(_) => ErrorCode::CrawlFailed,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4();
        let status = StatusCode::from_u16(self.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: Envelope<()> = Envelope::err(self.code(), self.to_string(), request_id);
        (status, Json(envelope)).into_response()
    }
}

impl From<fyi_ledger::LedgerError> for ApiError {
    fn from(e: fyi_ledger::LedgerError) -> Self {
        use fyi_ledger::LedgerError as L;
        match e {
            L::NotFound(id) => Self::NotFound(format!("publisher not found: {id}")),
            L::DomainNotFound(d) => Self::NotFound(format!("no publisher registered for domain: {d}")),
            L::DuplicateDomain(d) => Self::Validation(format!("domain already registered: {d}")),
            L::DuplicateApiKey => Self::Internal("api key collision, retry".to_string()),
            L::UsageLimitExceeded { publisher_id, limit } => {
                Self::UsageLimitExceeded(format!("publisher {publisher_id} reached its lifetime limit of {limit}"))
            }
            L::Database(e) => Self::Internal(format!("ledger error: {e}")),
        }
    }
}

impl From<fyi_queue::QueueError> for ApiError {
    fn from(e: fyi_queue::QueueError) -> Self {
        Self::Internal(format!("queue error: {e}"))
    }
}

impl From<fyi_artifacts::ArtifactError> for ApiError {
    fn from(e: fyi_artifacts::ArtifactError) -> Self {
        use fyi_artifacts::ArtifactError as A;
        match e {
            A::BlogNotFound(url) => Self::NotFound(format!("blog not found: {url}")),
            A::QuestionNotFound(id) => Self::NotFound(format!("question not found: {id}")),
            A::Database(e) => Self::Internal(format!("artifact store error: {e}")),
        }
    }
}

impl From<fyi_llm::LlmError> for ApiError {
    fn from(e: fyi_llm::LlmError) -> Self {
        use fyi_llm::LlmError as E;
        match e {
            E::Blocked(reason) => Self::LlmBlocked(format!("generation blocked: {}", reason.label())),
            E::NoQuestions => Self::LlmBlocked("no valid questions were generated".to_string()),
            other => Self::Internal(format!("llm error: {other}")),
        }
    }
}

impl From<fyi_crawler::CrawlError> for ApiError {
    fn from(e: fyi_crawler::CrawlError) -> Self {
        Self::CrawlFailed(e.to_string())
    }
}
