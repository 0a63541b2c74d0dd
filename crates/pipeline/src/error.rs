use thiserror::Error;

/// Wraps every downstream crate's error for `process_job` classification
/// (§4.G "classify by error substring"). `error_type()` is the same string
/// the worker writes into `QueueEntry::error_type` and the substring the
/// classifier matches on.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("crawl_error: {0}")]
    Crawl(#[from] fyi_crawler::CrawlError),

    #[error("llm_error: {0}")]
    Llm(#[from] fyi_llm::LlmError),

    #[error("db_error (queue): {0}")]
    Queue(#[from] fyi_queue::QueueError),

    #[error("db_error (artifacts): {0}")]
    Artifact(#[from] fyi_artifacts::ArtifactError),

    #[error("db_error (ledger): {0}")]
    Ledger(#[from] fyi_ledger::LedgerError),

    #[error("validation_error: {0}")]
    Validation(String),

    #[error("unknown: {0}")]
    Unknown(String),
}

impl PipelineError {
    /// The taxonomy named in §4.G: `crawl_error`, `llm_error`, `db_error`,
    /// `validation_error`, `unknown`. Matched by substring on the `Display`
    /// output to mirror the original's string-classification approach.
    pub fn error_type(&self) -> &'static str {
        let rendered = self.to_string();
        if rendered.starts_with("crawl_error") {
            "crawl_error"
        } else if rendered.starts_with("llm_error") {
            "llm_error"
        } else if rendered.starts_with("db_error") {
            "db_error"
        } else if rendered.starts_with("validation_error") {
            "validation_error"
        } else {
            "unknown"
        }
    }

    /// Whether the failure should count against `max_retries` or fail the
    /// job outright regardless of remaining attempts.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Crawl(e) => e.is_retriable(),
            Self::Llm(_) => true,
            Self::Queue(_) | Self::Artifact(_) | Self::Ledger(_) => true,
            Self::Validation(_) => false,
            Self::Unknown(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_is_not_retriable() {
        let e = PipelineError::Validation("bad url".to_string());
        assert_eq!(e.error_type(), "validation_error");
        assert!(!e.is_retriable());
    }

    #[test]
    fn unknown_error_type_is_fallback() {
        let e = PipelineError::Unknown("boom".to_string());
        assert_eq!(e.error_type(), "unknown");
    }
}
