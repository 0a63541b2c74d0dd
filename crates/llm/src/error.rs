use thiserror::Error;

use crate::provider::FinishReason;

/// LLM Orchestrator failures (component F). Grounded on the donor's
/// `stupid-llm::provider::LlmError`, extended with the finish-reason and
/// no-questions variants the spec's question-filtering and grounding rules
/// require.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API error: {status} — {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// `finish_reason != STOP`: carries the blocked-category label that
    /// becomes `last_error` on the queue entry (§4.F, §7).
    #[error("llm_error.blocked: generation stopped with reason {0:?} ({})", .0.label())]
    Blocked(FinishReason),

    /// Zero valid questions survived filtering (§4.F).
    #[error("llm_error.no_questions: no valid question/answer pairs were generated")]
    NoQuestions,
}

impl LlmError {
    /// `error_type` string stored on the queue entry, matching the
    /// `"llm_error"` family of §4.G's substring classifier.
    pub fn error_type(&self) -> &'static str {
        "llm_error"
    }
}
