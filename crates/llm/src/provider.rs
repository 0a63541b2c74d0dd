//! Provider-agnostic capability surface consumed by the orchestrator.
//! Adapted from the donor's `stupid-llm::provider` trait (`LlmProvider`,
//! `Message`, `Role`), extended with the embedding call and the typed
//! finish-reason the spec requires (§4.F, §9 Design Notes).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// The provider's reported termination tag for a generation call. Only
/// `Stop` is success; every other variant (including `Unknown`, which
/// covers providers that report nothing) is a typed failure carrying the
/// blocked-category detail in `last_error` (§4.F, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    Stop,
    Safety,
    Recitation,
    Other,
}

impl FinishReason {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stop)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Safety => "SAFETY (blocked by safety filters)",
            Self::Recitation => "RECITATION (content matched blocked content)",
            Self::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub finish_reason: FinishReason,
    pub tokens_used: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub model: String,
}

/// Parameters for a single generation call. `use_grounding` is honored
/// only by providers/operations that support it (question generation,
/// §4.F) — providers that don't support it silently ignore it rather than
/// erroring, matching `use_grounding if provider.provider_name == "gemini"
/// else False` in the original.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub use_grounding: bool,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Whether this provider's grounded-search tool may be attached to a
    /// generation call (§4.F: "only when the selected model supports it").
    fn supports_grounding(&self) -> bool {
        false
    }

    async fn generate_text(&self, req: GenerationRequest) -> Result<GenerationResult, LlmError>;

    /// Inputs longer than 8000 characters are truncated by the caller
    /// (§4.F) before reaching the provider.
    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult, LlmError>;
}
