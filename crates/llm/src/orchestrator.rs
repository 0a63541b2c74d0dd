//! LLM Orchestrator (component F): resolves a provider for a given model
//! identifier and drives summary/questions/embedding generation with the
//! three-layer prompt architecture of §4.F. Grounded on
//! `llm_content_generator.py::LLMContentGenerator`, with provider selection
//! collapsed into a prefix match over the model string (the original's
//! `LLMClient` does the same dispatch by inspecting the model name).

use std::sync::Arc;

use fyi_core::config::LlmConfig;

use crate::error::LlmError;
use crate::parsing::{self, ParsedQuestion, ParsedSummary};
use crate::prompts::answer_question_prompt;
use crate::provider::{EmbeddingResult, GenerationRequest, LlmProvider};
use crate::providers::{GeminiProvider, OpenAiProvider};

#[derive(Clone)]
pub struct LlmOrchestrator {
    gemini: Option<Arc<GeminiProvider>>,
    openai: Option<Arc<OpenAiProvider>>,
}

impl LlmOrchestrator {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        Self {
            gemini: cfg.gemini_api_key.clone().map(|k| Arc::new(GeminiProvider::new(k))),
            openai: cfg.openai_api_key.clone().map(|k| Arc::new(OpenAiProvider::new(k))),
        }
    }

    /// Model-name-prefix dispatch, matching the original's `LLMClient`
    /// provider resolution (`model.startswith("gemini")`, etc).
    fn provider_for_model(&self, model: &str) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if model.starts_with("gemini") || model.starts_with("text-embedding-0") {
            return self
                .gemini
                .clone()
                .map(|p| p as Arc<dyn LlmProvider>)
                .ok_or_else(|| LlmError::NotConfigured("gemini".into()));
        }
        if model.starts_with("gpt") || model.starts_with("text-embedding-3") || model.starts_with("o1") {
            return self
                .openai
                .clone()
                .map(|p| p as Arc<dyn LlmProvider>)
                .ok_or_else(|| LlmError::NotConfigured("openai".into()));
        }
        Err(LlmError::NotConfigured(format!("no provider recognizes model {model}")))
    }

    /// Summary generation has no grounding parameter by design (§4.F:
    /// "summary and embeddings never ground").
    pub async fn generate_summary(
        &self,
        content: &str,
        title: &str,
        custom_prompt: Option<&str>,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ParsedSummary, LlmError> {
        let provider = self.provider_for_model(model)?;
        let role_and_instructions = custom_prompt.unwrap_or(crate::prompts::DEFAULT_SUMMARY_PROMPT);
        let user_prompt = crate::prompts::summary_user_prompt(role_and_instructions, title, content);

        let req = GenerationRequest {
            system_prompt: crate::prompts::OUTPUT_FORMAT_INSTRUCTION.to_string(),
            user_prompt,
            model: model.to_string(),
            temperature,
            max_tokens,
            use_grounding: false,
        };
        let result = provider.generate_text(req).await?;
        Ok(parsing::parse_summary(&result.text))
    }

    /// Grounding is honored only when both the publisher requests it and
    /// the resolved provider advertises support (§4.F).
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_questions(
        &self,
        content: &str,
        title: &str,
        questions_per_blog: u8,
        custom_prompt: Option<&str>,
        model: &str,
        temperature: f32,
        max_tokens: u32,
        use_grounding: bool,
    ) -> Result<Vec<ParsedQuestion>, LlmError> {
        let provider = self.provider_for_model(model)?;
        let grounding = use_grounding && provider.supports_grounding();

        let role_and_instructions = custom_prompt.unwrap_or(crate::prompts::DEFAULT_QUESTIONS_PROMPT);
        let user_prompt =
            crate::prompts::questions_user_prompt(role_and_instructions, title, content, questions_per_blog);

        let req = GenerationRequest {
            system_prompt: crate::prompts::OUTPUT_FORMAT_INSTRUCTION.to_string(),
            user_prompt,
            model: model.to_string(),
            temperature,
            max_tokens,
            use_grounding: grounding,
        };
        let result = provider.generate_text(req).await?;
        parsing::parse_questions(&result.text, questions_per_blog)
    }

    pub async fn generate_embedding(&self, text: &str, model: &str) -> Result<EmbeddingResult, LlmError> {
        let provider = self.provider_for_model(model)?;
        provider.generate_embedding(text).await
    }

    /// One embedding for the summary, one per retained question, issued
    /// concurrently via `try_join_all` — a Rust-native improvement over the
    /// original's sequential loop (SPEC_FULL.md §11).
    pub async fn generate_embeddings(
        &self,
        summary_text: &str,
        questions: &[ParsedQuestion],
        embedding_model: &str,
    ) -> Result<(Vec<f32>, Vec<Vec<f32>>), LlmError> {
        let summary_fut = self.generate_embedding(summary_text, embedding_model);
        let question_futs = questions
            .iter()
            .map(|q| self.generate_embedding(&q.question, embedding_model));

        let (summary_result, question_results) = futures::future::try_join(
            summary_fut,
            futures::future::try_join_all(question_futs),
        )
        .await?;

        Ok((
            summary_result.embedding,
            question_results.into_iter().map(|r| r.embedding).collect(),
        ))
    }

    /// Answer a reader's question, capped at ~200 words via `max_tokens`
    /// clamped to 350 regardless of the publisher's configured
    /// `chat_max_tokens` (§6 `POST /qa/ask`).
    pub async fn answer_question(
        &self,
        question: &str,
        context: Option<&str>,
        model: &str,
        temperature: f32,
        max_tokens: u32,
        use_grounding: bool,
    ) -> Result<String, LlmError> {
        let provider = self.provider_for_model(model)?;
        let grounding = use_grounding && provider.supports_grounding();
        let user_prompt = answer_question_prompt(question, context);

        let req = GenerationRequest {
            system_prompt: crate::prompts::QA_ANSWER_SYSTEM_PROMPT.to_string(),
            user_prompt,
            model: model.to_string(),
            temperature,
            max_tokens: max_tokens.min(350),
            use_grounding: grounding,
        };
        let result = provider.generate_text(req).await?;
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_resolution_is_prefix_based() {
        let orch = LlmOrchestrator { gemini: None, openai: None };
        assert!(matches!(
            orch.provider_for_model("gemini-1.5-flash"),
            Err(LlmError::NotConfigured(_))
        ));
        assert!(matches!(
            orch.provider_for_model("unknown-model"),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
