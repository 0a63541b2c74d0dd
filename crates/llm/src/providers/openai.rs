//! OpenAI provider. Adapted from the donor's
//! `stupid-llm::providers::openai::OpenAiProvider` (chat-completions body
//! shape), extended with the embeddings endpoint and finish-reason mapping
//! (`"stop"` success, `"content_filter"` the closest analog to Gemini's
//! `SAFETY`, anything else `Other`).

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::LlmError;
use crate::provider::{EmbeddingResult, FinishReason, GenerationRequest, GenerationResult, LlmProvider};

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    fn parse_finish_reason(raw: Option<&str>) -> FinishReason {
        match raw {
            None | Some("stop") => FinishReason::Stop,
            Some("content_filter") => FinishReason::Safety,
            Some(_) => FinishReason::Other,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    async fn generate_text(&self, req: GenerationRequest) -> Result<GenerationResult, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": req.model,
            "messages": [
                { "role": "system", "content": req.system_prompt },
                { "role": "user", "content": req.user_prompt },
            ],
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });

        debug!(model = req.model, "OpenAI chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let choice = &resp["choices"][0];
        let finish_reason = Self::parse_finish_reason(choice["finish_reason"].as_str());
        if !finish_reason.is_success() {
            return Err(LlmError::Blocked(finish_reason));
        }

        let text = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".into()))?
            .to_string();
        let tokens_used = resp["usage"]["total_tokens"].as_u64().map(|n| n as u32);

        Ok(GenerationResult { text, finish_reason, tokens_used })
    }

    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let truncated = crate::prompts::truncate_for_embedding(text);
        let body = json!({ "model": self.embedding_model, "input": truncated });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let values = resp["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| LlmError::Parse("missing data[0].embedding".into()))?;
        let embedding = values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();

        Ok(EmbeddingResult { embedding, model: self.embedding_model.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_maps_stop_and_content_filter() {
        assert_eq!(OpenAiProvider::parse_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(OpenAiProvider::parse_finish_reason(Some("content_filter")), FinishReason::Safety);
        assert_eq!(OpenAiProvider::parse_finish_reason(Some("length")), FinishReason::Other);
    }
}
