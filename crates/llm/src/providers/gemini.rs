//! Gemini provider. Adapted from the donor's
//! `stupid-llm::providers::gemini::GeminiProvider` (request-body shape,
//! system-instruction handling), extended with the embedding call, the
//! typed finish-reason classification, and the grounded-search tool the
//! spec requires for question generation (§4.F). Finish-reason mapping
//! grounded on `gemini_provider.py`'s `finish_reason_map`.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::LlmError;
use crate::provider::{EmbeddingResult, FinishReason, GenerationRequest, GenerationResult, LlmProvider};

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    embedding_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    fn build_request_body(req: &GenerationRequest) -> serde_json::Value {
        let mut body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": req.user_prompt }] },
            ],
            "system_instruction": {
                "parts": [{ "text": req.system_prompt }],
            },
            "generationConfig": {
                "temperature": req.temperature,
                "maxOutputTokens": req.max_tokens,
            },
        });

        if req.use_grounding {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        body
    }

    fn parse_finish_reason(raw: Option<&str>) -> FinishReason {
        match raw {
            None | Some("STOP") | Some("FINISH_REASON_STOP") => FinishReason::Stop,
            Some("SAFETY") => FinishReason::Safety,
            Some("RECITATION") => FinishReason::Recitation,
            Some(_) => FinishReason::Other,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn supports_grounding(&self) -> bool {
        true
    }

    async fn generate_text(&self, req: GenerationRequest) -> Result<GenerationResult, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            req.model, self.api_key,
        );

        let body = Self::build_request_body(&req);
        debug!(model = req.model, grounding = req.use_grounding, "Gemini generateContent request");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let candidate = &resp["candidates"][0];
        let finish_reason = Self::parse_finish_reason(candidate["finishReason"].as_str());

        if !finish_reason.is_success() {
            return Err(LlmError::Blocked(finish_reason));
        }

        let text = candidate["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing candidates[0].content.parts[0].text".into()))?
            .to_string();

        let tokens_used = resp["usageMetadata"]["totalTokenCount"].as_u64().map(|n| n as u32);

        Ok(GenerationResult { text, finish_reason, tokens_used })
    }

    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:embedContent?key={}",
            self.embedding_model, self.api_key,
        );
        let truncated = crate::prompts::truncate_for_embedding(text);
        let body = json!({ "content": { "parts": [{ "text": truncated }] } });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let values = resp["embedding"]["values"]
            .as_array()
            .ok_or_else(|| LlmError::Parse("missing embedding.values".into()))?;
        let embedding = values.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();

        Ok(EmbeddingResult { embedding, model: self.embedding_model.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn req(use_grounding: bool) -> GenerationRequest {
        GenerationRequest {
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            model: "gemini-1.5-flash".into(),
            temperature: 0.3,
            max_tokens: 1024,
            use_grounding,
        }
    }

    #[test]
    fn request_body_has_system_instruction_separate() {
        let body = GeminiProvider::build_request_body(&req(false));
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "system");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn grounding_attaches_search_tool() {
        let body = GeminiProvider::build_request_body(&req(true));
        assert_eq!(body["tools"][0]["google_search"], json!({}));
    }

    #[test]
    fn finish_reason_maps_stop_and_safety() {
        assert_eq!(GeminiProvider::parse_finish_reason(Some("STOP")), FinishReason::Stop);
        assert_eq!(GeminiProvider::parse_finish_reason(None), FinishReason::Stop);
        assert_eq!(GeminiProvider::parse_finish_reason(Some("SAFETY")), FinishReason::Safety);
        assert_eq!(GeminiProvider::parse_finish_reason(Some("RECITATION")), FinishReason::Recitation);
        assert_eq!(GeminiProvider::parse_finish_reason(Some("OTHER")), FinishReason::Other);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
