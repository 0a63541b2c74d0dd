//! Wire shapes of the three artifact-store collections (component C):
//! `blog_content`, `summary`, `qa`. Grounded on the same field-literal
//! approach as `fyi_queue::document` — every default mirrors what the
//! original repository's upsert literals set on first write.

use chrono::{DateTime, Utc};
use fyi_core::domain::{BlogContent, Question, Summary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogContentDoc {
    pub url: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub word_count: u32,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub triggered_no_of_times: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

impl BlogContentDoc {
    pub fn into_domain(self) -> BlogContent {
        BlogContent {
            url: self.url,
            title: self.title,
            content: self.content,
            language: self.language,
            word_count: self.word_count,
            metadata: self.metadata,
            triggered_no_of_times: self.triggered_no_of_times,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDoc {
    pub blog_id: String,
    pub blog_url: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SummaryDoc {
    pub fn into_domain(self) -> Summary {
        Summary {
            blog_id: self.blog_id,
            blog_url: self.blog_url,
            summary: self.summary,
            key_points: self.key_points,
            embedding: self.embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDoc {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub blog_id: String,
    pub blog_url: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keyword_anchor: Option<String>,
    #[serde(default)]
    pub probability: Option<f32>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub click_count: u64,
    #[serde(default)]
    pub last_clicked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuestionDoc {
    pub fn into_domain(self) -> Question {
        Question {
            id: self.id,
            blog_id: self.blog_id,
            blog_url: self.blog_url,
            question: self.question,
            answer: self.answer,
            keyword_anchor: self.keyword_anchor,
            probability: self.probability,
            embedding: self.embedding,
            click_count: self.click_count,
            last_clicked_at: self.last_clicked_at,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_content_doc_defaults_metadata_to_empty_object() {
        let json = serde_json::json!({
            "url": "https://example.com/a",
            "title": "t",
            "content": "c",
            "language": "eng",
            "word_count": 3,
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });
        let doc: BlogContentDoc = serde_json::from_value(json).unwrap();
        assert_eq!(doc.metadata, serde_json::json!({}));
        assert_eq!(doc.triggered_no_of_times, 0);
    }

    #[test]
    fn question_doc_generates_id_when_absent() {
        let json = serde_json::json!({
            "blog_id": "b1",
            "blog_url": "https://example.com/a",
            "question": "q?",
            "answer": "a",
            "created_at": Utc::now(),
        });
        let doc: QuestionDoc = serde_json::from_value(json).unwrap();
        assert_ne!(doc.id, Uuid::nil());
    }
}
