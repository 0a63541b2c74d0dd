//! Artifact Store (component C): `blog_content`, `summary`, `qa`.
//! Grounded operation-for-operation on the Queue Store's driver idioms
//! (`fyi_queue::store::QueueStore`) applied to three collections instead of
//! one, plus the two similarity-search paths named in §4.H.

use chrono::Utc;
use fyi_core::domain::{BlogContent, Question, Summary};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use uuid::Uuid;

use crate::document::{BlogContentDoc, QuestionDoc, SummaryDoc};
use crate::error::ArtifactError;

const BLOG_CONTENT: &str = "blog_content";
const SUMMARY: &str = "summary";
const QA: &str = "qa";

#[derive(Clone)]
pub struct ArtifactStore {
    blog_content: Collection<BlogContentDoc>,
    summary: Collection<SummaryDoc>,
    qa: Collection<QuestionDoc>,
}

pub struct SimilarBlog {
    pub blog_id: String,
    pub url: String,
    pub title: String,
    pub similarity_score: f32,
}

impl ArtifactStore {
    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            blog_content: db.collection(BLOG_CONTENT),
            summary: db.collection(SUMMARY),
            qa: db.collection(QA),
        }
    }

    pub async fn create_indexes(&self) -> Result<(), ArtifactError> {
        let url_unique = IndexModel::builder()
            .keys(doc! { "url": 1 })
            .options(IndexOptions::builder().unique(true).name("url_unique".to_string()).build())
            .build();
        self.blog_content.create_indexes(vec![url_unique]).await?;

        let blog_id_unique = IndexModel::builder()
            .keys(doc! { "blog_id": 1 })
            .options(IndexOptions::builder().unique(true).name("blog_id_unique".to_string()).build())
            .build();
        self.summary.create_indexes(vec![blog_id_unique]).await?;

        let blog_url_idx = IndexModel::builder()
            .keys(doc! { "blog_url": 1 })
            .options(IndexOptions::builder().name("blog_url_idx".to_string()).build())
            .build();
        self.qa.create_indexes(vec![blog_url_idx]).await?;

        tracing::info!("created indexes for artifact store collections");
        Ok(())
    }

    /// Upsert on `url`, matching §4.C's "upsert on URL".
    pub async fn save_blog_content(
        &self,
        url: &str,
        title: &str,
        content: &str,
        language: &str,
        word_count: u32,
        metadata: serde_json::Value,
    ) -> Result<(), ArtifactError> {
        let now = Utc::now();
        let set_doc = doc! {
            "title": title,
            "content": content,
            "language": language,
            "word_count": word_count as i32,
            "metadata": mongodb::bson::to_bson(&metadata).unwrap_or(mongodb::bson::Bson::Null),
            "updated_at": now,
        };
        self.blog_content
            .clone_with_type::<Document>()
            .update_one(
                doc! { "url": url },
                doc! {
                    "$set": set_doc,
                    "$setOnInsert": { "url": url, "triggered_no_of_times": 0i64, "created_at": now },
                },
            )
            .with_options(mongodb::options::UpdateOptions::builder().upsert(true).build())
            .await?;
        tracing::info!(url, "upserted blog content");
        Ok(())
    }

    /// Upsert on `blog_id`, matching §4.C's "upsert on blog_id".
    pub async fn save_summary(
        &self,
        blog_id: &str,
        blog_url: &str,
        summary: &str,
        key_points: &[String],
        embedding: &[f32],
    ) -> Result<(), ArtifactError> {
        let now = Utc::now();
        self.summary
            .clone_with_type::<Document>()
            .update_one(
                doc! { "blog_id": blog_id },
                doc! {
                    "$set": {
                        "blog_url": blog_url,
                        "summary": summary,
                        "key_points": key_points,
                        "embedding": embedding,
                        "updated_at": now,
                    },
                    "$setOnInsert": { "blog_id": blog_id, "created_at": now },
                },
            )
            .with_options(mongodb::options::UpdateOptions::builder().upsert(true).build())
            .await?;
        tracing::info!(blog_id, "upserted summary");
        Ok(())
    }

    /// Replace-all semantics: delete prior questions for the URL, then
    /// insert the new batch, as one logical unit (§4.C invariant).
    pub async fn save_questions(
        &self,
        blog_id: &str,
        blog_url: &str,
        questions: &[(String, String, Option<String>, Option<f32>)],
        embeddings: &[Vec<f32>],
    ) -> Result<(), ArtifactError> {
        self.qa.delete_many(doc! { "blog_url": blog_url }).await?;

        if questions.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let docs: Vec<QuestionDoc> = questions
            .iter()
            .zip(embeddings.iter())
            .map(|((question, answer, keyword_anchor, probability), embedding)| QuestionDoc {
                id: Uuid::new_v4(),
                blog_id: blog_id.to_string(),
                blog_url: blog_url.to_string(),
                question: question.clone(),
                answer: answer.clone(),
                keyword_anchor: keyword_anchor.clone(),
                probability: *probability,
                embedding: embedding.clone(),
                click_count: 0,
                last_clicked_at: None,
                created_at: now,
            })
            .collect();

        self.qa.insert_many(&docs).await?;
        tracing::info!(blog_url, inserted = docs.len(), "replaced questions");
        Ok(())
    }

    pub async fn get_blog_by_url(&self, url: &str) -> Result<Option<BlogContent>, ArtifactError> {
        let doc = self.blog_content.find_one(doc! { "url": url }).await?;
        Ok(doc.map(BlogContentDoc::into_domain))
    }

    pub async fn get_blogs_by_urls(&self, urls: &[String]) -> Result<Vec<BlogContent>, ArtifactError> {
        let mut cursor = self.blog_content.find(doc! { "url": { "$in": urls } }).await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(doc.into_domain());
        }
        Ok(out)
    }

    pub async fn get_questions_by_url(&self, blog_url: &str) -> Result<Vec<Question>, ArtifactError> {
        let mut cursor = self.qa.find(doc! { "blog_url": blog_url }).await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(doc.into_domain());
        }
        Ok(out)
    }

    pub async fn get_question_by_id(&self, id: Uuid) -> Result<Option<Question>, ArtifactError> {
        let doc = self.qa.find_one(doc! { "id": id }).await?;
        Ok(doc.map(QuestionDoc::into_domain))
    }

    pub async fn increment_question_click_count(&self, id: Uuid) -> Result<(), ArtifactError> {
        self.qa
            .update_one(
                doc! { "id": id },
                doc! { "$inc": { "click_count": 1i64 }, "$set": { "last_clicked_at": Utc::now() } },
            )
            .await?;
        Ok(())
    }

    /// Cascade delete: blog, summary, questions, matching §4.C.
    pub async fn delete_blog(&self, blog_id: &str, url: &str) -> Result<(), ArtifactError> {
        self.blog_content.delete_one(doc! { "url": url }).await?;
        self.summary.delete_one(doc! { "blog_id": blog_id }).await?;
        self.qa.delete_many(doc! { "blog_id": blog_id }).await?;
        tracing::info!(blog_id, url, "cascade deleted blog artifacts");
        Ok(())
    }

    /// Atomically increments the legacy demand counter `triggered_no_of_times`
    /// (separate from component D, per SPEC_FULL.md's Open Question #1) and
    /// returns the post-increment value. Expects `blog_content` to already
    /// hold the URL (§4.G step 2 persists it before step 3 runs).
    pub async fn increment_triggered_count(&self, url: &str) -> Result<u64, ArtifactError> {
        let result = self
            .blog_content
            .clone_with_type::<Document>()
            .find_one_and_update(
                doc! { "url": url },
                doc! { "$inc": { "triggered_no_of_times": 1i64 }, "$set": { "updated_at": Utc::now() } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;
        let count = result
            .and_then(|d| d.get_i64("triggered_no_of_times").ok())
            .unwrap_or(0);
        Ok(count as u64)
    }

    /// Provider-native vector KNN over `summary`, pre-filtered to URLs whose
    /// domain matches the owning publisher. Issued as a `$vectorSearch`
    /// aggregation stage; returns `Err` (not a typed miss) when the
    /// deployment lacks a vector index, so the caller falls back to
    /// `search_similar_fallback`.
    pub async fn search_similar_native(
        &self,
        embedding: &[f32],
        domain: &str,
        limit: u32,
    ) -> Result<Vec<SimilarBlog>, ArtifactError> {
        let pipeline = vec![
            doc! {
                "$vectorSearch": {
                    "index": "summary_embedding_index",
                    "path": "embedding",
                    "queryVector": embedding,
                    "numCandidates": (limit * 10).max(100),
                    "limit": limit,
                    "filter": { "blog_url": { "$regex": format!(".*{}.*", regex_escape(domain)) } },
                }
            },
            doc! {
                "$project": {
                    "blog_id": 1,
                    "blog_url": 1,
                    "score": { "$meta": "vectorSearchScore" },
                }
            },
        ];

        let mut cursor = self.summary.clone_with_type::<Document>().aggregate(pipeline).await?;
        let mut hits = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let blog_id = doc.get_str("blog_id").unwrap_or_default().to_string();
            let blog_url = doc.get_str("blog_url").unwrap_or_default().to_string();
            let score = doc.get_f64("score").unwrap_or(0.0) as f32;
            hits.push((blog_id, blog_url, score));
        }
        self.enrich_similar_hits(hits).await
    }

    /// In-process cosine similarity fallback, authoritative when the native
    /// path fails (§4.H).
    pub async fn search_similar_fallback(
        &self,
        embedding: &[f32],
        domain: &str,
        limit: u32,
    ) -> Result<Vec<SimilarBlog>, ArtifactError> {
        let filter = doc! { "blog_url": { "$regex": format!(".*{}.*", regex_escape(domain)) } };
        let mut cursor = self.summary.find(filter).await?;

        let mut scored: Vec<(String, String, f32)> = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let score = cosine_similarity(embedding, &doc.embedding);
            scored.push((doc.blog_id, doc.blog_url, score));
        }
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit as usize);
        self.enrich_similar_hits(scored).await
    }

    async fn enrich_similar_hits(
        &self,
        hits: Vec<(String, String, f32)>,
    ) -> Result<Vec<SimilarBlog>, ArtifactError> {
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        let urls: Vec<String> = hits.iter().map(|(_, url, _)| url.clone()).collect();
        let blogs = self.get_blogs_by_urls(&urls).await?;
        let titles: std::collections::HashMap<String, String> =
            blogs.into_iter().map(|b| (b.url, b.title)).collect();

        Ok(hits
            .into_iter()
            .map(|(blog_id, url, score)| {
                let title = titles.get(&url).cloned().unwrap_or_default();
                SimilarBlog { blog_id, url, title, similarity_score: score }
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn regex_escape_handles_dots() {
        assert_eq!(regex_escape("example.com"), "example\\.com");
    }
}
