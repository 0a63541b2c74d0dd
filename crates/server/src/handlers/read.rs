//! The public read API (§4.H, §6): check-and-load, question reads,
//! similarity search, Q&A, and publisher widget metadata. Grounded on the
//! donor's `api/ingestion/sources.rs` handler shape (`State` + `Json`,
//! store errors mapped through `From<X> for ApiError`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use fyi_core::domain::QueueStatus;
use fyi_core::envelope::Envelope;
use fyi_core::normalize::normalize_url;

use crate::auth::{authenticate_publisher, validate_domain_ownership};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BlogUrlQuery {
    pub blog_url: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckAndLoadResponse {
    Ready {
        questions: Vec<QuestionView>,
        blog: BlogView,
    },
    ThresholdNotMet {
        request_count: u64,
        threshold: u32,
    },
    Queued,
    NotStarted,
    Processing,
    Retry,
    Failed {
        last_error: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub keyword_anchor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlogView {
    pub url: String,
    pub title: String,
    pub word_count: u32,
    pub language: String,
}

/// `GET /questions/check-and-load?blog_url=…` — the fast-path endpoint,
/// implementing the 8-step algorithm of §4.H.
pub async fn check_and_load(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<BlogUrlQuery>,
) -> Result<Json<Envelope<CheckAndLoadResponse>>, ApiError> {
    let request_id = Uuid::new_v4();
    let publisher = authenticate_publisher(&state, &headers).await?;
    validate_domain_ownership(&publisher, &q.blog_url)?;

    let url = normalize_url(&q.blog_url);

    // Step 2: questions already exist → ready.
    let existing_questions = state.artifacts.get_questions_by_url(&url).await?;
    if !existing_questions.is_empty() {
        let blog = state
            .artifacts
            .get_blog_by_url(&url)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("blog content missing for {url}")))?;
        let mut questions: Vec<QuestionView> = existing_questions
            .into_iter()
            .map(|q| QuestionView {
                id: q.id,
                question: q.question,
                answer: q.answer,
                keyword_anchor: q.keyword_anchor,
            })
            .collect();
        questions.shuffle(&mut rand::thread_rng());
        let response = CheckAndLoadResponse::Ready {
            questions,
            blog: BlogView { url: blog.url, title: blog.title, word_count: blog.word_count, language: blog.language },
        };
        return Ok(Json(Envelope::ok(response, "ready", request_id)));
    }

    // Step 3: threshold gate.
    let count = state.threshold.increment_and_get_count(&url, publisher.id).await?;
    let threshold = publisher.config.threshold_before_processing_blog;
    if count <= threshold as u64 {
        let response = CheckAndLoadResponse::ThresholdNotMet { request_count: count, threshold };
        return Ok(Json(Envelope::ok(response, "threshold_not_met", request_id)));
    }

    // Step 4: admit via the queue.
    let (entry, is_new) = state
        .queue
        .atomic_get_or_create(&url, publisher.id, QueueStatus::Queued)
        .await?;

    if is_new {
        // Step 5: whitelist check, then the daily cap (§5: "daily_blog_limit
        // is checked at admission; its denominator is completed jobs for
        // the publisher's domain in the current UTC day"), then reserve a
        // slot.
        if !publisher.config.is_whitelisted(&url) {
            state.queue.delete_by_url(&url).await.ok();
            return Err(ApiError::NotWhitelisted);
        }
        if let Some(limit) = publisher.config.daily_blog_limit {
            let (start, _end) = fyi_ledger::PublisherLedger::current_utc_day_bounds();
            let domain = fyi_core::normalize::normalize_domain(&publisher.domain);
            let completed_today = state.queue.count_completed_today(&domain, start).await?;
            if completed_today >= limit as i64 {
                state.queue.delete_by_url(&url).await.ok();
                return Err(ApiError::DailyLimitExceeded(format!(
                    "publisher {} reached daily_blog_limit={limit}",
                    publisher.id
                )));
            }
        }
        if let Err(e) = fyi_ledger::PublisherLedger::reserve_blog_slot(&state.pg_pool, publisher.id).await {
            state.queue.delete_by_url(&url).await.ok();
            return Err(e.into());
        }
        return Ok(Json(Envelope::ok(CheckAndLoadResponse::NotStarted, "not_started", request_id)));
    }

    match entry.status {
        QueueStatus::Queued => Ok(Json(Envelope::ok(CheckAndLoadResponse::Queued, "queued", request_id))),
        QueueStatus::Processing => {
            Ok(Json(Envelope::ok(CheckAndLoadResponse::Processing, "processing", request_id)))
        }
        QueueStatus::Retry => Ok(Json(Envelope::ok(CheckAndLoadResponse::Retry, "retry", request_id))),
        QueueStatus::Completed => {
            // Step 7: store/queue disagreement — no questions despite
            // `completed`. `was_previously_completed` is stamped here too
            // (the entry genuinely was completed before); accounting
            // against a double-count is handled separately by
            // `completed_count`, which this transition does not touch, so
            // the worker still sees a prior genuine completion when it
            // regenerates and re-completes this URL.
            let requeued = state
                .queue
                .atomic_update_status(
                    &url,
                    Some(QueueStatus::Completed),
                    QueueStatus::Queued,
                    mongodb::bson::doc! { "attempt_count": 0i32, "was_previously_completed": true },
                )
                .await?;
            match requeued {
                Some(_) => Ok(Json(Envelope::ok(CheckAndLoadResponse::Queued, "queued", request_id))),
                None => {
                    let current = state
                        .queue
                        .get_by_url(&url)
                        .await?
                        .ok_or_else(|| ApiError::NotFound(url.clone()))?;
                    Ok(Json(Envelope::ok(status_response(current.status), "status", request_id)))
                }
            }
        }
        QueueStatus::Failed => {
            // Step 8: auto-requeue a failed entry.
            let requeued = state.queue.atomic_requeue_failed(&url, true).await?;
            match requeued {
                Some(_) => {
                    if let Err(e) =
                        fyi_ledger::PublisherLedger::reserve_blog_slot(&state.pg_pool, publisher.id).await
                    {
                        state
                            .queue
                            .atomic_update_status(&url, Some(QueueStatus::Queued), QueueStatus::Failed, mongodb::bson::doc! {})
                            .await
                            .ok();
                        return Err(e.into());
                    }
                    Ok(Json(Envelope::ok(CheckAndLoadResponse::Queued, "queued", request_id)))
                }
                None => Ok(Json(Envelope::ok(
                    CheckAndLoadResponse::Failed { last_error: entry.last_error },
                    "failed",
                    request_id,
                ))),
            }
        }
    }
}

fn status_response(status: QueueStatus) -> CheckAndLoadResponse {
    match status {
        QueueStatus::Queued => CheckAndLoadResponse::Queued,
        QueueStatus::Processing => CheckAndLoadResponse::Processing,
        QueueStatus::Retry => CheckAndLoadResponse::Retry,
        QueueStatus::Completed => CheckAndLoadResponse::NotStarted,
        QueueStatus::Failed => CheckAndLoadResponse::Failed { last_error: None },
    }
}

/// `GET /questions/by-url?blog_url=…`
pub async fn questions_by_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<BlogUrlQuery>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let request_id = Uuid::new_v4();
    let publisher = authenticate_publisher(&state, &headers).await?;
    validate_domain_ownership(&publisher, &q.blog_url)?;
    let url = normalize_url(&q.blog_url);

    let mut questions = state.artifacts.get_questions_by_url(&url).await?;
    if questions.is_empty() {
        return Err(ApiError::NotFound(format!("no questions for {url}")));
    }
    questions.shuffle(&mut rand::thread_rng());
    let blog = state.artifacts.get_blog_by_url(&url).await?;

    let payload = json!({
        "blog": blog.map(|b| json!({ "url": b.url, "title": b.title, "word_count": b.word_count })),
        "questions": questions.into_iter().map(|q| json!({
            "id": q.id,
            "question": q.question,
            "answer": q.answer,
            "keyword_anchor": q.keyword_anchor,
        })).collect::<Vec<_>>(),
    });
    Ok(Json(Envelope::ok(payload, "ready", request_id)))
}

/// `GET /questions/{question_id}` — sans `embedding`, `click_count`,
/// `last_clicked_at` (§6).
pub async fn question_by_id(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let request_id = Uuid::new_v4();
    authenticate_publisher(&state, &headers).await?;

    let question = state
        .artifacts
        .get_question_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("question {id} not found")))?;

    let payload = json!({
        "id": question.id,
        "blog_url": question.blog_url,
        "question": question.question,
        "answer": question.answer,
        "keyword_anchor": question.keyword_anchor,
        "probability": question.probability,
    });
    Ok(Json(Envelope::ok(payload, "ok", request_id)))
}

#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    pub question_id: Uuid,
    #[serde(default = "default_similar_limit")]
    pub limit: u32,
}

fn default_similar_limit() -> u32 {
    5
}

/// `POST /search/similar` — native vector KNN first, falling back to the
/// in-process cosine path on failure (§4.H). Increments the seed question's
/// click counter on every call.
pub async fn search_similar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SimilarRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let request_id = Uuid::new_v4();
    let publisher = authenticate_publisher(&state, &headers).await?;

    let question = state
        .artifacts
        .get_question_by_id(req.question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("question {} not found", req.question_id)))?;

    state.artifacts.increment_question_click_count(req.question_id).await?;

    let domain = fyi_core::normalize::normalize_domain(&publisher.domain);
    let hits = match state.artifacts.search_similar_native(&question.embedding, &domain, req.limit).await {
        Ok(hits) if !hits.is_empty() => hits,
        _ => state.artifacts.search_similar_fallback(&question.embedding, &domain, req.limit).await?,
    };

    let payload = json!({
        "results": hits.into_iter().map(|h| json!({
            "blog_id": h.blog_id,
            "url": h.url,
            "title": h.title,
            "similarity_score": h.similarity_score,
        })).collect::<Vec<_>>(),
    });
    Ok(Json(Envelope::ok(payload, "ok", request_id)))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// `POST /qa/ask` — max_tokens capped at 350 inside the orchestrator (§6).
pub async fn qa_ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let request_id = Uuid::new_v4();
    let publisher = authenticate_publisher(&state, &headers).await?;
    let config = &publisher.config;

    let answer = state
        .llm
        .answer_question(
            &req.question,
            None,
            &config.chat_model,
            config.chat_temperature,
            config.chat_max_tokens,
            config.use_grounding,
        )
        .await?;

    Ok(Json(Envelope::ok(json!({ "answer": answer }), "ok", request_id)))
}

#[derive(Debug, Deserialize)]
pub struct PublisherMetadataQuery {
    pub blog_url: String,
    #[serde(default, rename = "adVariation")]
    pub ad_variation: Option<String>,
}

/// `GET /publishers/metadata?blog_url=…&adVariation=…` — the widget
/// sub-config, with only the requested ad variation populated (§6).
pub async fn publisher_metadata(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<PublisherMetadataQuery>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let request_id = Uuid::new_v4();
    let publisher = authenticate_publisher(&state, &headers).await?;
    validate_domain_ownership(&publisher, &q.blog_url)?;

    let mut widget = publisher.config.widget.clone();
    if let Some(obj) = widget.as_object_mut() {
        if let Some(variations) = obj.get("ad_variations").and_then(|v| v.as_object()).cloned() {
            let requested = q.ad_variation.as_deref();
            let narrowed: serde_json::Map<String, serde_json::Value> = variations
                .into_iter()
                .map(|(k, v)| {
                    if Some(k.as_str()) == requested {
                        (k, v)
                    } else {
                        (k, serde_json::Value::Null)
                    }
                })
                .collect();
            obj.insert("ad_variations".to_string(), serde_json::Value::Object(narrowed));
        }
    }

    Ok(Json(Envelope::ok(widget, "ok", request_id)))
}
