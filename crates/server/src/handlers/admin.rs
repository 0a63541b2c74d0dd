//! The admin API (§6): publisher CRUD/key rotation, reprocess, queue
//! stats, job status, and cascade delete. Every handler calls
//! `auth::require_admin` first. Grounded on the donor's
//! `api/ingestion/sources.rs` CRUD handler shape, generalized from one
//! collection of "sources" to the publisher ledger.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use fyi_core::domain::{PublisherStatus, QueueStatus};
use fyi_core::envelope::Envelope;
use fyi_core::normalize::normalize_url;
use fyi_ledger::{CreatePublisher, PublisherLedger, UpdatePublisher};

use crate::auth::require_admin;
use crate::error::ApiError;
use crate::state::AppState;

fn request_id() -> Uuid {
    Uuid::new_v4()
}

/// `POST /admin/publishers`
pub async fn create_publisher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreatePublisher>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let publisher = PublisherLedger::create(&state.pg_pool, req).await?;
    Ok(Json(Envelope::ok(publisher_json(&publisher), "publisher created", request_id())))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<PublisherStatus>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

/// `GET /admin/publishers`
pub async fn list_publishers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let (publishers, total) =
        PublisherLedger::list(&state.pg_pool, q.status, q.page, q.page_size).await?;
    let payload = json!({
        "publishers": publishers.iter().map(publisher_json).collect::<Vec<_>>(),
        "total": total,
        "page": q.page,
        "page_size": q.page_size,
    });
    Ok(Json(Envelope::ok(payload, "ok", request_id())))
}

/// `GET /admin/publishers/{id}`
pub async fn get_publisher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let publisher = PublisherLedger::get_by_id(&state.pg_pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("publisher {id} not found")))?;
    Ok(Json(Envelope::ok(publisher_json(&publisher), "ok", request_id())))
}

/// `PATCH /admin/publishers/{id}`
pub async fn update_publisher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePublisher>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let publisher = PublisherLedger::update(&state.pg_pool, id, req).await?;
    Ok(Json(Envelope::ok(publisher_json(&publisher), "publisher updated", request_id())))
}

/// `DELETE /admin/publishers/{id}` — soft delete (status -> inactive).
pub async fn delete_publisher(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    PublisherLedger::delete(&state.pg_pool, id).await?;
    Ok(Json(Envelope::ok(json!({ "id": id }), "publisher deactivated", request_id())))
}

/// `POST /admin/publishers/{id}/rotate-key`
pub async fn regenerate_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let publisher = PublisherLedger::regenerate_api_key(&state.pg_pool, id).await?;
    Ok(Json(Envelope::ok(publisher_json(&publisher), "api key rotated", request_id())))
}

#[derive(Debug, Deserialize)]
pub struct ReprocessRequest {
    pub blog_url: String,
    pub publisher_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /admin/reprocess` (§6, scenario f): 200 if the entry was
/// `completed`/`failed`, 409 (`QUEUE_CONFLICT`) if it is `queued|
/// processing|retry`, 404 if unknown. Does not alter
/// `total_blogs_processed` (no double-counting): the worker's terminal
/// transition is solely responsible for that increment.
pub async fn reprocess(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ReprocessRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let url = normalize_url(&req.blog_url);

    let entry = state
        .queue
        .get_by_url(&url)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no queue entry for {url}")))?;

    match entry.status {
        QueueStatus::Queued | QueueStatus::Processing | QueueStatus::Retry => Err(ApiError::QueueConflict(format!(
            "cannot reprocess {url}: currently {}",
            entry.status.as_str()
        ))),
        QueueStatus::Completed => {
            let updated = state
                .queue
                .atomic_reprocess_completed(&url)
                .await?
                .ok_or_else(|| ApiError::QueueConflict(format!("{url} changed state concurrently")))?;
            tracing::info!(url, reason = ?req.reason, "admin reprocess of completed entry");
            Ok(Json(Envelope::ok(
                json!({ "url": updated.url, "status": updated.status.as_str() }),
                "reprocess scheduled",
                request_id(),
            )))
        }
        QueueStatus::Failed => {
            let updated = state
                .queue
                .atomic_requeue_failed(&url, true)
                .await?
                .ok_or_else(|| ApiError::QueueConflict(format!("{url} changed state concurrently")))?;
            tracing::info!(url, reason = ?req.reason, "admin reprocess of failed entry");
            Ok(Json(Envelope::ok(
                json!({ "url": updated.url, "status": updated.status.as_str() }),
                "reprocess scheduled",
                request_id(),
            )))
        }
    }
}

/// `GET /admin/queue-stats`
pub async fn queue_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let stats = state.queue.get_stats().await?;
    Ok(Json(Envelope::ok(json!(stats), "ok", request_id())))
}

#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    pub url: String,
}

/// `GET /admin/jobs/status?url=…` — the full queue entry document.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<JobStatusQuery>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    let url = normalize_url(&q.url);
    let entry = state
        .queue
        .get_by_url(&url)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no queue entry for {url}")))?;
    Ok(Json(Envelope::ok(serde_json::to_value(&entry).unwrap_or_default(), "ok", request_id())))
}

/// `GET /admin/metrics` — the worker's lock-free counters (§9
/// Supplemented Features, `fyi_pipeline::Metrics`), exposed here rather
/// than as a Prometheus exporter since §1 scopes detailed observability
/// plumbing out.
pub async fn worker_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(Envelope::ok(state.metrics.snapshot(), "ok", request_id())))
}

/// `DELETE /questions/{blog_id}` — cascade delete of content, summary,
/// questions (§6, §4.C).
pub async fn delete_blog(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(blog_id): Path<String>,
    Query(q): Query<DeleteBlogQuery>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    require_admin(&state, &headers)?;
    state.artifacts.delete_blog(&blog_id, &q.url).await?;
    Ok(Json(Envelope::ok(json!({ "blog_id": blog_id }), "blog deleted", request_id())))
}

#[derive(Debug, Deserialize)]
pub struct DeleteBlogQuery {
    pub url: String,
}

#[derive(Serialize)]
struct PublisherJson<'a> {
    id: Uuid,
    name: &'a str,
    domain: &'a str,
    email: &'a Option<String>,
    api_key: &'a str,
    status: PublisherStatus,
    config: &'a fyi_core::domain::PublisherConfig,
    total_blogs_processed: i64,
    total_questions_generated: i64,
    blog_slots_reserved: i64,
    subscription_tier: &'a str,
}

fn publisher_json(p: &fyi_core::domain::Publisher) -> serde_json::Value {
    json!(PublisherJson {
        id: p.id,
        name: &p.name,
        domain: &p.domain,
        email: &p.email,
        api_key: &p.api_key,
        status: p.status,
        config: &p.config,
        total_blogs_processed: p.total_blogs_processed,
        total_questions_generated: p.total_questions_generated,
        blog_slots_reserved: p.blog_slots_reserved,
        subscription_tier: &p.subscription_tier,
    })
}
