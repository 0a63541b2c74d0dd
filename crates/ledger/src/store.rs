//! Publisher Ledger (component A): the relational source of truth for
//! publisher identity, configuration, and quota accounting.
//!
//! Stateless unit struct with async methods taking `&PgPool`, matching the
//! donor's `IngestionSourceStore` convention. Grounded operation-for-operation
//! on `publisher_repository.py`'s `PublisherRepository`.

use base64::Engine;
use chrono::Utc;
use fyi_core::domain::{Publisher, PublisherConfig, PublisherStatus};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{map_unique_violation, LedgerError};
use crate::row::{status_str, PublisherRow};

const SELECT_COLUMNS: &str = "id, name, domain, email, api_key, status, config, \
    total_blogs_processed, total_questions_generated, blog_slots_reserved, \
    subscription_tier, created_at, updated_at, last_active_at";

#[derive(Debug, Deserialize)]
pub struct CreatePublisher {
    pub name: String,
    pub domain: String,
    pub email: Option<String>,
    #[serde(default)]
    pub config: PublisherConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePublisher {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<PublisherStatus>,
    /// A *patch* merged onto the existing config, not a full replacement.
    /// Mirrors `update_publisher`'s merge behavior, including the special
    /// case that preserves `widget` when the patch omits it.
    pub config_patch: Option<serde_json::Value>,
}

pub struct PublisherLedger;

impl PublisherLedger {
    /// `pub_<43-char urlsafe token>`, matching
    /// `publisher_repository.py::_generate_api_key`.
    pub fn generate_api_key() -> String {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        format!("pub_{token}")
    }

    pub async fn create(pool: &PgPool, req: CreatePublisher) -> Result<Publisher, LedgerError> {
        let domain = fyi_core::normalize::normalize_domain(&req.domain);
        let api_key = Self::generate_api_key();
        let config = serde_json::to_value(&req.config).unwrap_or_default();

        let sql = format!(
            "INSERT INTO publishers (name, domain, email, api_key, status, config)
             VALUES ($1, $2, $3, $4, 'trial', $5)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(&req.name)
            .bind(&domain)
            .bind(&req.email)
            .bind(&api_key)
            .bind(&config)
            .fetch_one(pool)
            .await
            .map_err(|e| map_unique_violation(e, &domain))?;

        Ok(row.into_domain())
    }

    pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Publisher>, LedgerError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM publishers WHERE id = $1");
        let row = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(PublisherRow::into_domain))
    }

    /// Exact-domain match, then (if `allow_subdomain`) a shortest-suffix
    /// match over every registered domain. Grounded on
    /// `get_publisher_by_domain(domain, allow_subdomain=True)`.
    pub async fn get_by_domain(
        pool: &PgPool,
        domain: &str,
        allow_subdomain: bool,
    ) -> Result<Option<Publisher>, LedgerError> {
        let normalized = fyi_core::normalize::normalize_domain(domain);

        let sql = format!("SELECT {SELECT_COLUMNS} FROM publishers WHERE domain = $1");
        if let Some(row) = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(&normalized)
            .fetch_optional(pool)
            .await?
        {
            return Ok(Some(row.into_domain()));
        }

        if !allow_subdomain {
            return Ok(None);
        }

        let pairs: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, domain FROM publishers")
                .fetch_all(pool)
                .await?;
        let domains: Vec<String> = pairs.iter().map(|(_, d)| d.clone()).collect();
        let Some(idx) = fyi_core::normalize::match_domain_suffix(&normalized, &domains) else {
            return Ok(None);
        };
        let (id, _) = &pairs[idx];
        Self::get_by_id(pool, *id).await
    }

    /// Also stamps `last_active_at`, matching `get_publisher_by_api_key`.
    pub async fn get_by_api_key(
        pool: &PgPool,
        api_key: &str,
    ) -> Result<Option<Publisher>, LedgerError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM publishers WHERE api_key = $1");
        let row = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(api_key)
            .fetch_optional(pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let id = row.id;
        sqlx::query("UPDATE publishers SET last_active_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(Some(row.into_domain()))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: UpdatePublisher,
    ) -> Result<Publisher, LedgerError> {
        let existing = Self::get_by_id(pool, id).await?.ok_or(LedgerError::NotFound(id))?;

        let merged_config = match req.config_patch {
            Some(mut patch) => {
                let mut base = serde_json::to_value(&existing.config).unwrap_or_default();
                if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object_mut()) {
                    // Preserve `widget` unless the patch explicitly supplies it.
                    if !patch_obj.contains_key("widget") {
                        if let Some(widget) = base_obj.get("widget").cloned() {
                            patch_obj.insert("widget".to_string(), widget);
                        }
                    }
                    for (k, v) in patch_obj.iter() {
                        base_obj.insert(k.clone(), v.clone());
                    }
                }
                base
            }
            None => serde_json::to_value(&existing.config).unwrap_or_default(),
        };

        let status = req.status.map(status_str);

        let sql = format!(
            "UPDATE publishers SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                status = COALESCE($4, status),
                config = $5,
                updated_at = now()
             WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(id)
            .bind(&req.name)
            .bind(&req.email)
            .bind(status)
            .bind(&merged_config)
            .fetch_optional(pool)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        Ok(row.into_domain())
    }

    /// Soft-delete: transitions status to `inactive` rather than removing
    /// the row, matching §3's "soft-deleted (status transition)".
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE publishers SET status = 'inactive', updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    /// Invalidates the previous key immediately: the column is simply
    /// overwritten, so any request bearing the old key fails lookup from
    /// this point forward.
    pub async fn regenerate_api_key(pool: &PgPool, id: Uuid) -> Result<Publisher, LedgerError> {
        let new_key = Self::generate_api_key();
        let sql = format!(
            "UPDATE publishers SET api_key = $2, updated_at = now() WHERE id = $1 RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(id)
            .bind(&new_key)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_unique_violation(e, ""))?
            .ok_or(LedgerError::NotFound(id))?;
        Ok(row.into_domain())
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<PublisherStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Publisher>, i64), LedgerError> {
        let offset = (page.max(1) - 1) * page_size;
        let status_str = status.map(status_str);

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM publishers
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PublisherRow>(&sql)
            .bind(status_str)
            .bind(page_size)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM publishers WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status_str)
        .fetch_one(pool)
        .await?;

        Ok((rows.into_iter().map(PublisherRow::into_domain).collect(), total))
    }

    /// Slot reservation (§4.A): under a row-level exclusive lock,
    ///   1. read `max_total_blogs`; null => success, no side effects.
    ///   2. if `total_blogs_processed + blog_slots_reserved >= max_total_blogs`,
    ///      fail with `UsageLimitExceeded`.
    ///   3. otherwise increment `blog_slots_reserved` and commit.
    pub async fn reserve_blog_slot(pool: &PgPool, publisher_id: Uuid) -> Result<(), LedgerError> {
        let mut tx = pool.begin().await?;

        let row: Option<(serde_json::Value, i64, i64)> = sqlx::query_as(
            "SELECT config, total_blogs_processed, blog_slots_reserved
             FROM publishers WHERE id = $1 FOR UPDATE",
        )
        .bind(publisher_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((config, processed, reserved)) = row else {
            tx.rollback().await.ok();
            return Err(LedgerError::NotFound(publisher_id));
        };

        let max_total_blogs: Option<i64> = config
            .get("max_total_blogs")
            .and_then(|v| v.as_i64());

        let Some(limit) = max_total_blogs else {
            tx.commit().await?;
            return Ok(());
        };

        if processed + reserved >= limit {
            tx.rollback().await.ok();
            return Err(LedgerError::UsageLimitExceeded { publisher_id, limit });
        }

        sqlx::query(
            "UPDATE publishers SET blog_slots_reserved = blog_slots_reserved + 1,
                last_active_at = now() WHERE id = $1",
        )
        .bind(publisher_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Slot release (§4.A): a single atomic UPDATE. `blog_slots_reserved`
    /// is decremented via `CASE WHEN ... > 0 THEN ... - 1 ELSE 0 END` to
    /// avoid underflow; `processed=true` additionally bumps
    /// `total_blogs_processed` and `total_questions_generated` in the same
    /// statement. This is the atomic form specified in §9 Open Questions
    /// resolution #2 — the legacy read-modify-write form is not
    /// implemented anywhere in this crate.
    pub async fn release_blog_slot(
        pool: &PgPool,
        publisher_id: Uuid,
        processed: bool,
        questions_generated: i64,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE publishers SET
                blog_slots_reserved = CASE WHEN blog_slots_reserved > 0
                    THEN blog_slots_reserved - 1 ELSE 0 END,
                total_blogs_processed = total_blogs_processed + CASE WHEN $2 THEN 1 ELSE 0 END,
                total_questions_generated = total_questions_generated + CASE WHEN $2 THEN $3 ELSE 0 END,
                updated_at = now()
             WHERE id = $1",
        )
        .bind(publisher_id)
        .bind(processed)
        .bind(questions_generated)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%publisher_id, "release_blog_slot: publisher not found, nothing to release");
        }
        Ok(())
    }

    /// Denominator for `daily_blog_limit`: completed jobs for the
    /// publisher in the current UTC day, counted from the Queue Store by
    /// the caller (this crate only knows about publishers). Exposed here
    /// for symmetry; callers typically use `fyi_queue::QueueStore::
    /// count_completed_today` directly.
    pub fn current_utc_day_bounds() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let now = Utc::now();
        let start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end = start + chrono::Duration::days(1);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_api_key_has_prefix() {
        let key = PublisherLedger::generate_api_key();
        assert!(key.starts_with("pub_"));
        assert!(key.len() > 40);
    }

    #[test]
    fn two_generated_keys_differ() {
        assert_ne!(
            PublisherLedger::generate_api_key(),
            PublisherLedger::generate_api_key()
        );
    }

    #[test]
    fn create_publisher_deserializes_with_default_config() {
        let json = r#"{"name":"Acme","domain":"acme.com"}"#;
        let req: CreatePublisher = serde_json::from_str(json).unwrap();
        assert_eq!(req.config.questions_per_blog, 5);
    }

    #[test]
    fn update_publisher_all_optional() {
        let req: UpdatePublisher = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_none());
        assert!(req.config_patch.is_none());
    }
}
