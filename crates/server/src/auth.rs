//! Publisher api-key and admin-key extraction. Grounded on the donor's
//! `require_pg` extractor-helper pattern (`api/ingestion/sources.rs`):
//! a plain function called at the top of each handler rather than a
//! `FromRequestParts` impl, since only a handful of routes need it.

use axum::http::HeaderMap;
use fyi_core::domain::Publisher;
use fyi_ledger::PublisherLedger;

use crate::error::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::AuthRequired)
}

pub async fn authenticate_publisher(state: &AppState, headers: &HeaderMap) -> Result<Publisher, ApiError> {
    let api_key = extract_api_key(headers)?;
    PublisherLedger::get_by_api_key(&state.pg_pool, api_key)
        .await?
        .ok_or(ApiError::AuthRequired)
}

pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::AuthRequired)?;
    if state.admin_key_matches(provided) {
        Ok(())
    } else {
        Err(ApiError::AuthRequired)
    }
}

/// Validates that `blog_url`'s domain matches the publisher's domain or a
/// registered suffix thereof (§4.A, §6).
pub fn validate_domain_ownership(publisher: &Publisher, blog_url: &str) -> Result<(), ApiError> {
    let host = url::Url::parse(blog_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| ApiError::Validation("blog_url is not a valid url".to_string()))?;

    let normalized_host = fyi_core::normalize::normalize_domain(&host);
    let publisher_domain = fyi_core::normalize::normalize_domain(&publisher.domain);

    let matches = normalized_host == publisher_domain
        || normalized_host.ends_with(&format!(".{publisher_domain}"));
    if matches {
        Ok(())
    } else {
        Err(ApiError::DomainMismatch)
    }
}
