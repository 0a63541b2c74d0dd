//! The uniform response envelope required by spec §6: every API response
//! carries `status`, `status_code`, `message`, and either `result` or
//! `error`, plus a stamped `request_id` and UTC `timestamp`. There is no
//! precedent for this exact shape in the donor crate (its handlers return
//! ad hoc `serde_json::Value`, see `api/ingestion/jobs.rs::job_to_json`);
//! this module formalizes it as a typed wrapper so handlers build one value
//! instead of assembling JSON by hand.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::ErrorCode;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeError {
    pub code: ErrorCode,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: EnvelopeStatus,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(result: T, message: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            status_code: 200,
            message: message.into(),
            result: Some(result),
            error: None,
            metadata: None,
            request_id,
            timestamp: Utc::now(),
        }
    }

    pub fn ok_with_metadata(
        result: T,
        message: impl Into<String>,
        metadata: serde_json::Value,
        request_id: Uuid,
    ) -> Self {
        let mut env = Self::ok(result, message, request_id);
        env.metadata = Some(metadata);
        env
    }
}

impl Envelope<()> {
    pub fn err(code: ErrorCode, detail: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            status_code: code.http_status(),
            message: "request failed".to_string(),
            result: None,
            error: Some(EnvelopeError {
                code,
                detail: detail.into(),
                field: None,
            }),
            metadata: None,
            request_id,
            timestamp: Utc::now(),
        }
    }

    pub fn err_field(
        code: ErrorCode,
        detail: impl Into<String>,
        field: impl Into<String>,
        request_id: Uuid,
    ) -> Self {
        let mut env = Self::err(code, detail, request_id);
        if let Some(e) = env.error.as_mut() {
            e.field = Some(field.into());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_has_no_error() {
        let env = Envelope::ok(serde_json::json!({"a": 1}), "ok", Uuid::new_v4());
        assert!(env.error.is_none());
        assert!(env.result.is_some());
        assert_eq!(env.status_code, 200);
    }

    #[test]
    fn err_envelope_has_no_result() {
        let env: Envelope<()> = Envelope::err(ErrorCode::NotFound, "missing", Uuid::new_v4());
        assert!(env.result.is_none());
        assert!(env.error.is_some());
        assert_eq!(env.status_code, 404);
    }
}
