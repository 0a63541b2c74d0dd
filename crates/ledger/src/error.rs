use uuid::Uuid;

/// Errors from Publisher Ledger operations.
///
/// Grounded on `IngestionStoreError` (donor
/// `crates/server/src/ingestion/source_store.rs`): a plain enum with a
/// hand-rolled `Display` and a `status_code()` mapping, rather than
/// `thiserror`, because several variants need the looked-up identifier
/// formatted into the message.
#[derive(Debug)]
pub enum LedgerError {
    NotFound(Uuid),
    DomainNotFound(String),
    DuplicateDomain(String),
    DuplicateApiKey,
    /// `reserve_blog_slot` found `total_blogs_processed + blog_slots_reserved
    /// >= max_total_blogs`.
    UsageLimitExceeded { publisher_id: Uuid, limit: i64 },
    Database(sqlx::Error),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "publisher not found: {id}"),
            Self::DomainNotFound(domain) => write!(f, "no publisher registered for domain: {domain}"),
            Self::DuplicateDomain(domain) => write!(f, "a publisher already exists for domain: {domain}"),
            Self::DuplicateApiKey => write!(f, "api key collision, retry regeneration"),
            Self::UsageLimitExceeded { publisher_id, limit } => write!(
                f,
                "publisher {publisher_id} has reached its lifetime blog limit of {limit}"
            ),
            Self::Database(e) => write!(f, "ledger database error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

impl LedgerError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::DomainNotFound(_) => 404,
            Self::DuplicateDomain(_) | Self::DuplicateApiKey => 409,
            Self::UsageLimitExceeded { .. } => 403,
            Self::Database(_) => 500,
        }
    }
}

/// Map a PostgreSQL unique violation (23505) on `domain` or `api_key` to a
/// friendly variant; anything else passes through as `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, domain: &str) -> LedgerError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("");
            if constraint.contains("api_key") {
                return LedgerError::DuplicateApiKey;
            }
            return LedgerError::DuplicateDomain(domain.to_string());
        }
    }
    tracing::error!("publisher ledger database error: {e}");
    LedgerError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_is_404() {
        let id = Uuid::new_v4();
        let err = LedgerError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn usage_limit_status_is_403() {
        let err = LedgerError::UsageLimitExceeded {
            publisher_id: Uuid::new_v4(),
            limit: 100,
        };
        assert!(err.to_string().contains("100"));
        assert_eq!(err.status_code(), 403);
    }
}
