pub mod error;
pub mod row;
pub mod store;

pub use error::LedgerError;
pub use store::{CreatePublisher, PublisherLedger, UpdatePublisher};

/// Run the embedded migrations against `pool`. Mirrors the donor's
/// `db.rs::init_pg_pool` invocation of `sqlx::migrate!`.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
