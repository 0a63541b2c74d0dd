//! Threshold Counter (component D): per-(publisher, URL) demand gauge
//! consulted before work is admitted. Grounded on
//! `threshold_service.py::increment_and_get_threshold_count`, storing one
//! document per `(url, publisher_id)` pair in a dedicated collection
//! separate from `blog_content.triggered_no_of_times` (§9 Design Notes).

use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Client, Collection};
use uuid::Uuid;

use crate::document::ThresholdDoc;
use crate::error::QueueError;

const COLLECTION: &str = "blog_processing_threshold";

#[derive(Clone)]
pub struct ThresholdCounter {
    collection: Collection<ThresholdDoc>,
}

impl ThresholdCounter {
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            collection: client.database(database).collection(COLLECTION),
        }
    }

    pub async fn create_indexes(&self) -> Result<(), QueueError> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;
        let unique = IndexModel::builder()
            .keys(doc! { "url": 1, "publisher_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("url_publisher_unique".to_string())
                    .build(),
            )
            .build();
        self.collection.create_indexes(vec![unique]).await?;
        Ok(())
    }

    /// Atomic upsert returning the post-increment value. The sole operation
    /// consulted by the fast path before any admission decision; a URL with
    /// config threshold N is admitted on the request whose post-increment
    /// value equals N+1.
    pub async fn increment_and_get_count(&self, url: &str, publisher_id: Uuid) -> Result<u64, QueueError> {
        let now = Utc::now();
        let result = self
            .collection
            .find_one_and_update(
                doc! { "url": url, "publisher_id": publisher_id },
                doc! {
                    "$inc": { "request_count": 1i64 },
                    "$set": { "updated_at": now },
                    "$setOnInsert": { "created_at": now },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        let count = result.map(|d| d.request_count).unwrap_or(1);
        tracing::debug!(url, %publisher_id, count, "threshold counter incremented");
        Ok(count)
    }
}
