//! Queue Store (component B): pure data-access surface over
//! `blog_processing_queue`, no domain knowledge. Grounded
//! operation-for-operation on `blog_processing_queue_repository.py`'s
//! `BlogProcessingQueueRepository`.

use std::collections::HashMap;

use chrono::Utc;
use fyi_core::domain::{QueueEntry, QueueStatus};
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use uuid::Uuid;

use crate::document::{parse_status, status_str, QueueEntryDoc};
use crate::error::QueueError;

const COLLECTION: &str = "blog_processing_queue";

#[derive(Clone)]
pub struct QueueStore {
    collection: Collection<QueueEntryDoc>,
}

impl QueueStore {
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            collection: client.database(database).collection(COLLECTION),
        }
    }

    /// Creates the indexes named in §4.B: unique `{url}`, worker-poll
    /// `{status, created_at}`, stall-monitor `{status, heartbeat_at}`,
    /// tenant-scan `{publisher_id, status}`.
    pub async fn create_indexes(&self) -> Result<(), QueueError> {
        let url_unique = IndexModel::builder()
            .keys(doc! { "url": 1 })
            .options(IndexOptions::builder().unique(true).name("url_unique".to_string()).build())
            .build();
        let worker_poll = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": 1 })
            .options(IndexOptions::builder().name("worker_poll_idx".to_string()).build())
            .build();
        let heartbeat_monitor = IndexModel::builder()
            .keys(doc! { "status": 1, "heartbeat_at": 1 })
            .options(IndexOptions::builder().name("heartbeat_monitor_idx".to_string()).build())
            .build();
        let publisher_status = IndexModel::builder()
            .keys(doc! { "publisher_id": 1, "status": 1 })
            .options(IndexOptions::builder().name("publisher_status_idx".to_string()).build())
            .build();

        self.collection
            .create_indexes(vec![url_unique, worker_poll, heartbeat_monitor, publisher_status])
            .await?;
        tracing::info!("created indexes for {COLLECTION}");
        Ok(())
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<QueueEntry>, QueueError> {
        let doc = self.collection.find_one(doc! { "url": url }).await?;
        Ok(doc.map(QueueEntryDoc::into_domain))
    }

    /// Returns `(entry, is_new)`. Relies on the unique index on `url`: on a
    /// duplicate-key error the racing caller re-reads and returns the
    /// winner's document, so `is_new=true` is emitted exactly once per URL.
    pub async fn atomic_get_or_create(
        &self,
        url: &str,
        publisher_id: Uuid,
        initial_status: QueueStatus,
    ) -> Result<(QueueEntry, bool), QueueError> {
        let mut new_doc = QueueEntryDoc::new_queued(url.to_string(), publisher_id);
        new_doc.status = status_str(initial_status).to_string();

        match self.collection.insert_one(&new_doc).await {
            Ok(_) => {
                tracing::info!(url, "created new queue entry");
                Ok((new_doc.into_domain(), true))
            }
            Err(e) if is_duplicate_key(&e) => {
                let existing = self
                    .get_by_url(url)
                    .await?
                    .ok_or_else(|| QueueError::NotFound(url.to_string()))?;
                tracing::info!(url, status = existing.status.as_str(), "queue entry already exists");
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Compare-and-set on `status`; the sole primitive for any transition
    /// outside worker pick-up. `from_status = None` matches any status.
    pub async fn atomic_update_status(
        &self,
        url: &str,
        from_status: Option<QueueStatus>,
        to_status: QueueStatus,
        extra: Document,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let mut query = doc! { "url": url };
        if let Some(from) = from_status {
            query.insert("status", status_str(from));
        }

        let mut set_doc = doc! {
            "status": status_str(to_status),
            "updated_at": Utc::now(),
        };
        set_doc.extend(extra);

        let result = self
            .collection
            .find_one_and_update(query, doc! { "$set": set_doc })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        if result.is_none() {
            tracing::warn!(
                url,
                from = ?from_status.map(status_str),
                to = status_str(to_status),
                "atomic_update_status: compare-and-set lost the race"
            );
        }
        Ok(result.map(QueueEntryDoc::into_domain))
    }

    /// The step-8 terminal transition (§4.G): compare-and-set
    /// `processing → completed` and atomically increment `completed_count`
    /// in the same `find_one_and_update`, so the pre-increment value read
    /// off the *picked* job (before this call) is race-free evidence of
    /// whether a prior genuine completion happened for this URL. This is
    /// the sole place `completed_count` is incremented — the threshold-skip
    /// completion in step 3 uses plain `atomic_update_status` and never
    /// touches it, since a skip is not a genuine completion.
    pub async fn atomic_complete(&self, url: &str, extra: Document) -> Result<Option<QueueEntry>, QueueError> {
        let mut set_doc = doc! {
            "status": status_str(QueueStatus::Completed),
            "updated_at": Utc::now(),
        };
        set_doc.extend(extra);

        let result = self
            .collection
            .find_one_and_update(
                doc! { "url": url, "status": status_str(QueueStatus::Processing) },
                doc! { "$set": set_doc, "$inc": { "completed_count": 1i32 } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        if result.is_none() {
            tracing::warn!(url, "atomic_complete: compare-and-set lost the race");
        }
        Ok(result.map(QueueEntryDoc::into_domain))
    }

    /// Compare-and-set from `failed` to `queued`, clearing worker/error
    /// fields. `reset_attempts` zeroes `attempt_count` and bumps
    /// `reprocessed_count`, matching `atomic_requeue_failed`. Does NOT set
    /// `was_previously_completed`: a `failed` entry was never completed, so
    /// stamping that audit flag here would be wrong, and — before
    /// `completed_count` existed to gate step 8's processed-accounting —
    /// caused a requeued-after-failure URL's first genuine completion to be
    /// released with `processed=false`, permanently losing the publisher's
    /// credit for it. The original `atomic_requeue_failed` does not set
    /// this field either.
    pub async fn atomic_requeue_failed(
        &self,
        url: &str,
        reset_attempts: bool,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let now = Utc::now();
        let mut set_doc = doc! {
            "status": status_str(QueueStatus::Queued),
            "updated_at": now,
            "last_error": mongodb::bson::Bson::Null,
            "error_type": mongodb::bson::Bson::Null,
            "started_at": mongodb::bson::Bson::Null,
            "completed_at": mongodb::bson::Bson::Null,
            "worker_id": mongodb::bson::Bson::Null,
            "current_job_id": mongodb::bson::Bson::Null,
            "heartbeat_at": mongodb::bson::Bson::Null,
        };
        if reset_attempts {
            set_doc.insert("attempt_count", 0i32);
            set_doc.insert("last_reprocessed_at", now);
        }

        let result = self
            .collection
            .find_one_and_update(
                doc! { "url": url, "status": status_str(QueueStatus::Failed) },
                doc! { "$set": set_doc, "$inc": { "reprocessed_count": 1i32 } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        if result.is_some() {
            tracing::info!(url, "requeued failed entry");
        } else {
            tracing::warn!(url, "cannot requeue: not in failed state");
        }
        Ok(result.map(QueueEntryDoc::into_domain))
    }

    /// Reprocess a `completed` entry back to `queued`, matching §4.G's
    /// admin-reprocess edge and scenario (f): `attempt_count=0`,
    /// `reprocessed_count+=1`, `was_previously_completed=true`.
    pub async fn atomic_reprocess_completed(&self, url: &str) -> Result<Option<QueueEntry>, QueueError> {
        let now = Utc::now();
        let extra = doc! {
            "attempt_count": 0i32,
            "last_reprocessed_at": now,
            "was_previously_completed": true,
            "last_error": mongodb::bson::Bson::Null,
            "error_type": mongodb::bson::Bson::Null,
            "worker_id": mongodb::bson::Bson::Null,
            "heartbeat_at": mongodb::bson::Bson::Null,
            "completed_at": mongodb::bson::Bson::Null,
        };
        let query = doc! { "url": url, "status": status_str(QueueStatus::Completed) };
        let set_doc = {
            let mut d = doc! { "status": status_str(QueueStatus::Queued), "updated_at": now };
            d.extend(extra);
            d
        };
        let result = self
            .collection
            .find_one_and_update(query, doc! { "$set": set_doc, "$inc": { "reprocessed_count": 1i32 } })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;
        Ok(result.map(QueueEntryDoc::into_domain))
    }

    /// Finds the oldest `queued|retry` entry (FIFO by `created_at`), sets
    /// `status=processing`, `worker_id`, `started_at`, `heartbeat_at`, and
    /// increments `attempt_count`. Attempt numbering is the post-increment
    /// value, matching the original: "attempts are counted by the store,
    /// not the worker."
    pub async fn atomic_worker_pick_job(&self, worker_id: &str) -> Result<Option<QueueEntry>, QueueError> {
        let now = Utc::now();
        let query = doc! {
            "status": { "$in": [status_str(QueueStatus::Queued), status_str(QueueStatus::Retry)] }
        };
        let update = doc! {
            "$set": {
                "status": status_str(QueueStatus::Processing),
                "worker_id": worker_id,
                "started_at": now,
                "heartbeat_at": now,
                "updated_at": now,
            },
            "$inc": { "attempt_count": 1i32 },
        };
        let result = self
            .collection
            .find_one_and_update(query, update)
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .sort(doc! { "created_at": 1 })
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        if let Some(ref entry) = result {
            tracing::info!(
                worker_id,
                url = entry.url,
                attempt = entry.attempt_count,
                "worker picked job"
            );
        }
        Ok(result.map(QueueEntryDoc::into_domain))
    }

    /// Loops `atomic_worker_pick_job` up to `batch_size` times, stopping
    /// early once the queue is exhausted. Never a single "find then
    /// update" over N documents — see SPEC_FULL.md §11 on the race window
    /// that rules it out.
    pub async fn atomic_batch_pick_sequential(
        &self,
        worker_id: &str,
        batch_size: u32,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        let mut picked = Vec::new();
        for _ in 0..batch_size {
            match self.atomic_worker_pick_job(worker_id).await? {
                Some(entry) => picked.push(entry),
                None => break,
            }
        }
        if !picked.is_empty() {
            tracing::info!(worker_id, picked = picked.len(), requested = batch_size, "picked batch");
        }
        Ok(picked)
    }

    /// Touches `heartbeat_at` on the matching in-progress entries. When
    /// `url` is `None`, updates every job this worker currently owns.
    pub async fn update_heartbeat(&self, worker_id: &str, url: Option<&str>) -> Result<u64, QueueError> {
        let mut query = doc! {
            "status": status_str(QueueStatus::Processing),
            "worker_id": worker_id,
        };
        if let Some(u) = url {
            query.insert("url", u);
        }
        let result = self
            .collection
            .update_many(query, doc! { "$set": { "heartbeat_at": Utc::now() } })
            .await?;
        Ok(result.modified_count)
    }

    pub async fn update(&self, url: &str, mut updates: Document) -> Result<bool, QueueError> {
        updates.insert("updated_at", Utc::now());
        let result = self
            .collection
            .update_one(doc! { "url": url }, doc! { "$set": updates })
            .await?;
        Ok(result.modified_count > 0)
    }

    pub async fn increment_field(&self, url: &str, field: &str, amount: i64) -> Result<bool, QueueError> {
        let result = self
            .collection
            .update_one(
                doc! { "url": url },
                doc! { "$inc": { field: amount }, "$set": { "updated_at": Utc::now() } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    /// Compensating rollback for the check-and-load fast path (§4.H step 5,
    /// §7 whitelist failure).
    pub async fn delete_by_url(&self, url: &str) -> Result<bool, QueueError> {
        let result = self.collection.delete_one(doc! { "url": url }).await?;
        Ok(result.deleted_count > 0)
    }

    /// Counts by status, zero-initialized for every known status so callers
    /// never have to guard a missing key, matching `get_stats`'s
    /// all-statuses dict.
    pub async fn get_stats(&self) -> Result<HashMap<String, i64>, QueueError> {
        let pipeline = vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }];
        let mut cursor = self.collection.clone_with_type::<Document>().aggregate(pipeline).await?;

        let mut stats: HashMap<String, i64> = [
            QueueStatus::Queued,
            QueueStatus::Processing,
            QueueStatus::Retry,
            QueueStatus::Completed,
            QueueStatus::Failed,
        ]
        .into_iter()
        .map(|s| (status_str(s).to_string(), 0i64))
        .collect();

        use futures::stream::TryStreamExt;
        while let Some(doc) = cursor.try_next().await? {
            if let (Some(status), Some(count)) = (
                doc.get_str("_id").ok(),
                doc.get_i32("count").ok().map(i64::from).or_else(|| doc.get_i64("count").ok()),
            ) {
                stats.insert(status.to_string(), count);
            }
        }
        let total: i64 = stats.values().sum();
        stats.insert("total".to_string(), total);
        Ok(stats)
    }

    /// Denominator for `daily_blog_limit` (§5): completed jobs for entries
    /// whose URL's domain matches `domain`, completed within the current
    /// UTC day.
    pub async fn count_completed_today(&self, domain: &str, since: chrono::DateTime<Utc>) -> Result<i64, QueueError> {
        let count = self
            .collection
            .count_documents(doc! {
                "status": status_str(QueueStatus::Completed),
                "completed_at": { "$gte": since },
                "url": { "$regex": format!(".*{}.*", regex_escape(domain)) },
            })
            .await?;
        Ok(count as i64)
    }

    /// Scans entries stalled past `heartbeat_interval_seconds * k` and
    /// forces them back to `retry` with the slot left reserved (§4.G Stall
    /// recovery). Returns the URLs reclaimed.
    pub async fn reclaim_stalled(&self, stall_multiplier: u32) -> Result<Vec<String>, QueueError> {
        use futures::stream::TryStreamExt;
        let mut cursor = self
            .collection
            .find(doc! { "status": status_str(QueueStatus::Processing) })
            .await?;

        let now = Utc::now();
        let mut reclaimed = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            let Some(hb) = entry.heartbeat_at else { continue };
            let stall_after = chrono::Duration::seconds(
                (entry.heartbeat_interval_seconds as i64) * stall_multiplier.max(3) as i64,
            );
            if now - hb > stall_after {
                let updated = self
                    .atomic_update_status(
                        &entry.url,
                        Some(QueueStatus::Processing),
                        QueueStatus::Retry,
                        doc! { "last_error": "stalled: heartbeat timeout" },
                    )
                    .await?;
                if updated.is_some() {
                    tracing::warn!(url = entry.url, "reclaimed stalled job");
                    reclaimed.push(entry.url);
                }
            }
        }
        Ok(reclaimed)
    }

    /// Candidates for the reservation reaper (§5 "Cancellation / timeout"):
    /// non-terminal entries older than `ttl_seconds` that have not already
    /// been swept, so a repeated sweep never releases the same reservation
    /// twice. The `reservation_reaped` marker lives only in this
    /// collection's wire shape — it is not part of `QueueEntry` because no
    /// other component needs to see it.
    pub async fn find_stale_reservations(&self, ttl_seconds: u64) -> Result<Vec<QueueEntry>, QueueError> {
        use futures::stream::TryStreamExt;
        let cutoff = Utc::now() - chrono::Duration::seconds(ttl_seconds as i64);
        let mut cursor = self
            .collection
            .find(doc! {
                "status": { "$in": [
                    status_str(QueueStatus::Queued),
                    status_str(QueueStatus::Processing),
                    status_str(QueueStatus::Retry),
                ] },
                "created_at": { "$lt": cutoff },
                "reservation_reaped": { "$ne": true },
            })
            .await?;

        let mut stale = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            stale.push(entry.into_domain());
        }
        Ok(stale)
    }

    /// Marks an entry as already swept by the reaper, without touching
    /// `status`, `attempt_count`, or `worker_id` (§7 "nothing outside the
    /// worker touches `attempt_count` or `worker_id`").
    pub async fn mark_reaped(&self, url: &str) -> Result<(), QueueError> {
        self.collection
            .clone_with_type::<Document>()
            .update_one(doc! { "url": url }, doc! { "$set": { "reservation_reaped": true } })
            .await?;
        Ok(())
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) if we.code == 11000
    )
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
    fn regex_escape_handles_dots() {
        assert_eq!(regex_escape("example.com"), "example\\.com");
    }
}
