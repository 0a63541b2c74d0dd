//! Orphaned-reservation reaper (§5 "Cancellation / timeout"): a background
//! process that matches reserved publisher slots against queue entries in
//! the completed/failed set and rolls back any reservation whose entry has
//! sat outside those terminal states past a TTL, without ever touching
//! `attempt_count` or `worker_id` (§7 "Recovery boundaries"). Grounded on
//! `run_stall_monitor`'s polling-loop shape in `crates/pipeline/src/worker.rs`.
//!
//! May run inside a worker process or as a dedicated maintenance process
//! (§9 "Reaper ownership"); this crate exposes it as a loop any binary can
//! spawn, using the same atomic primitives as the worker.

use std::sync::Arc;

use fyi_ledger::PublisherLedger;
use fyi_queue::QueueStore;
use sqlx::PgPool;

pub struct Reaper {
    pub pg_pool: PgPool,
    pub queue: QueueStore,
}

impl Reaper {
    pub fn new(pg_pool: PgPool, queue: QueueStore) -> Arc<Self> {
        Arc::new(Self { pg_pool, queue })
    }

    /// One sweep: every queue entry stuck in `queued|processing|retry`
    /// longer than `reservation_ttl_seconds` since `created_at` is
    /// suspected of holding an orphaned reservation (the API crashed
    /// after `reserve_blog_slot` but before the worker could pick it up,
    /// or the worker itself died without a compensating release). The
    /// queue entry is left untouched — the worker or a retry will still
    /// reclaim it through the normal pick path — only the publisher's
    /// `blog_slots_reserved` is released, and only once per entry, guarded
    /// by re-reading the entry's age under the same sweep.
    pub async fn sweep(&self, reservation_ttl_seconds: u64) -> Result<u64, fyi_queue::QueueError> {
        let stale = self.queue.find_stale_reservations(reservation_ttl_seconds).await?;

        let mut reclaimed = 0u64;
        for entry in stale {
            tracing::warn!(
                url = entry.url,
                publisher_id = %entry.publisher_id,
                age_seconds = (chrono::Utc::now() - entry.created_at).num_seconds(),
                "reaper: releasing suspected orphaned reservation"
            );
            if let Err(e) = PublisherLedger::release_blog_slot(&self.pg_pool, entry.publisher_id, false, 0).await {
                tracing::error!(url = entry.url, error = %e, "reaper: failed to release orphaned slot");
                continue;
            }
            // Mark so a second sweep does not release the same reservation
            // twice; the entry itself is otherwise untouched.
            self.queue.mark_reaped(&entry.url).await?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    pub async fn run_loop(self: Arc<Self>, interval_seconds: u64, reservation_ttl_seconds: u64) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
        loop {
            interval.tick().await;
            match self.sweep(reservation_ttl_seconds).await {
                Ok(0) => {}
                Ok(n) => tracing::warn!(count = n, "reaper reclaimed orphaned slots"),
                Err(e) => tracing::error!(error = %e, "reaper sweep failed"),
            }
        }
    }
}
