//! Processing Pipeline (component G): the worker loop and `process_job`.
//! Grounded on the state machine and 8-step algorithm of §4.G, with the
//! worker-loop shape itself grounded in the donor's consumer task pattern
//! (`QueueMetrics`-instrumented poll loop, `crates/server/src/state.rs`).

use std::sync::Arc;
use std::time::Instant;

use fyi_artifacts::ArtifactStore;
use fyi_core::domain::{QueueEntry, QueueStatus};
use fyi_crawler::{quality, Crawler};
use fyi_ledger::PublisherLedger;
use fyi_llm::LlmOrchestrator;
use fyi_queue::QueueStore;
use mongodb::bson::doc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::metrics::Metrics;

pub struct PipelineContext {
    pub pg_pool: PgPool,
    pub queue: QueueStore,
    pub artifacts: ArtifactStore,
    pub crawler: Crawler,
    pub llm: LlmOrchestrator,
    pub metrics: Arc<Metrics>,
    pub worker_id: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped,
}

impl PipelineContext {
    /// `loop { sleep(poll_interval); for job in atomic_batch_pick_sequential(...) { spawn process_job(job) } }`,
    /// per §4.G. Each picked job runs as an independent task; this worker
    /// does not wait for one job before picking the next batch.
    pub async fn run_loop(self: Arc<Self>, poll_interval_seconds: u64, batch_size: u32) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(poll_interval_seconds));
        loop {
            interval.tick().await;
            let jobs = match self.queue.atomic_batch_pick_sequential(&self.worker_id, batch_size).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(error = %e, "failed to pick job batch");
                    continue;
                }
            };
            for job in jobs {
                let ctx = Arc::clone(&self);
                tokio::spawn(async move {
                    ctx.run_job(job).await;
                });
            }
        }
    }

    async fn run_job(&self, job: QueueEntry) {
        let url = job.url.clone();
        self.metrics.job_started();
        let started = Instant::now();

        let result = self.process_job(&job).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(outcome) => {
                tracing::info!(url, ?outcome, duration_ms, "job completed");
                self.metrics.job_finished(duration_ms, true);
            }
            Err(e) => {
                tracing::warn!(url, error = %e, error_type = e.error_type(), duration_ms, "job failed");
                self.metrics.job_finished(duration_ms, false);
                self.handle_failure(&job, e).await;
            }
        }
    }

    /// The 8-step algorithm of §4.G.
    async fn process_job(&self, job: &QueueEntry) -> Result<JobOutcome, PipelineError> {
        let publisher = PublisherLedger::get_by_id(&self.pg_pool, job.publisher_id)
            .await?
            .ok_or_else(|| PipelineError::Validation(format!("publisher {} not found", job.publisher_id)))?;
        let config = &publisher.config;

        // Step 2: content retrieval, cache-hit quality check.
        let cached = self.artifacts.get_blog_by_url(&job.url).await?;
        let article = match cached {
            Some(blog) if quality::assess(&blog.content).passed => {
                tracing::debug!(url = job.url, "content retrieval cache hit");
                fyi_crawler::ExtractedArticle {
                    title: blog.title,
                    content: blog.content,
                    language: blog.language,
                    word_count: blog.word_count,
                    metadata: blog.metadata,
                }
            }
            _ => {
                let article = self.crawler.crawl(&job.url).await?;
                if let Err(e) = self
                    .artifacts
                    .save_blog_content(
                        &job.url,
                        &article.title,
                        &article.content,
                        &article.language,
                        article.word_count,
                        article.metadata.clone(),
                    )
                    .await
                {
                    tracing::warn!(url = job.url, error = %e, "non-fatal: failed to persist crawl cache");
                }
                article
            }
        };

        // Step 3: threshold gate. Always increment; admit only past threshold.
        let triggered_count = self.artifacts.increment_triggered_count(&job.url).await?;
        if triggered_count <= config.threshold_before_processing_blog as u64 {
            tracing::info!(
                url = job.url,
                triggered_count,
                threshold = config.threshold_before_processing_blog,
                "threshold not met, skipping as completed"
            );
            self.queue
                .atomic_update_status(
                    &job.url,
                    Some(QueueStatus::Processing),
                    QueueStatus::Completed,
                    doc! { "completed_at": chrono::Utc::now(), "last_error": "skipped: threshold not met" },
                )
                .await?;
            PublisherLedger::release_blog_slot(&self.pg_pool, job.publisher_id, false, 0).await?;
            return Ok(JobOutcome::Skipped);
        }

        // Step 4: summary.
        let blog_id = blog_id_for_url(&job.url);
        let summary = self
            .llm
            .generate_summary(
                &article.content,
                &article.title,
                config.custom_summary_prompt.as_deref(),
                &config.summary_model,
                config.summary_temperature,
                config.summary_max_tokens,
            )
            .await?;
        self.metrics.llm_call(config.summary_max_tokens as u64);

        // Step 5: questions.
        let questions = self
            .llm
            .generate_questions(
                &article.content,
                &article.title,
                config.questions_per_blog,
                config.custom_question_prompt.as_deref(),
                &config.questions_model,
                config.questions_temperature,
                config.questions_max_tokens,
                config.use_grounding,
            )
            .await?;
        self.metrics.llm_call(config.questions_max_tokens as u64);
        self.metrics.questions_generated(questions.len() as u64);

        // Step 6: embeddings, concurrently.
        let (summary_embedding, question_embeddings) = self
            .llm
            .generate_embeddings(&summary.summary, &questions, &config.embedding_model)
            .await?;

        // Step 7: persist in order: blog, summary, questions.
        let final_title = summary.llm_generated_title.clone().unwrap_or_else(|| article.title.clone());
        self.artifacts
            .save_blog_content(
                &job.url,
                &final_title,
                &article.content,
                &article.language,
                article.word_count,
                article.metadata.clone(),
            )
            .await?;
        self.artifacts
            .save_summary(&blog_id, &job.url, &summary.summary, &summary.key_points, &summary_embedding)
            .await?;
        let question_rows: Vec<(String, String, Option<String>, Option<f32>)> = questions
            .iter()
            .map(|q| (q.question.clone(), q.answer.clone(), q.keyword_anchor.clone(), q.probability))
            .collect();
        self.artifacts
            .save_questions(&blog_id, &job.url, &question_rows, &question_embeddings)
            .await?;

        // Step 8: terminal transition. `job.completed_count` is the number
        // of prior *genuine* completions for this URL, read off the job at
        // pick time; since the entry is exclusively owned by this worker
        // while `processing`, that snapshot can't go stale before the
        // atomic completion below. `processed` is true only the first time
        // this URL ever completes, matching §4.G step 8 ("no prior
        // completed run … checked by counting prior completed jobs on the
        // same URL") rather than the `was_previously_completed` audit flag,
        // which is set by some non-completion transitions (e.g. the
        // fast-path auto-heal of step 7) and would double-count otherwise.
        self.queue
            .atomic_complete(&job.url, doc! { "completed_at": chrono::Utc::now() })
            .await?;
        let processed = job.completed_count == 0;
        PublisherLedger::release_blog_slot(&self.pg_pool, job.publisher_id, processed, questions.len() as i64)
            .await?;

        Ok(JobOutcome::Completed)
    }

    /// On failure: retry while attempts remain and the error is retriable;
    /// otherwise fail terminally and release the slot. If the worker can't
    /// even read back its own job after marking it failed, it leaves the
    /// slot reserved (safety bias toward leaks over over-issue, §4.G).
    async fn handle_failure(&self, job: &QueueEntry, error: &PipelineError) {
        let can_retry = job.attempt_count < job.max_retries && error.is_retriable();
        let extra = doc! {
            "last_error": error.to_string(),
            "error_type": error.error_type(),
        };

        if can_retry {
            if let Err(e) = self
                .queue
                .atomic_update_status(&job.url, Some(QueueStatus::Processing), QueueStatus::Retry, extra)
                .await
            {
                tracing::error!(url = job.url, error = %e, "failed to move job to retry");
            }
            return;
        }

        match self
            .queue
            .atomic_update_status(&job.url, Some(QueueStatus::Processing), QueueStatus::Failed, extra)
            .await
        {
            Ok(Some(_)) => {
                if let Err(e) =
                    PublisherLedger::release_blog_slot(&self.pg_pool, job.publisher_id, false, 0).await
                {
                    tracing::error!(url = job.url, error = %e, "failed to release slot after terminal failure");
                }
            }
            Ok(None) => {
                tracing::error!(
                    url = job.url,
                    "could not confirm job transitioned to failed; leaving slot reserved"
                );
            }
            Err(e) => {
                tracing::error!(url = job.url, error = %e, "failed to mark job failed; leaving slot reserved");
            }
        }
    }

    /// Stall recovery: forces `processing` entries stalled past
    /// `heartbeat_interval_seconds * stall_multiplier` back to `retry`,
    /// leaving the slot reserved for the next worker pick (§4.G, §5).
    pub async fn run_stall_monitor(self: Arc<Self>, interval_seconds: u64, stall_multiplier: u32) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
        loop {
            interval.tick().await;
            match self.queue.reclaim_stalled(stall_multiplier).await {
                Ok(reclaimed) if !reclaimed.is_empty() => {
                    tracing::warn!(count = reclaimed.len(), "reclaimed stalled jobs");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "stall monitor scan failed"),
            }
        }
    }

    /// Background heartbeat task for in-flight jobs owned by this worker.
    pub async fn run_heartbeat(self: Arc<Self>, interval_seconds: u64) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
        loop {
            interval.tick().await;
            if let Err(e) = self.queue.update_heartbeat(&self.worker_id, None).await {
                tracing::error!(error = %e, "heartbeat update failed");
            }
        }
    }
}

/// Deterministic blog id derived from the URL (a stable UUIDv5-style join
/// key between `blog_content`, `summary`, and `qa` without a round trip
/// through the store to fetch an autogenerated id).
fn blog_id_for_url(url: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    url.hash(&mut hasher);
    let hash = hasher.finish();
    Uuid::from_u64_pair(hash, hash.rotate_left(32)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_id_is_deterministic_per_url() {
        let a = blog_id_for_url("https://example.com/a");
        let b = blog_id_for_url("https://example.com/a");
        let c = blog_id_for_url("https://example.com/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
