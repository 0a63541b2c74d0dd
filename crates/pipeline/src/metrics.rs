//! Lock-free atomic counters for worker observability. Grounded on the
//! donor's `QueueMetrics` (`crates/server/src/state.rs`): a plain struct of
//! `AtomicU64` fields, `Ordering::Relaxed` throughout since these are
//! monotonic counters where eventual visibility is acceptable for an admin
//! status read, not a full Prometheus exporter (out of scope per spec).

use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    pub jobs_processing_active: AtomicU64,
    pub jobs_processed_total: AtomicU64,
    pub job_processing_duration_ms_total: AtomicU64,
    pub questions_generated_total: AtomicU64,
    pub blogs_processed_total: AtomicU64,
    pub processing_errors_total: AtomicU64,
    pub llm_operations_total: AtomicU64,
    pub llm_tokens_used_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            jobs_processing_active: AtomicU64::new(0),
            jobs_processed_total: AtomicU64::new(0),
            job_processing_duration_ms_total: AtomicU64::new(0),
            questions_generated_total: AtomicU64::new(0),
            blogs_processed_total: AtomicU64::new(0),
            processing_errors_total: AtomicU64::new(0),
            llm_operations_total: AtomicU64::new(0),
            llm_tokens_used_total: AtomicU64::new(0),
        }
    }

    pub fn job_started(&self) {
        self.jobs_processing_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_finished(&self, duration_ms: u64, succeeded: bool) {
        self.jobs_processing_active.fetch_sub(1, Ordering::Relaxed);
        self.jobs_processed_total.fetch_add(1, Ordering::Relaxed);
        self.job_processing_duration_ms_total.fetch_add(duration_ms, Ordering::Relaxed);
        if succeeded {
            self.blogs_processed_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.processing_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn questions_generated(&self, count: u64) {
        self.questions_generated_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn llm_call(&self, tokens: u64) {
        self.llm_operations_total.fetch_add(1, Ordering::Relaxed);
        self.llm_tokens_used_total.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "jobs_processing_active": self.jobs_processing_active.load(Ordering::Relaxed),
            "jobs_processed_total": self.jobs_processed_total.load(Ordering::Relaxed),
            "job_processing_duration_ms_total": self.job_processing_duration_ms_total.load(Ordering::Relaxed),
            "questions_generated_total": self.questions_generated_total.load(Ordering::Relaxed),
            "blogs_processed_total": self.blogs_processed_total.load(Ordering::Relaxed),
            "processing_errors_total": self.processing_errors_total.load(Ordering::Relaxed),
            "llm_operations_total": self.llm_operations_total.load(Ordering::Relaxed),
            "llm_tokens_used_total": self.llm_tokens_used_total.load(Ordering::Relaxed),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_lifecycle_updates_active_and_total() {
        let m = Metrics::new();
        m.job_started();
        assert_eq!(m.jobs_processing_active.load(Ordering::Relaxed), 1);
        m.job_finished(120, true);
        assert_eq!(m.jobs_processing_active.load(Ordering::Relaxed), 0);
        assert_eq!(m.jobs_processed_total.load(Ordering::Relaxed), 1);
        assert_eq!(m.blogs_processed_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failed_job_increments_error_counter_not_blogs() {
        let m = Metrics::new();
        m.job_started();
        m.job_finished(50, false);
        assert_eq!(m.processing_errors_total.load(Ordering::Relaxed), 1);
        assert_eq!(m.blogs_processed_total.load(Ordering::Relaxed), 0);
    }
}
