pub mod error;
pub mod metrics;
pub mod reaper;
pub mod worker;

pub use error::PipelineError;
pub use metrics::Metrics;
pub use reaper::Reaper;
pub use worker::{JobOutcome, PipelineContext};
