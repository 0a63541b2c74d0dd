use thiserror::Error;

/// Errors from the Queue Store and Threshold Counter.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue entry not found for url: {0}")]
    NotFound(String),

    #[error("queue entry for {url} is not in status {expected}, compare-and-set lost the race")]
    StatusConflict { url: String, expected: String },

    #[error("mongodb error: {0}")]
    Database(#[from] mongodb::error::Error),
}
