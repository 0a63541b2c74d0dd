use thiserror::Error;

/// Errors from the Artifact Store (component C).
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("blog content not found for url: {0}")]
    BlogNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("mongodb error: {0}")]
    Database(#[from] mongodb::error::Error),
}
