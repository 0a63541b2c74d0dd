use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("{0}")]
    Other(String),
}
