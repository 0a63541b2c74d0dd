pub mod document;
pub mod error;
pub mod store;

pub use error::ArtifactError;
pub use store::{ArtifactStore, SimilarBlog};
