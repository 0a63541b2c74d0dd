pub mod crawler;
pub mod error;
pub mod extract;
pub mod quality;

pub use crawler::{Crawler, CrawlerConfig};
pub use error::CrawlError;
pub use extract::ExtractedArticle;
