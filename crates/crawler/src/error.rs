use thiserror::Error;

/// Typed crawl failure modes (§4.E). Each variant's `Display` renders the
/// `crawl_error.*` code the spec names, which the pipeline's substring
/// classifier (§4.G, §11) relies on to route into `error_type="crawl_error"`.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("crawl_error.network: {0}")]
    Network(String),

    #[error("crawl_error.status_4xx: {0}")]
    Status4xx(u16),

    #[error("crawl_error.status_5xx: {0}")]
    Status5xx(u16),

    #[error("crawl_error.content_too_large: body exceeded {0} bytes")]
    ContentTooLarge(u64),

    #[error("crawl_error.unsupported_content_type: {0}")]
    UnsupportedContentType(String),

    #[error("crawl_error.decode: {0}")]
    Decode(String),

    #[error("crawl_error.empty_or_binary: extracted text failed the quality gate")]
    EmptyOrBinary,

    #[error("crawl_error.too_short: extracted text has fewer than {0} words")]
    TooShort(usize),

    #[error("crawl_error.too_many_redirects: exceeded {0} redirects")]
    TooManyRedirects(u32),
}

impl CrawlError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status5xx(_) | Self::EmptyOrBinary | Self::TooShort(_)
        )
    }
}
