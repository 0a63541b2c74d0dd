//! Fetch orchestration: bounded redirects, content-size/type enforcement,
//! encoding negotiation, retry with exponential backoff, and the quality
//! gate (§4.E). Grounded in the donor's `fetch.rs` client-setup pattern
//! (reqwest::Client with a redirect policy and response-size guard),
//! extended with the spec's encoding-negotiation and backoff rules.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::CrawlError;
use crate::extract::{extract_article, ExtractedArticle};
use crate::quality;

const ALLOWED_CONTENT_TYPES: &[&str] =
    &["text/html", "application/xhtml+xml", "text/xml", "application/xml"];

const FALLBACK_ENCODINGS: &[&str] = &["utf-8", "windows-1252", "iso-8859-1"];

#[derive(Clone)]
pub struct CrawlerConfig {
    pub max_redirects: u32,
    pub max_content_bytes: u64,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            max_content_bytes: 10 * 1024 * 1024,
            max_retries: 3,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone)]
pub struct Crawler {
    client: Client,
    config: CrawlerConfig,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub async fn crawl(&self, url: &str) -> Result<ExtractedArticle, CrawlError> {
        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
                debug!(url, attempt, backoff_secs = backoff.as_secs(), "retrying crawl");
                tokio::time::sleep(backoff).await;
            }
            match self.crawl_once(url).await {
                Ok(article) => return Ok(article),
                Err(e) => {
                    let retriable = e.is_retriable();
                    warn!(url, attempt, error = %e, retriable, "crawl attempt failed");
                    last_err = Some(e);
                    if !retriable {
                        break;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(CrawlError::Network("exhausted retries".to_string())))
    }

    async fn crawl_once(&self, url: &str) -> Result<ExtractedArticle, CrawlError> {
        let response =
            self.client.get(url).send().await.map_err(|e| CrawlError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(CrawlError::Status4xx(status.as_u16()));
        }
        if status.is_server_error() {
            return Err(CrawlError::Status5xx(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let mime = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
        if !mime.is_empty() && !ALLOWED_CONTENT_TYPES.contains(&mime.as_str()) {
            return Err(CrawlError::UnsupportedContentType(mime));
        }

        if let Some(len) = response.content_length() {
            if len > self.config.max_content_bytes {
                return Err(CrawlError::ContentTooLarge(len));
            }
        }

        let bytes = response.bytes().await.map_err(|e| CrawlError::Network(e.to_string()))?;
        if bytes.len() as u64 > self.config.max_content_bytes {
            return Err(CrawlError::ContentTooLarge(bytes.len() as u64));
        }

        let html = decode_body(&bytes, &content_type)?;
        let article = extract_article(&html, url);

        let report = quality::assess(&article.content);
        if !report.passed {
            if report.word_count < 10 {
                return Err(CrawlError::TooShort(report.word_count));
            }
            return Err(CrawlError::EmptyOrBinary);
        }

        Ok(article)
    }
}

/// Declared charset first (from the `Content-Type` header), then a small
/// fallback list, per §4.E's "documented encoding-negotiation order".
fn decode_body(bytes: &[u8], content_type: &str) -> Result<String, CrawlError> {
    if let Some(declared) = declared_charset(content_type) {
        if let Some(encoding) = encoding_rs::Encoding::for_label(declared.as_bytes()) {
            let (text, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
        }
    }

    for label in FALLBACK_ENCODINGS {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (text, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
        }
    }

    Err(CrawlError::Decode("no candidate encoding decoded the body cleanly".to_string()))
}

fn declared_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|part| part.trim().strip_prefix("charset="))
        .map(|charset| charset.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_charset_parses_from_content_type() {
        assert_eq!(
            declared_charset("text/html; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(declared_charset("text/html"), None);
    }

    #[test]
    fn decode_body_falls_back_to_utf8() {
        let text = decode_body("hello world".as_bytes(), "text/html").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn default_config_has_sane_bounds() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.max_retries, 3);
    }
}
