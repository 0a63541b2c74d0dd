//! HTML→text extraction. Adapted from the donor's
//! `tvanderb-AutOSINT/crates/fetch/src/fetch.rs::extract_html_content`
//! (walk the DOM, skip a removal set, collapse whitespace), extended with
//! the additional removal tags the spec names (`aside`, `iframe`) and with
//! title/language/word-count/metadata extraction (§4.E).

use std::collections::HashSet;

use scraper::{Html, Selector};
use serde_json::json;

const REMOVE_SELECTORS: &[&str] =
    &["script", "style", "nav", "footer", "aside", "iframe", "noscript", "svg"];

pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    pub language: String,
    pub word_count: u32,
    pub metadata: serde_json::Value,
}

pub fn extract_article(html: &str, source_url: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let content = extract_text(&document);
    let word_count = content.split_whitespace().count() as u32;
    let language = detect_language(&content);
    let metadata = json!({ "source_url": source_url, "extracted_char_count": content.chars().count() });

    ExtractedArticle { title, content, language, word_count, metadata }
}

fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Walk the document tree collecting text nodes not descended from a
/// removal-set element, matching `extract_html_content`'s approach exactly.
fn extract_text(document: &Html) -> String {
    let mut skip_ids = HashSet::new();
    for sel_str in REMOVE_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            for element in document.select(&selector) {
                skip_ids.insert(element.id());
            }
        }
    }

    let mut text_parts = Vec::new();
    for node in document.tree.nodes() {
        let mut should_skip = false;
        let mut check_id = Some(node.id());
        while let Some(id) = check_id {
            if skip_ids.contains(&id) {
                should_skip = true;
                break;
            }
            check_id = document.tree.get(id).and_then(|n| n.parent()).map(|p| p.id());
        }
        if should_skip {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            let trimmed = text.text.trim();
            if !trimmed.is_empty() {
                text_parts.push(trimmed.to_string());
            }
        }
    }

    collapse_whitespace(&text_parts.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(c);
            prev_was_space = false;
        }
    }
    result.trim().to_string()
}

/// Best-effort language tag via `whatlang`; falls back to `"en"` when the
/// sample is too short or ambiguous for confident detection.
fn detect_language(text: &str) -> String {
    whatlang::detect(text)
        .map(|info| info.lang().code().to_string())
        .unwrap_or_else(|| "en".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html>
        <head><title>Test Article</title></head>
        <body>
            <nav>Navigation here</nav>
            <aside>Sidebar content</aside>
            <main>
                <h1>Article Title</h1>
                <p>This is the main content of the article, written in plain English.</p>
                <p>Second paragraph with additional information for the reader.</p>
            </main>
            <iframe src="https://ads.example.com"></iframe>
            <footer>Footer content</footer>
            <script>alert('bad');</script>
        </body>
        </html>
    "#;

    #[test]
    fn extracts_title() {
        let article = extract_article(HTML, "https://example.com/a");
        assert_eq!(article.title, "Test Article");
    }

    #[test]
    fn strips_removed_tags() {
        let article = extract_article(HTML, "https://example.com/a");
        assert!(article.content.contains("main content"));
        assert!(!article.content.contains("Navigation here"));
        assert!(!article.content.contains("Sidebar content"));
        assert!(!article.content.contains("Footer content"));
        assert!(!article.content.contains("alert"));
    }

    #[test]
    fn counts_words() {
        let article = extract_article(HTML, "https://example.com/a");
        assert!(article.word_count > 10);
    }

    #[test]
    fn detects_english_by_default() {
        let article = extract_article(HTML, "https://example.com/a");
        assert_eq!(article.language, "eng");
    }
}
