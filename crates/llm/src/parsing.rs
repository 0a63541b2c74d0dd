//! Response parsing: markdown-fence stripping and question filtering.
//! Grounded on `llm_generation_service.py::generate_questions`'s parsing
//! block — a regex attempt first, falling back to manual first/last-line
//! stripping, then JSON decode and per-entry validation.

use serde::Deserialize;

use crate::error::LlmError;

/// Strips a ```json ... ``` or ``` ... ``` fence if present. Tries a
/// single-pass scan for the fenced body first (the "regex" path in the
/// original); if the text doesn't start with a fence at all, returns it
/// unchanged. If it starts with a fence but has no matching close, falls
/// back to dropping the first and last line, matching the original's
/// two-path behavior.
pub fn strip_markdown_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    if let Some(stripped) = fenced_body(trimmed) {
        return stripped;
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().map(|l| l.starts_with("```")).unwrap_or(false) {
        lines.remove(0);
    }
    if lines.last().map(|l| l.starts_with("```")).unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Regex-equivalent fenced-body extraction: ```(json)?\s*(.*?)\s*``` with
/// DOTALL semantics, implemented by hand to avoid a dependency on `regex`
/// for a single pattern.
fn fenced_body(trimmed: &str) -> Option<String> {
    let after_open = trimmed.strip_prefix("```")?;
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.trim_start_matches(['\r', '\n']);
    let close = after_open.rfind("```")?;
    Some(after_open[..close].trim().to_string())
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

pub struct ParsedSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub llm_generated_title: Option<String>,
}

/// Parses the summary JSON; on decode failure, falls back to treating the
/// raw text as the summary with no key points, matching the original's
/// best-effort `except Exception` branch.
pub fn parse_summary(raw_text: &str) -> ParsedSummary {
    let cleaned = strip_markdown_fence(raw_text);
    match serde_json::from_str::<SummaryPayload>(&cleaned) {
        Ok(payload) => {
            let title = payload.title.trim();
            ParsedSummary {
                summary: if payload.summary.is_empty() { raw_text.to_string() } else { payload.summary },
                key_points: payload.key_points,
                llm_generated_title: if title.is_empty() { None } else { Some(title.to_string()) },
            }
        }
        Err(e) => {
            tracing::warn!("failed to parse summary JSON: {e}, using raw text");
            ParsedSummary {
                summary: raw_text.to_string(),
                key_points: Vec::new(),
                llm_generated_title: None,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    keyword_anchor: Option<String>,
    #[serde(default)]
    probability: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct QuestionsPayload {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone)]
pub struct ParsedQuestion {
    pub question: String,
    pub answer: String,
    pub keyword_anchor: Option<String>,
    pub probability: Option<f32>,
}

/// Parses and filters the questions JSON. A question entry is dropped when
/// either `question` or `answer` is missing, empty, or whitespace-only
/// (§4.F). Raises `LlmError::NoQuestions` if nothing survives; otherwise
/// truncates to `questions_per_blog` and logs under-production, never
/// erroring on a short batch.
pub fn parse_questions(raw_text: &str, questions_per_blog: u8) -> Result<Vec<ParsedQuestion>, LlmError> {
    let cleaned = strip_markdown_fence(raw_text);
    let payload: QuestionsPayload = serde_json::from_str(&cleaned)
        .map_err(|e| LlmError::Parse(format!("question parsing failed: {e}")))?;

    let total = payload.questions.len();
    let mut filtered = 0usize;
    let mut out = Vec::with_capacity(total);
    for q in payload.questions {
        let question = q.question.trim();
        let answer = q.answer.trim();
        if question.is_empty() || answer.is_empty() {
            filtered += 1;
            continue;
        }
        out.push(ParsedQuestion {
            question: question.to_string(),
            answer: answer.to_string(),
            keyword_anchor: q.keyword_anchor.filter(|s| !s.trim().is_empty()),
            probability: q.probability,
        });
    }

    if out.is_empty() {
        return Err(LlmError::NoQuestions);
    }

    let valid = out.len();
    if valid >= questions_per_blog as usize {
        out.truncate(questions_per_blog as usize);
    } else {
        tracing::warn!(valid, requested = questions_per_blog, filtered, "under-produced questions");
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_markdown_fence(raw), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence_without_language_tag() {
        let raw = "```\n{\"a\":1}\n```";
        assert_eq!(strip_markdown_fence(raw), "{\"a\":1}");
    }

    #[test]
    fn passes_through_unfenced_text() {
        assert_eq!(strip_markdown_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parse_summary_handles_non_json_fallback() {
        let parsed = parse_summary("not json at all");
        assert_eq!(parsed.summary, "not json at all");
        assert!(parsed.key_points.is_empty());
        assert!(parsed.llm_generated_title.is_none());
    }

    #[test]
    fn parse_summary_extracts_title() {
        let raw = r#"{"title":"My Title","summary":"short","key_points":["a","b"]}"#;
        let parsed = parse_summary(raw);
        assert_eq!(parsed.llm_generated_title.as_deref(), Some("My Title"));
        assert_eq!(parsed.key_points.len(), 2);
    }

    #[test]
    fn filters_empty_and_whitespace_questions() {
        let raw = r#"{"questions":[
            {"question":"Q1","answer":"A1"},
            {"question":"","answer":"A2"},
            {"question":"Q3","answer":"   "}
        ]}"#;
        let parsed = parse_questions(raw, 5).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].question, "Q1");
    }

    #[test]
    fn truncates_to_requested_count() {
        let raw = r#"{"questions":[
            {"question":"Q1","answer":"A1"},
            {"question":"Q2","answer":"A2"},
            {"question":"Q3","answer":"A3"}
        ]}"#;
        let parsed = parse_questions(raw, 2).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn zero_valid_questions_is_an_error() {
        let raw = r#"{"questions":[{"question":"","answer":""}]}"#;
        assert!(matches!(parse_questions(raw, 5), Err(LlmError::NoQuestions)));
    }

    #[test]
    fn under_production_still_succeeds() {
        let raw = r#"{"questions":[{"question":"Q1","answer":"A1"}]}"#;
        let parsed = parse_questions(raw, 5).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
