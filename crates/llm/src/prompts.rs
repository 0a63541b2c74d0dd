//! Three-layer prompt architecture (§4.F): a non-negotiable system
//! instruction enforcing strict JSON output, the publisher's custom
//! instruction (or this module's default), and an explicit JSON schema
//! block appended to the user message. Grounded on the shape described in
//! `llm_content_generator.py::generate_summary`/`generate_questions`
//! (`OUTPUT_FORMAT_INSTRUCTION`, `SUMMARY_JSON_FORMAT`,
//! `QUESTIONS_JSON_FORMAT`); the original prompt-text module itself was not
//! retained in `original_source/`, so the literal wording here is
//! reconstructed from the call sites rather than copied verbatim.

/// Layer 1: non-negotiable, identical for summary and questions.
pub const OUTPUT_FORMAT_INSTRUCTION: &str =
    "You are a content analysis assistant. You must respond with a single \
     valid JSON object and nothing else — no prose before or after it, no \
     markdown commentary. If you wrap the JSON in a code fence, use only \
     ```json ... ``` and no other text.";

/// Layer 2 default, used when the publisher has no `custom_summary_prompt`.
pub const DEFAULT_SUMMARY_PROMPT: &str =
    "You are an expert technical writer. Summarize the article below in a \
     clear, neutral voice and extract its key points for a reader who has \
     not read the original.";

/// Layer 2 default, used when the publisher has no `custom_question_prompt`.
pub const DEFAULT_QUESTIONS_PROMPT: &str =
    "You are an expert content analyst. Generate question-and-answer pairs \
     that test genuine comprehension of the article below, covering its \
     most important claims and details.";

pub const QA_ANSWER_SYSTEM_PROMPT: &str =
    "You are a helpful assistant answering a reader's question about a blog \
     article. Keep answers concise, accurate, and under 200 words.";

/// Layer 3: explicit JSON schema for the summary call.
pub const SUMMARY_JSON_FORMAT: &str = r#"{
  "title": "string (a concise title for the article)",
  "summary": "string (a 2-4 sentence summary)",
  "key_points": ["string", "..."]
}"#;

/// Layer 3: explicit JSON schema for the questions call.
pub const QUESTIONS_JSON_FORMAT: &str = r#"{
  "questions": [
    {
      "question": "string",
      "answer": "string",
      "keyword_anchor": "string (optional, a short phrase from the source text)",
      "probability": "number (optional, 0.0-1.0 confidence this question is a likely reader query)"
    }
  ]
}"#;

/// Inputs longer than this are truncated before being embedded (§4.F).
pub const EMBEDDING_MAX_CHARS: usize = 8000;

/// Content is truncated to this many characters before being embedded in
/// the user prompt, matching `content[:4000]` in `llm_content_generator.py`.
const PROMPT_CONTENT_MAX_CHARS: usize = 4000;

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

pub fn summary_user_prompt(role_and_instructions: &str, title: &str, content: &str) -> String {
    format!(
        "{role_and_instructions}\n\nTitle: {title}\n\nContent:\n{}\n\n\
         REQUIRED OUTPUT FORMAT (you must use this exact JSON structure):\n{SUMMARY_JSON_FORMAT}",
        truncate_chars(content, PROMPT_CONTENT_MAX_CHARS)
    )
}

pub fn questions_user_prompt(
    role_and_instructions: &str,
    title: &str,
    content: &str,
    num_questions: u8,
) -> String {
    format!(
        "{role_and_instructions}\n\nTitle: {title}\n\nContent:\n{}\n\n\
         Generate exactly {num_questions} question-answer pairs.\n\n\
         REQUIRED OUTPUT FORMAT (you must use this exact JSON structure):\n{QUESTIONS_JSON_FORMAT}",
        truncate_chars(content, PROMPT_CONTENT_MAX_CHARS)
    )
}

pub fn truncate_for_embedding(text: &str) -> &str {
    truncate_chars(text, EMBEDDING_MAX_CHARS)
}

/// Grounded on `llm_content_generator.py::answer_question`'s user-prompt
/// assembly: context, when present, is truncated to 2000 characters.
pub fn answer_question_prompt(question: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!(
            "Context:\n{}\n\nQuestion: {question}\n\nProvide a clear, concise answer based on the context above.",
            truncate_chars(ctx, 2000)
        ),
        _ => format!("Question: {question}\n\nProvide a helpful, accurate answer."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_content() {
        let long = "a".repeat(10_000);
        let prompt = summary_user_prompt("role", "Title", &long);
        assert!(prompt.len() < long.len());
    }

    #[test]
    fn embedding_truncation_respects_limit() {
        let long = "x".repeat(9000);
        assert_eq!(truncate_for_embedding(&long).chars().count(), EMBEDDING_MAX_CHARS);
    }

    #[test]
    fn short_content_unaffected() {
        let short = "hello world";
        assert_eq!(truncate_for_embedding(short), short);
    }
}
