//! The text-quality gate applied after DOM cleanup (§4.E), and reused
//! verbatim by the pipeline's content-retrieval cache-hit check (§4.G step
//! 2 — "reuse it as the crawl result... if its content passes the same
//! quality gate").

const MIN_CHARS: usize = 30;
const MIN_WORDS: usize = 10;
const MIN_PRINTABLE_RATIO: f64 = 0.5;
const MAX_REPLACEMENT_RATIO: f64 = 0.2;

pub struct QualityReport {
    pub passed: bool,
    pub char_count: usize,
    pub word_count: usize,
    pub printable_ratio: f64,
    pub replacement_ratio: f64,
}

pub fn assess(text: &str) -> QualityReport {
    let char_count = text.chars().count();
    let word_count = text.split_whitespace().count();

    let printable = text.chars().filter(|c| is_printable(*c)).count();
    let printable_ratio = if char_count == 0 { 0.0 } else { printable as f64 / char_count as f64 };

    let replacement = text.chars().filter(|c| *c == '\u{FFFD}').count();
    let replacement_ratio = if char_count == 0 { 0.0 } else { replacement as f64 / char_count as f64 };

    let passed = char_count >= MIN_CHARS
        && word_count >= MIN_WORDS
        && printable_ratio >= MIN_PRINTABLE_RATIO
        && replacement_ratio <= MAX_REPLACEMENT_RATIO;

    QualityReport { passed, char_count, word_count, printable_ratio, replacement_ratio }
}

fn is_printable(c: char) -> bool {
    c.is_whitespace() || (!c.is_control() && c != '\u{FFFD}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_short() {
        let report = assess("too short");
        assert!(!report.passed);
    }

    #[test]
    fn accepts_normal_prose() {
        let text = "This is a perfectly normal article with plenty of readable words in it.";
        let report = assess(text);
        assert!(report.passed);
    }

    #[test]
    fn rejects_high_replacement_ratio() {
        let text = "\u{FFFD}".repeat(50);
        let report = assess(&text);
        assert!(!report.passed);
    }

    #[test]
    fn rejects_mostly_control_chars() {
        let text: String = std::iter::repeat('\u{0}').take(60).collect();
        let report = assess(&text);
        assert!(!report.passed);
    }

    #[test]
    fn empty_text_fails() {
        assert!(!assess("").passed);
    }
}
