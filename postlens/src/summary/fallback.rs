// Local summary used when the model path fails
use super::{SummaryRecord, FALLBACK_MODEL_VERSION};

/// Marks the record as locally derived and unreliable
pub const FALLBACK_CONFIDENCE: f64 = 30.0;

const SUMMARY_CHARS: usize = 200;
const HIGHLIGHT_CHARS: usize = 100;
const MIN_HIGHLIGHT_CHARS: usize = 10;
const MAX_HIGHLIGHTS: usize = 3;
const MAX_KEYWORDS: usize = 5;
const DEFAULT_KEYWORDS: [&str; 3] = ["document", "content", "information"];

/// Deterministic summary computed from the post itself. Never fails.
pub fn summarize(title: &str, content: &str) -> SummaryRecord {
    SummaryRecord {
        summary: format!("This post is about '{}'. {}", title, excerpt(content)),
        highlights: highlights(title, content),
        keywords: keywords(title),
        model_version: FALLBACK_MODEL_VERSION.to_string(),
        confidence_score: FALLBACK_CONFIDENCE,
        regenerated: false,
    }
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > SUMMARY_CHARS {
        format!("{}...", truncate_chars(content, SUMMARY_CHARS))
    } else {
        content.to_string()
    }
}

/// First sentence of each of the first paragraphs.
fn highlights(title: &str, content: &str) -> Vec<String> {
    let found: Vec<String> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_HIGHLIGHTS)
        .filter_map(|paragraph| {
            let first = paragraph.split('.').next().unwrap_or(paragraph);
            let sentence = format!("{}.", first);
            (sentence.chars().count() > MIN_HIGHLIGHT_CHARS)
                .then(|| truncate_chars(&sentence, HIGHLIGHT_CHARS).to_string())
        })
        .collect();

    if found.is_empty() {
        vec![
            format!("This post is about '{}'.", title),
            "See the original post for details.".to_string(),
        ]
    } else {
        found
    }
}

fn keywords(title: &str) -> Vec<String> {
    let words: Vec<String> = title
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
    } else {
        words
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_uses_generic_highlights() {
        let record = summarize("My Title", "");

        assert_eq!(
            record.highlights,
            vec![
                "This post is about 'My Title'.".to_string(),
                "See the original post for details.".to_string(),
            ]
        );
        assert_eq!(record.keywords, vec!["My", "Title"]);
        assert_eq!(record.confidence_score, 30.0);
        assert_eq!(record.model_version, FALLBACK_MODEL_VERSION);
        assert!(record.is_fallback());
        assert_eq!(record.summary, "This post is about 'My Title'. ");
    }

    #[test]
    fn long_content_is_truncated_with_ellipsis() {
        let content = "word ".repeat(100);
        let record = summarize("T", &content);

        let expected = format!("This post is about 'T'. {}...", &content[..200]);
        assert_eq!(record.summary, expected);
    }

    #[test]
    fn content_at_limit_is_not_truncated() {
        let content = "a".repeat(200);
        let record = summarize("T", &content);
        assert!(!record.summary.ends_with("..."));
    }

    #[test]
    fn highlights_take_first_sentence_of_first_paragraphs() {
        let content = "First paragraph opens here. More text.\n\n\n\nSecond paragraph sentence. Tail.\n\nok.\n\nFourth paragraph is ignored entirely.\n\nFifth.";
        let record = summarize("Title", content);

        assert_eq!(
            record.highlights,
            vec![
                "First paragraph opens here.".to_string(),
                "Second paragraph sentence.".to_string(),
            ]
        );
    }

    #[test]
    fn highlights_are_capped_at_100_chars() {
        let content = "x".repeat(500);
        let record = summarize("Title", &content);
        assert_eq!(record.highlights.len(), 1);
        assert_eq!(record.highlights[0].chars().count(), 100);
    }

    #[test]
    fn keywords_skip_single_chars_and_cap_at_five() {
        let record = summarize("a Rust b ownership and borrowing for everyone today", "");
        assert_eq!(
            record.keywords,
            vec!["Rust", "ownership", "and", "borrowing", "for"]
        );

        let record = summarize("a b", "");
        assert_eq!(record.keywords, vec!["document", "content", "information"]);
    }

    #[test]
    fn multibyte_content_never_panics() {
        let content = "한국어 문장입니다".repeat(60);
        let record = summarize("제목", &content);
        assert!(record.summary.ends_with("..."));
        assert_eq!(record.keywords, vec!["제목"]);

        let record = summarize("", "no punctuation at all just words");
        assert_eq!(record.highlights, vec!["no punctuation at all just words."]);
    }
}
