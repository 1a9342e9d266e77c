/// Framing used for categories without a dedicated entry
const GENERAL_FRAMING: &str =
    "This text is general content. Summarize it around its main content and key points.";

/// (category names, framing). Names are matched case-insensitively.
const CATEGORY_FRAMINGS: &[(&[&str], &str)] = &[
    (
        &["reading", "독서"],
        "This text is about reading. Summarize it around the book's core ideas and insights.",
    ),
    (
        &["study", "학습"],
        "This text is study material. Summarize it around the key concepts and important learning points.",
    ),
    (
        &["daily", "일상"],
        "This text is a record of daily life. Summarize it around the main events and what made them meaningful.",
    ),
    (&["other", "기타"], GENERAL_FRAMING),
];

/// Builds the summarization prompt sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("English")
    }
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Category guidance sentence. Unknown categories get the general framing.
    pub fn framing(category: &str) -> &'static str {
        let category = category.trim();
        CATEGORY_FRAMINGS
            .iter()
            .find(|(names, _)| names.iter().any(|n| n.eq_ignore_ascii_case(category)))
            .map(|(_, framing)| *framing)
            .unwrap_or(GENERAL_FRAMING)
    }

    /// Fixed system instruction accompanying every summarization prompt.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are an expert document summarizer writing in {}. Always respond with valid JSON.",
            self.language
        )
    }

    /// Title and content are embedded verbatim.
    pub fn build(&self, title: &str, content: &str, category: &str) -> String {
        format!(
            r#"You are a professional document summarization assistant. Analyze the text below and respond in the format described.

**Context**: {framing}

**Text to analyze**:
Title: {title}
Content: {content}

**Requirements**:
1. Write a concise summary of 3-5 sentences covering the essentials
2. Extract 3-5 important highlights (1-2 sentences each)
3. Extract 5-8 core keywords
4. Provide a confidence score (1-100)

**Response format (must be valid JSON)**:
{{
    "summary": "The essential content summarized in 3-5 sentences",
    "highlights": [
        "First key point",
        "Second key point",
        "Third key point"
    ],
    "keywords": ["keyword1", "keyword2", "keyword3", "keyword4", "keyword5"],
    "confidence_score": 95
}}

Important: respond with a single valid JSON object only, written in {language}."#,
            framing = Self::framing(category),
            title = title,
            content = content,
            language = self.language,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_title_and_content_verbatim() {
        let builder = PromptBuilder::default();
        let content = "Line one.\n\nLine two with {braces} and \"quotes\".";
        let prompt = builder.build("My Title", content, "study");

        assert!(prompt.contains("Title: My Title"));
        assert!(prompt.contains(content));
        assert!(prompt.contains("key concepts"));
        assert!(prompt.contains("\"confidence_score\": 95"));
        assert!(prompt.ends_with("written in English."));
    }

    #[test]
    fn unknown_category_uses_general_framing() {
        assert_eq!(PromptBuilder::framing("gardening"), GENERAL_FRAMING);
        assert_eq!(PromptBuilder::framing(""), GENERAL_FRAMING);

        let prompt = PromptBuilder::default().build("t", "c", "gardening");
        assert!(prompt.contains(GENERAL_FRAMING));
    }

    #[test]
    fn category_lookup_ignores_case_and_accepts_aliases() {
        let reading = PromptBuilder::framing("reading");
        assert_eq!(PromptBuilder::framing("Reading "), reading);
        assert_eq!(PromptBuilder::framing("독서"), reading);
        assert_ne!(reading, GENERAL_FRAMING);
    }

    #[test]
    fn language_flows_into_prompts() {
        let builder = PromptBuilder::new("Korean");
        assert!(builder.build("t", "c", "daily").ends_with("written in Korean."));
        assert!(builder.system_prompt().contains("Korean"));
    }

    #[test]
    fn build_is_deterministic() {
        let builder = PromptBuilder::default();
        assert_eq!(
            builder.build("a", "b", "other"),
            builder.build("a", "b", "other")
        );
    }
}
