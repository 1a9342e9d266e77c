use std::sync::Arc;

use tracing::{debug, info, warn};

use super::prompt::PromptBuilder;
use super::{extract, fallback, FallbackReason, SummaryOutcome, SummaryRecord};
use crate::llm::{LlmProvider, LlmRequest, ModelCallError};

/// Output budget for summarization calls
pub const SUMMARY_MAX_TOKENS: usize = 1000;
/// Low temperature keeps summaries close to the source
pub const SUMMARY_TEMPERATURE: f32 = 0.3;
/// Output budget for free-form questions
pub const ASK_MAX_TOKENS: usize = 400;
pub const ASK_TEMPERATURE: f32 = 0.7;

/// Orchestrates prompt -> model -> extraction, falling back to the local
/// summarizer on any failure. One model attempt per call, no retries.
pub struct SummarizationService {
    provider: Option<Arc<dyn LlmProvider>>,
    interactive: Option<Arc<dyn LlmProvider>>,
    prompts: PromptBuilder,
}

impl SummarizationService {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, prompts: PromptBuilder) -> Self {
        Self {
            provider,
            interactive: None,
            prompts,
        }
    }

    /// Use a separate provider for [`ask`](Self::ask).
    pub fn with_interactive(mut self, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        self.interactive = provider;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Summarize a post. Always returns a usable record.
    pub async fn generate(&self, title: &str, content: &str, category: &str) -> SummaryOutcome {
        debug!(title, category, "summarization: building prompt");
        let prompt = self.prompts.build(title, content, category);

        match self.call_and_extract(prompt).await {
            Ok(record) => {
                info!(
                    title,
                    model = %record.model_version,
                    confidence = record.confidence_score,
                    "summarization succeeded"
                );
                SummaryOutcome::Generated(record)
            }
            Err(reason) => {
                warn!(title, %reason, "summarization falling back to local summary");
                SummaryOutcome::Fallback {
                    record: fallback::summarize(title, content),
                    reason,
                }
            }
        }
    }

    /// Re-run summarization for an existing post; the record is flagged as regenerated.
    pub async fn regenerate(
        &self,
        post_id: i64,
        title: &str,
        content: &str,
        category: &str,
    ) -> SummaryOutcome {
        info!(post_id, "summarization: regenerating summary");
        let mut outcome = self.generate(title, content, category).await;
        outcome.record_mut().regenerated = true;
        outcome
    }

    /// Free-form single question. Not part of the summary pipeline, so errors surface.
    pub async fn ask(&self, prompt: &str) -> Result<String, ModelCallError> {
        let provider = self
            .interactive
            .as_ref()
            .or(self.provider.as_ref())
            .ok_or(ModelCallError::NotConfigured)?;

        let response = provider
            .generate(LlmRequest {
                system_prompt: None,
                prompt: prompt.to_string(),
                max_tokens: Some(ASK_MAX_TOKENS),
                temperature: Some(ASK_TEMPERATURE),
                timeout_seconds: None,
            })
            .await?;
        Ok(response.content)
    }

    async fn call_and_extract(&self, prompt: String) -> Result<SummaryRecord, FallbackReason> {
        let provider = self.provider.as_ref().ok_or(ModelCallError::NotConfigured)?;

        debug!(model = provider.model(), "summarization: calling model");
        let response = provider
            .generate(LlmRequest {
                system_prompt: Some(self.prompts.system_prompt()),
                prompt,
                max_tokens: Some(SUMMARY_MAX_TOKENS),
                temperature: Some(SUMMARY_TEMPERATURE),
                timeout_seconds: None,
            })
            .await?;

        debug!(
            completion_tokens = response.usage.completion_tokens,
            "summarization: extracting response"
        );
        let mut record = extract::extract(&response.content)?;
        record.model_version = response.model;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, UsageMetadata};
    use crate::summary::FALLBACK_MODEL_VERSION;
    use std::sync::Mutex;

    /// Replies with a canned body and records the requests it saw
    struct CannedProvider {
        reply: Result<String, u16>,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl CannedProvider {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(body.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for CannedProvider {
        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, ModelCallError> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(body) => Ok(LlmResponse {
                    content: body.clone(),
                    usage: UsageMetadata::default(),
                    model: "test-model".to_string(),
                }),
                Err(status) => Err(ModelCallError::Api {
                    status: *status,
                    body: "quota exceeded".into(),
                }),
            }
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    const GOOD: &str = "```json\n{\"summary\":\"A short summary.\",\"highlights\":[\"h1\",\"h2\"],\"keywords\":[\"k1\"],\"confidence_score\":91}\n```";

    fn service(provider: Arc<CannedProvider>) -> SummarizationService {
        SummarizationService::new(Some(provider as Arc<dyn LlmProvider>), PromptBuilder::default())
    }

    #[tokio::test]
    async fn generate_uses_model_output() {
        let provider = CannedProvider::ok(GOOD);
        let outcome = service(provider.clone()).generate("Title", "Body", "study").await;

        assert!(!outcome.used_fallback());
        let record = outcome.record();
        assert_eq!(record.summary, "A short summary.");
        assert_eq!(record.model_version, "test-model");
        assert_eq!(record.confidence_score, 91.0);
        assert!(!record.regenerated);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, Some(SUMMARY_MAX_TOKENS));
        assert_eq!(seen[0].temperature, Some(SUMMARY_TEMPERATURE));
        assert!(seen[0].system_prompt.is_some());
        assert!(seen[0].prompt.contains("Title: Title"));
    }

    #[tokio::test]
    async fn model_failure_falls_back_without_retry() {
        let provider = CannedProvider::failing(429);
        let outcome = service(provider.clone()).generate("My Title", "", "other").await;

        match &outcome {
            SummaryOutcome::Fallback { record, reason } => {
                assert_eq!(record.confidence_score, 30.0);
                assert_eq!(record.model_version, FALLBACK_MODEL_VERSION);
                assert!(matches!(
                    reason,
                    FallbackReason::ModelCall(ModelCallError::Api { status: 429, .. })
                ));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_output_falls_back() {
        let provider = CannedProvider::ok("I cannot summarize this, sorry.");
        let outcome = service(provider).generate("T", "Body text", "daily").await;

        assert!(matches!(
            outcome,
            SummaryOutcome::Fallback {
                reason: FallbackReason::Malformed(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unconfigured_service_falls_back() {
        let service = SummarizationService::new(None, PromptBuilder::default());
        let outcome = service.generate("T", "Body", "other").await;

        assert!(matches!(
            outcome,
            SummaryOutcome::Fallback {
                reason: FallbackReason::ModelCall(ModelCallError::NotConfigured),
                ..
            }
        ));
        assert!(service.ask("hi").await.is_err());
    }

    #[tokio::test]
    async fn regenerate_sets_flag_on_both_paths() {
        let ok = service(CannedProvider::ok(GOOD)).regenerate(1, "T", "B", "other").await;
        assert!(ok.record().regenerated);
        assert!(!ok.used_fallback());

        let failed = service(CannedProvider::failing(500)).regenerate(1, "T", "B", "other").await;
        assert!(failed.record().regenerated);
        assert!(failed.used_fallback());
    }

    #[tokio::test]
    async fn ask_prefers_interactive_provider() {
        let summarizer = CannedProvider::ok(GOOD);
        let chat = CannedProvider::ok("Spring in Seoul is gentle.");
        let service = service(summarizer.clone()).with_interactive(Some(chat.clone() as Arc<dyn LlmProvider>));

        let answer = service.ask("Describe spring").await.expect("answer");
        assert_eq!(answer, "Spring in Seoul is gentle.");
        assert!(summarizer.seen.lock().unwrap().is_empty());

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, Some(ASK_MAX_TOKENS));
        assert_eq!(seen[0].temperature, Some(ASK_TEMPERATURE));
    }
}
