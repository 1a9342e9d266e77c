//! Summarization pipeline: prompt, model call, extraction, fallback.

use serde::{Deserialize, Serialize};

use crate::llm::ModelCallError;

pub mod extract;
pub mod fallback;
pub mod prompt;
pub mod service;

pub use extract::ExtractError;
pub use service::SummarizationService;

/// `model_version` stamped on records produced without the model
pub const FALLBACK_MODEL_VERSION: &str = "fallback";

/// Structured summary attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub summary: String,
    pub highlights: Vec<String>,
    pub keywords: Vec<String>,
    pub model_version: String,
    /// Always within [0, 100]
    pub confidence_score: f64,
    #[serde(default)]
    pub regenerated: bool,
}

impl SummaryRecord {
    pub fn is_fallback(&self) -> bool {
        self.model_version == FALLBACK_MODEL_VERSION
    }
}

/// Why the pipeline fell back to the local summarizer
#[derive(Debug, thiserror::Error)]
pub enum FallbackReason {
    #[error("model call failed: {0}")]
    ModelCall(#[from] ModelCallError),
    #[error("{0}")]
    Malformed(#[from] ExtractError),
}

/// Result of one summarization run. Both variants carry a usable record.
#[derive(Debug)]
pub enum SummaryOutcome {
    Generated(SummaryRecord),
    Fallback {
        record: SummaryRecord,
        reason: FallbackReason,
    },
}

impl SummaryOutcome {
    pub fn record(&self) -> &SummaryRecord {
        match self {
            SummaryOutcome::Generated(record) => record,
            SummaryOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> SummaryRecord {
        match self {
            SummaryOutcome::Generated(record) => record,
            SummaryOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self, SummaryOutcome::Fallback { .. })
    }

    fn record_mut(&mut self) -> &mut SummaryRecord {
        match self {
            SummaryOutcome::Generated(record) => record,
            SummaryOutcome::Fallback { record, .. } => record,
        }
    }
}
