use std::sync::Arc;

use postlens::llm::remote::RemoteLlmProvider;
use postlens::llm::LlmProvider;
use postlens::summary::prompt::PromptBuilder;
use postlens::summary::{SummarizationService, SummaryOutcome};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let _ = dotenv::dotenv();

    let provider: Option<Arc<dyn LlmProvider>> = match std::env::var("OPENAI_API_KEY") {
        Ok(api_key) => {
            // Allow custom base URL or use OpenAI default
            let base_url = std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
            let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

            println!("Base URL: {}", base_url);
            println!("Model: {}", model);
            Some(Arc::new(RemoteLlmProvider::new(base_url, api_key, model)) as Arc<dyn LlmProvider>)
        }
        Err(_) => {
            println!("OPENAI_API_KEY not set; expecting the local fallback");
            None
        }
    };

    let language = std::env::var("LLM_LANGUAGE").unwrap_or_else(|_| "English".to_string());
    let service = SummarizationService::new(provider, PromptBuilder::new(language));

    println!("\n{}", "=".repeat(60));
    println!("Testing summarization pipeline");
    println!("{}", "=".repeat(60));

    let title = "Ownership in Rust";
    let content = r#"Rust is a systems programming language that runs blazingly fast, prevents
segfaults, and guarantees thread safety. It accomplishes these goals through
a unique ownership system that enforces memory safety without requiring a
garbage collector.

The Rust compiler provides helpful error messages and suggestions, making it
easier to write correct code. The language has a growing ecosystem of libraries
called "crates" available through Cargo, Rust's package manager.

Many companies are adopting Rust for critical infrastructure. The language's
performance and safety guarantees make it ideal for operating systems, web
servers, and embedded systems."#;

    let outcome = service.generate(title, content, "study").await;
    match &outcome {
        SummaryOutcome::Generated(_) => println!("✓ Model summary"),
        SummaryOutcome::Fallback { reason, .. } => println!("✗ Fallback summary ({})", reason),
    }

    let record = outcome.record();
    println!("  Model: {}", record.model_version);
    println!("  Confidence: {:.1}", record.confidence_score);
    println!("  Summary: {}", record.summary);
    println!("  Highlights ({} items):", record.highlights.len());
    for (i, highlight) in record.highlights.iter().enumerate() {
        println!("    {}. {}", i + 1, highlight);
    }
    println!("  Keywords: {}", record.keywords.join(", "));

    println!("\n{}", "=".repeat(60));
}
