/*
postlens - single-binary main.rs
Starts the Rocket HTTP server with the summarization pipeline wired in.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use common::{init_db_pool, Config, RemoteLlmConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use postlens::coordinator::PostSummaryCoordinator;
use postlens::llm::remote::RemoteLlmProvider;
use postlens::llm::LlmProvider;
use postlens::server::{self, AppState};
use postlens::storage;
use postlens::summary::prompt::PromptBuilder;
use postlens::summary::service::{SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE};
use postlens::summary::SummarizationService;

#[derive(Parser, Debug)]
#[command(name = "postlens", about = "Blog backend with LLM-generated post summaries")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // API keys may live in a local .env file
    if dotenv::dotenv().is_ok() {
        info!(".env loaded");
    }

    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %config.database.path, "failed to initialize database pool");
            return Err(e);
        }
    };

    if config.auto_migrate() {
        info!("Auto-migrate enabled: ensuring schema");
        storage::ensure_schema(&db_pool).await?;
    }

    let (summary_llm, interactive_llm) = match &config.llm {
        Some(llm) if llm.adapter.as_deref() == Some("remote") => (
            llm.remote.as_ref().and_then(|c| build_provider(c, "summarization")),
            llm.interactive.as_ref().and_then(|c| build_provider(c, "interactive")),
        ),
        Some(llm) => {
            warn!(
                adapter = llm.adapter.as_deref().unwrap_or("none"),
                "LLM adapter not supported; summaries will use the local fallback"
            );
            (None, None)
        }
        None => {
            warn!("no [llm] section configured; summaries will use the local fallback");
            (None, None)
        }
    };

    let summarizer = SummarizationService::new(
        summary_llm,
        PromptBuilder::new(config.summary_language()),
    )
    .with_interactive(interactive_llm);
    let coordinator = PostSummaryCoordinator::new(db_pool.clone(), Arc::new(summarizer));

    let state = AppState {
        started_at: Utc::now(),
        db: db_pool,
        coordinator: Arc::new(coordinator),
    };

    info!("Launching Rocket HTTP server");
    if let Err(e) = server::launch_rocket(state, Arc::new(config)).await {
        error!(%e, "Rocket server failed");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Build a remote provider, or `None` (with a warning) when its key is unavailable.
fn build_provider(cfg: &RemoteLlmConfig, role: &str) -> Option<Arc<dyn LlmProvider>> {
    match remote_provider(cfg) {
        Ok(provider) => {
            info!(role, model = provider.model(), "LLM provider initialized");
            Some(Arc::new(provider) as Arc<dyn LlmProvider>)
        }
        Err(e) => {
            warn!(role, "LLM provider unavailable: {:#}", e);
            None
        }
    }
}

fn remote_provider(cfg: &RemoteLlmConfig) -> Result<RemoteLlmProvider> {
    let api_key_env = cfg
        .api_key_env
        .as_deref()
        .context("Missing api_key_env in remote config")?;
    let api_key = std::env::var(api_key_env)
        .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

    let model = cfg.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let api_url = cfg
        .api_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

    Ok(RemoteLlmProvider::new(api_url, api_key, model)
        .with_defaults(
            cfg.timeout_seconds.unwrap_or(30),
            SUMMARY_MAX_TOKENS,
            SUMMARY_TEMPERATURE,
        ))
}
