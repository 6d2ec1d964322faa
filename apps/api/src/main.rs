mod analysis;
mod benchmark;
mod cache;
mod config;
mod errors;
mod llm_client;
mod parsing;
mod pipeline;
mod progress;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::backends::{AnthropicBackend, OpenAiBackend};
use crate::analysis::keywords::StaticKeywordProvider;
use crate::analysis::DualModelAnalyzer;
use crate::config::Config;
use crate::llm_client::{openai::OpenAiClient, LlmClient};
use crate::parsing::structuring::{LlmStructurer, TextStructurer};
use crate::parsing::ParsingCascade;
use crate::pipeline::AtsService;
use crate::progress::ProgressTracker;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ATS API v{}", env!("CARGO_PKG_VERSION"));

    // Model clients
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    let openai = OpenAiClient::new(config.openai_api_key.clone());
    info!(
        "LLM clients initialized (models: {}, {})",
        llm_client::MODEL,
        llm_client::openai::MODEL
    );

    // Parsing cascade
    let structurer: Option<Arc<dyn TextStructurer>> = if config.ai_structuring {
        Some(Arc::new(LlmStructurer::new(llm.clone())))
    } else {
        None
    };
    let cascade = ParsingCascade::new(config.work_dir.clone(), config.cascade_mode, structurer);
    info!(
        "Parsing cascade: mode={:?} ai_structuring={} work_dir={}",
        cascade.mode(),
        config.ai_structuring,
        config.work_dir.display()
    );

    // Dual-model analyzer
    let analyzer = DualModelAnalyzer::new(
        Arc::new(AnthropicBackend::new(llm)),
        Arc::new(OpenAiBackend::new(openai)),
        Arc::new(StaticKeywordProvider),
        config.backend_timeout,
        config.cache_max_size,
        config.cache_ttl,
    );

    // Progress tracker + periodic sweep
    let progress = Arc::new(ProgressTracker::new(config.progress_retention));
    let sweeper = progress.clone().spawn_sweeper(config.progress_sweep_interval);

    let service = AtsService::new(cascade, analyzer, progress, config.pipeline);
    let state = AppState {
        service: Arc::new(service),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
