// Library crate for pdf-renamer
// Binary is in main.rs

pub mod ai;
pub mod config;
pub mod document;
pub mod error;
pub mod execution;
pub mod naming;
pub mod services;

use ai::{CredentialManager, OpenAiClassifier};
use config::ServiceConfig;
use error::ServiceError;
use services::status::{Stage, StatusTable};
use services::IngestionService;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run the service until Ctrl-C
pub async fn run() -> Result<(), ServiceError> {
    // Load .env file - current dir first, then parent
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Initialize tracing with RUST_LOG env filter
    // Default: warn for most crates, info for ours
    // Use RUST_LOG=debug for verbose per-document logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,pdf_renamer=info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let api_key = CredentialManager::get_api_key("openai")?;
    let classifier = Arc::new(OpenAiClassifier::new(api_key, &config.model, &config.base_url));
    let table = Arc::new(StatusTable::new());

    tracing::info!("Using model {} at {}", config.model, config.base_url);
    let handle = IngestionService::start(config, classifier, table.clone())?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }

    let summary = handle.stop().await;
    tracing::info!(
        "Processed {} documents: {} placed, {} fallback, {} failed, {} not started, {} abandoned",
        summary.dispatched,
        summary.succeeded,
        summary.fallback,
        summary.failed,
        summary.not_started,
        summary.abandoned
    );

    for record in table.snapshot() {
        let new_name = record.new_filename.as_deref().unwrap_or("-");
        match record.stage {
            Stage::Succeeded => tracing::info!(
                "{} -> {} ({})",
                record.original_filename,
                new_name,
                record.message
            ),
            stage if stage.is_terminal() => tracing::warn!(
                "{} -> {} [{:?}] {}",
                record.original_filename,
                new_name,
                stage,
                record.message
            ),
            stage => tracing::warn!(
                "{} was still at {:?} when the service stopped",
                record.original_filename,
                stage
            ),
        }
    }

    Ok(())
}
