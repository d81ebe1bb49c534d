//! Startup and service-level errors
//!
//! Per-document errors live next to the code that raises them
//! (`document::ExtractionError`, `ai::ClassifyError`,
//! `execution::PlacementError`). Everything here is fatal at startup and
//! never retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{role} directory does not exist: {}", path.display())]
    MissingDirectory { role: &'static str, path: PathBuf },

    #[error("{role} path is not a directory: {}", path.display())]
    NotADirectory { role: &'static str, path: PathBuf },

    #[error("{role} directory is not accessible: {}: {source}", path.display())]
    Inaccessible {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input and output directories must differ: {}", .0.display())]
    SameDirectory(PathBuf),

    #[error("API key not configured for provider '{0}'")]
    MissingCredential(String),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Failure to start or run the ingestion service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to watch input directory: {0}")]
    Watcher(#[from] notify::Error),
}
