//! Service configuration
//!
//! The core never loads or saves configuration files itself. Values come from
//! the environment (optionally seeded from a `.env` file in `run()`), and
//! `validate()` checks the directories before the watcher starts.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const ENV_INPUT_DIR: &str = "PDF_RENAMER_INPUT_DIR";
const ENV_OUTPUT_DIR: &str = "PDF_RENAMER_OUTPUT_DIR";
const ENV_MODEL: &str = "PDF_RENAMER_MODEL";
const ENV_WORKERS: &str = "PDF_RENAMER_WORKERS";
const ENV_SHUTDOWN_GRACE: &str = "PDF_RENAMER_SHUTDOWN_GRACE_SECS";
const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

/// Everything the ingestion service needs besides the API credential
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory watched (non-recursively) for new documents
    pub input_dir: PathBuf,

    /// Directory renamed documents are placed into
    pub output_dir: PathBuf,

    /// Classification model identifier
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Document extension to pick up (compared case-insensitively)
    pub extension: String,

    /// Documents processed concurrently
    pub max_workers: usize,

    /// How long the watcher waits for writes to settle
    pub debounce: Duration,

    /// How long `stop()` waits for in-flight documents
    pub shutdown_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("inbox"),
            output_dir: PathBuf::from("processed"),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            extension: "pdf".to_string(),
            max_workers: 4,
            debounce: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(dir) = get(ENV_INPUT_DIR) {
            config.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(workers) = get(ENV_WORKERS) {
            config.max_workers = match workers.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_WORKERS,
                        value: workers,
                    })
                }
            };
        }
        if let Some(secs) = get(ENV_SHUTDOWN_GRACE) {
            let parsed = secs.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SHUTDOWN_GRACE,
                value: secs.clone(),
            })?;
            config.shutdown_grace = Duration::from_secs(parsed);
        }

        Ok(config)
    }

    /// Check that both directories exist, are readable and are distinct
    pub fn validate(&self) -> Result<(), ConfigError> {
        let input = validate_directory("Input", &self.input_dir)?;
        let output = validate_directory("Output", &self.output_dir)?;

        // Placing output inside the watched folder would re-trigger the watcher
        if input == output {
            return Err(ConfigError::SameDirectory(input));
        }

        Ok(())
    }
}

/// Returns the canonical path of a usable directory
fn validate_directory(role: &'static str, path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingDirectory {
            role,
            path: path.to_path_buf(),
        });
    }

    if !path.is_dir() {
        return Err(ConfigError::NotADirectory {
            role,
            path: path.to_path_buf(),
        });
    }

    std::fs::read_dir(path).map_err(|source| ConfigError::Inaccessible {
        role,
        path: path.to_path_buf(),
        source,
    })?;

    path.canonicalize().map_err(|source| ConfigError::Inaccessible {
        role,
        path: path.to_path_buf(),
        source,
    })
}
