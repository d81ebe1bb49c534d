//! Naming classifier boundary
//!
//! The worker only talks to [`NamingClassifier`]; the OpenAI adapter and the
//! test stubs implement it.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Input used when neither an image nor page text is available
pub const NO_CONTENT_INPUT: &str = "No content available";

/// What the classifier is asked to name
#[derive(Debug, Clone, Copy)]
pub enum ClassifierInput<'a> {
    /// Stored image of the best embedded picture plus the page text
    ImageWithText { image: &'a Path, text: &'a str },
    /// Plain text only
    Text(&'a str),
}

impl ClassifierInput<'_> {
    pub fn shape(&self) -> &'static str {
        match self {
            ClassifierInput::ImageWithText { .. } => "image",
            ClassifierInput::Text(_) => "text",
        }
    }
}

/// Produces a candidate label for a document
#[async_trait]
pub trait NamingClassifier: Send + Sync {
    async fn classify(&self, input: ClassifierInput<'_>) -> Result<String, ClassifyError>;
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Non-success HTTP status, timeout or transport failure after retries
    #[error("classification service error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Service { status: Option<u16>, message: String },

    #[error("classification service returned an empty label")]
    EmptyResponse,

    #[error("unexpected classification failure: {0}")]
    Unexpected(String),
}

impl ClassifyError {
    pub fn service(message: impl Into<String>) -> Self {
        ClassifyError::Service {
            status: None,
            message: message.into(),
        }
    }
}

/// Why the best naming signal could not be used, as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationIssue {
    NoImageFound,
    ImageStoreFailed,
    ServiceError,
    Unexpected,
    EmptyLabel,
}

impl ClassificationIssue {
    pub fn status_text(&self) -> &'static str {
        match self {
            ClassificationIssue::NoImageFound => "No usable image found",
            ClassificationIssue::ImageStoreFailed => "Error: Failed to store image",
            ClassificationIssue::ServiceError => "Error: classification service",
            ClassificationIssue::Unexpected => "Error: classification failed unexpectedly",
            ClassificationIssue::EmptyLabel => "Classification returned no usable label",
        }
    }
}

impl From<&ClassifyError> for ClassificationIssue {
    fn from(err: &ClassifyError) -> Self {
        match err {
            ClassifyError::Service { .. } => ClassificationIssue::ServiceError,
            ClassifyError::EmptyResponse => ClassificationIssue::EmptyLabel,
            ClassifyError::Unexpected(_) => ClassificationIssue::Unexpected,
        }
    }
}

impl std::fmt::Display for ClassificationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status_text())
    }
}
