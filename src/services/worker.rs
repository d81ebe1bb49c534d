//! Per-document ingestion
//!
//! One run per detected document:
//! extract → classify (with fallbacks) → sanitize → place.
//! Every stage change is reported to the status sink under the document's
//! original filename. Extraction failures leave the file where it is;
//! classification failures only degrade the name, the document is still placed.

use crate::ai::{ClassificationIssue, ClassifierInput, NamingClassifier, NO_CONTENT_INPUT};
use crate::document::{ContentExtractor, ExtractedContent, ImageCandidate, ImageStoreError};
use crate::execution::Placer;
use crate::naming::{sanitize_label, UNKNOWN_LABEL};
use crate::services::status::{Stage, StatusSink, StatusUpdate};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// A document picked up from the input directory
#[derive(Debug, Clone)]
pub struct IncomingDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub detected_at: DateTime<Utc>,
}

impl IncomingDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            file_name,
            detected_at: Utc::now(),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Placed under its derived name
    Placed { new_filename: String, named: bool },
    /// Placed under the `PROCESSING_ERROR_` name after the primary move failed
    FallbackPlaced { new_filename: String },
    /// Left in the input directory
    Failed { reason: String },
}

/// Runs the pipeline for single documents
pub struct IngestionWorker {
    extractor: ContentExtractor,
    classifier: Arc<dyn NamingClassifier>,
    placer: Placer,
    sink: Arc<dyn StatusSink>,
}

impl IngestionWorker {
    pub fn new(classifier: Arc<dyn NamingClassifier>, placer: Placer, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            extractor: ContentExtractor::new(),
            classifier,
            placer,
            sink,
        }
    }

    /// Process one document to a terminal status
    ///
    /// `abandon` fires when the service gave up waiting for in-flight work;
    /// a run that has not started placing by then leaves the file in place.
    pub async fn process(&self, doc: &IncomingDocument, abandon: &CancellationToken) -> WorkerOutcome {
        let name = doc.file_name.as_str();
        tracing::info!("[Worker] Processing PDF: {}", name);
        self.report(name, Stage::Extracting, "Processing...");

        let content = match self.extractor.extract(&doc.path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("[Worker] Extraction failed for {}: {}", name, e);
                return self.fail(name, format!("Error: {}", e));
            }
        };

        self.report(name, Stage::Classifying, "Classifying content");
        let raw_label = self.classify(name, &content).await;

        let base = match raw_label {
            Some(raw) => sanitize_label(&raw),
            None => UNKNOWN_LABEL.to_string(),
        };
        let named = base != UNKNOWN_LABEL;
        if named {
            self.report(name, Stage::Naming, format!("Derived name {}", base));
        } else {
            tracing::warn!("[Worker] Failed to generate a proper name for {}", name);
            self.sink.report(
                StatusUpdate::new(name, Stage::Naming, format!("Naming failed ({})", UNKNOWN_LABEL))
                    .with_new_filename(UNKNOWN_LABEL),
            );
        }

        if abandon.is_cancelled() {
            tracing::warn!("[Worker] Service stopped before placing {}", name);
            return self.fail(name, "Service stopped before placement".to_string());
        }

        self.report(name, Stage::Placing, "Moving file");
        match self.placer.place(&doc.path, &base).await {
            Ok(placed) => {
                self.sink.report(
                    StatusUpdate::new(name, Stage::Succeeded, "Success").with_new_filename(&placed.file_name),
                );
                WorkerOutcome::Placed {
                    new_filename: placed.file_name,
                    named,
                }
            }
            Err(primary) => {
                tracing::error!("[Worker] Error moving {}: {}", name, primary);
                match self.placer.place_fallback(&doc.path, name).await {
                    Ok(placed) => {
                        tracing::info!("[Worker] Fallback name used: {}", placed.path.display());
                        self.sink.report(
                            StatusUpdate::new(
                                name,
                                Stage::Failed,
                                format!("Error: {} (moved to fallback name)", primary),
                            )
                            .with_new_filename(&placed.file_name),
                        );
                        WorkerOutcome::FallbackPlaced {
                            new_filename: placed.file_name,
                        }
                    }
                    Err(fallback) => {
                        tracing::error!(
                            "[Worker] Critical: {} could not be moved: {}",
                            doc.path.display(),
                            fallback
                        );
                        self.fail(name, format!("Critical: {}", fallback))
                    }
                }
            }
        }
    }

    /// Walk the fallback chain; `None` when every attempt failed
    async fn classify(&self, name: &str, content: &ExtractedContent) -> Option<String> {
        match &content.image {
            Some(image) => match store_image(image).await {
                Ok(stored) => {
                    tracing::info!(
                        "[Worker] Best image ({} px) stored at {}, proceeding with vision",
                        image.area(),
                        stored.path().display()
                    );
                    let input = ClassifierInput::ImageWithText {
                        image: stored.path(),
                        text: &content.text,
                    };
                    match self.classifier.classify(input).await {
                        Ok(label) => return Some(label),
                        Err(e) => {
                            tracing::warn!("[Worker] Image classification failed for {}: {}", name, e);
                            self.issue(name, ClassificationIssue::from(&e));
                        }
                    }
                    // `stored` dropped here, removing the temporary image
                }
                Err(e) => {
                    tracing::error!("[Worker] Failed to store image for {}: {}", name, e);
                    self.issue(name, ClassificationIssue::ImageStoreFailed);
                }
            },
            None => self.issue(name, ClassificationIssue::NoImageFound),
        }

        let text = content.text.trim();
        let input = if text.is_empty() {
            tracing::warn!("[Worker] No content (vision or text) available for naming {}", name);
            ClassifierInput::Text(NO_CONTENT_INPUT)
        } else {
            ClassifierInput::Text(text)
        };

        match self.classifier.classify(input).await {
            Ok(label) => Some(label),
            Err(e) => {
                tracing::warn!("[Worker] Text classification failed for {}: {}", name, e);
                self.issue(name, ClassificationIssue::from(&e));
                None
            }
        }
    }

    fn issue(&self, name: &str, issue: ClassificationIssue) {
        self.report(name, Stage::Classifying, issue.status_text());
    }

    fn report(&self, name: &str, stage: Stage, message: impl Into<String>) {
        self.sink.report(StatusUpdate::new(name, stage, message));
    }

    fn fail(&self, name: &str, reason: String) -> WorkerOutcome {
        self.report(name, Stage::Failed, reason.clone());
        WorkerOutcome::Failed { reason }
    }
}

/// Write the image to a temporary file that is removed when dropped
async fn store_image(image: &ImageCandidate) -> Result<NamedTempFile, ImageStoreError> {
    let image = image.clone();
    tokio::task::spawn_blocking(move || {
        let (bytes, extension) = image.to_file_bytes()?;
        let mut file = tempfile::Builder::new()
            .prefix("pdf-renamer-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| ImageStoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
}
