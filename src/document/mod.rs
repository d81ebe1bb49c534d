//! PDF content extraction
//!
//! Reads the first page of a document and returns the signals used for naming:
//! its text and its largest embedded image.

pub mod extractor;
pub mod image;

#[cfg(test)]
pub(crate) mod test_pdf;

pub use extractor::ContentExtractor;
pub use image::{ImageCandidate, ImageEncoding, ImageStoreError};

use std::path::PathBuf;
use thiserror::Error;

/// What the extractor pulled out of the first page
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Cleaned first-page text; empty when the page has no extractable text
    pub text: String,
    /// Largest image by pixel area, `None` when the page has no images
    pub image: Option<ImageCandidate>,
    pub page_count: usize,
    pub images_seen: usize,
}

/// Fatal extraction failures; the document cannot be classified at all
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to open PDF {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("PDF has no pages: {0}")]
    NoPages(PathBuf),

    #[error("PDF parser panicked on {0}")]
    Panicked(PathBuf),

    #[error("extraction task failed: {0}")]
    Task(String),
}
