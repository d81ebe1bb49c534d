//! Filename derivation: sanitize a classifier label, then find a free slot

pub mod resolver;
pub mod sanitizer;

pub use resolver::{resolve_destination, ResolvedPath, MAX_FILENAME_BYTES};
pub use sanitizer::{sanitize_label, UNKNOWN_LABEL};
