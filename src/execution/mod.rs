//! Filesystem side effects
//!
//! Moving processed documents into the output directory, with the
//! collision-safe fallback used when the primary move fails.

pub mod placement;

pub use placement::{PlacementError, Placer, FALLBACK_PREFIX};
