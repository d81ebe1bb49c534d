//! Placing documents in the output directory
//!
//! Resolution and the move run under one lock per output directory, so two
//! workers that derive the same name cannot both pick the same free slot.
//! The move itself never replaces an existing file: `rename` is only tried
//! after the occupancy check inside the lock, and the cross-filesystem copy
//! opens its destination with `create_new`.

use crate::naming::resolver::{is_occupied, resolve_destination, ResolvedPath};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Prefix for documents that could not be placed under their derived name
pub const FALLBACK_PREFIX: &str = "PROCESSING_ERROR_";

/// Re-resolve attempts when a chosen slot turns out to be taken
const MAX_PLACE_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no free destination found for {0}")]
    Exhausted(String),

    #[error("placement task failed: {0}")]
    Task(String),
}

/// Moves documents into one output directory
#[derive(Debug, Clone)]
pub struct Placer {
    output_dir: PathBuf,
    extension: String,
    lock: Arc<Mutex<()>>,
    #[cfg(test)]
    refuse_base: Option<String>,
}

impl Placer {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            lock: Arc::new(Mutex::new(())),
            #[cfg(test)]
            refuse_base: None,
        }
    }

    /// Fail every move whose base name is `base`, as an unwritable target would
    #[cfg(test)]
    pub(crate) fn refusing(mut self, base: &str) -> Self {
        self.refuse_base = Some(base.to_string());
        self
    }

    /// Move `source` to `<base>.<ext>` (or the next free suffix)
    pub async fn place(&self, source: &Path, base: &str) -> Result<ResolvedPath, PlacementError> {
        let placer = self.clone();
        let source = source.to_path_buf();
        let base = base.to_string();
        let extension = self.extension.clone();

        tokio::task::spawn_blocking(move || placer.place_blocking(&source, &base, &extension))
            .await
            .map_err(|e| PlacementError::Task(e.to_string()))?
    }

    /// Move `source` to `PROCESSING_ERROR_<original name>`, keeping its own extension
    pub async fn place_fallback(
        &self,
        source: &Path,
        original_name: &str,
    ) -> Result<ResolvedPath, PlacementError> {
        let original = Path::new(original_name);
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| original_name.to_string());
        let extension = original
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let base = format!("{}{}", FALLBACK_PREFIX, stem);

        let placer = self.clone();
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || placer.place_blocking(&source, &base, &extension))
            .await
            .map_err(|e| PlacementError::Task(e.to_string()))?
    }

    fn place_blocking(
        &self,
        source: &Path,
        base: &str,
        extension: &str,
    ) -> Result<ResolvedPath, PlacementError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        #[cfg(test)]
        if self.refuse_base.as_deref() == Some(base) {
            return Err(PlacementError::Move {
                from: source.to_path_buf(),
                to: self.output_dir.join(base),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }

        for attempt in 1..=MAX_PLACE_ATTEMPTS {
            let resolved = resolve_destination(base, &self.output_dir, extension);

            match move_no_clobber(source, &resolved.path) {
                Ok(()) => {
                    tracing::info!(
                        "[Placer] File moved from {} to {}",
                        source.display(),
                        resolved.path.display()
                    );
                    return Ok(resolved);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!(
                        "[Placer] {} appeared before the move (attempt {}/{}), resolving again",
                        resolved.file_name,
                        attempt,
                        MAX_PLACE_ATTEMPTS
                    );
                    continue;
                }
                Err(source_err) => {
                    return Err(PlacementError::Move {
                        from: source.to_path_buf(),
                        to: resolved.path,
                        source: source_err,
                    });
                }
            }
        }

        Err(PlacementError::Exhausted(base.to_string()))
    }
}

/// Move a file without ever replacing an existing destination
fn move_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    if is_occupied(destination) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", destination.display()),
        ));
    }

    // Try rename first (same filesystem), fall back to copy+delete
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if !is_occupied(source) => Err(e),
        Err(e) => {
            tracing::debug!(
                "[Placer] rename failed ({}), copying {} instead",
                e,
                source.display()
            );
            copy_then_remove(source, destination)
        }
    }
}

fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut input, &mut output).and_then(|_| output.sync_all());
    drop(output);
    if let Err(e) = copied {
        let _ = fs::remove_file(destination);
        return Err(e);
    }

    // Keep exactly one copy: if the source cannot go, the destination goes
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}
