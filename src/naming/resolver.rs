//! Collision-free destination paths
//!
//! Probes `base.ext`, `base_1.ext`, `base_2.ext`, ... in the destination
//! directory and returns the first free one. This is a probe, not a
//! reservation: callers serialize resolve-and-move through
//! [`crate::execution::Placer`].

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Maximum length of a complete file name (base + suffix + extension), in bytes
pub const MAX_FILENAME_BYTES: usize = 240;

/// Counter probes before giving up on sequential suffixes
const MAX_PROBES: u32 = 10_000;

/// A destination that did not exist when it was checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Full destination path
    pub path: PathBuf,
    /// File name component of `path`
    pub file_name: String,
    /// Disambiguating counter, if one was needed
    pub suffix: Option<u32>,
}

/// Find a non-existing `dir/base[_N].ext` whose file name fits in
/// [`MAX_FILENAME_BYTES`]
pub fn resolve_destination(base: &str, dir: &Path, extension: &str) -> ResolvedPath {
    let extension = extension.trim_start_matches('.');
    let ext_len = if extension.is_empty() { 0 } else { extension.len() + 1 };

    // Over-long names are cut down once, then probed with a fresh counter
    let base: Cow<str> = if base.len() + ext_len > MAX_FILENAME_BYTES {
        let cut = truncate_to_bytes(base, MAX_FILENAME_BYTES.saturating_sub(ext_len));
        tracing::debug!(
            "[Resolver] Truncated base name from {} to {} bytes",
            base.len(),
            cut.len()
        );
        Cow::Owned(cut)
    } else {
        Cow::Borrowed(base)
    };

    let first = compose(&base, "", extension);
    let path = dir.join(&first);
    if !is_occupied(&path) {
        return ResolvedPath {
            path,
            file_name: first,
            suffix: None,
        };
    }

    for counter in 1..=MAX_PROBES {
        let suffix = format!("_{}", counter);
        let name = compose_fitting(&base, &suffix, extension);
        let path = dir.join(&name);
        if !is_occupied(&path) {
            return ResolvedPath {
                path,
                file_name: name,
                suffix: Some(counter),
            };
        }
    }

    // Safety limit - use UUID suffix
    let suffix = format!("_{}", uuid::Uuid::new_v4().simple());
    let name = compose_fitting(&base, &suffix, extension);
    tracing::warn!("[Resolver] {} probes exhausted for '{}', using {}", MAX_PROBES, base, name);
    ResolvedPath {
        path: dir.join(&name),
        file_name: name,
        suffix: None,
    }
}

/// Whether anything (including a dangling symlink) already occupies `path`
pub(crate) fn is_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn compose(base: &str, suffix: &str, extension: &str) -> String {
    if extension.is_empty() {
        format!("{}{}", base, suffix)
    } else {
        format!("{}{}.{}", base, suffix, extension)
    }
}

/// Compose a name, shortening `base` so the suffix and extension still fit
fn compose_fitting(base: &str, suffix: &str, extension: &str) -> String {
    let ext_len = if extension.is_empty() { 0 } else { extension.len() + 1 };
    let budget = MAX_FILENAME_BYTES.saturating_sub(suffix.len() + ext_len);
    if base.len() <= budget {
        compose(base, suffix, extension)
    } else {
        compose(&truncate_to_bytes(base, budget), suffix, extension)
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
fn truncate_to_bytes(s: &str, max_bytes: usize) -> String {
    let mut end = 0;
    for (idx, ch) in s.char_indices() {
        let next = idx + ch.len_utf8();
        if next > max_bytes {
            break;
        }
        end = next;
    }

    let cut = s[..end].trim_end_matches('_');
    if cut.is_empty() {
        s.chars().take(1).collect()
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_free_name() {
        let dir = tempdir().unwrap();
        let resolved = resolve_destination("Invoice", dir.path(), "pdf");
        assert_eq!(resolved.file_name, "Invoice.pdf");
        assert_eq!(resolved.path, dir.path().join("Invoice.pdf"));
        assert_eq!(resolved.suffix, None);
    }

    #[test]
    fn test_resolve_appends_counter_on_collision() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Invoice.pdf"), b"a").unwrap();

        let first = resolve_destination("Invoice", dir.path(), "pdf");
        assert_eq!(first.file_name, "Invoice_1.pdf");
        assert_eq!(first.suffix, Some(1));

        fs::write(&first.path, b"b").unwrap();
        let second = resolve_destination("Invoice", dir.path(), "pdf");
        assert_eq!(second.file_name, "Invoice_2.pdf");
    }

    #[test]
    fn test_resolve_counters_strictly_increase() {
        let dir = tempdir().unwrap();
        let mut last = None;
        for _ in 0..6 {
            let resolved = resolve_destination("Scan", dir.path(), ".pdf");
            assert!(!resolved.path.exists());
            let current = resolved.suffix.unwrap_or(0);
            if let Some(previous) = last {
                assert!(current > previous);
            }
            last = Some(current);
            fs::write(&resolved.path, b"x").unwrap();
        }
        assert_eq!(last, Some(5));
    }

    #[test]
    fn test_resolve_skips_gaps_only_when_occupied() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Doc.pdf"), b"a").unwrap();
        fs::write(dir.path().join("Doc_2.pdf"), b"a").unwrap();
        let resolved = resolve_destination("Doc", dir.path(), "pdf");
        assert_eq!(resolved.file_name, "Doc_1.pdf");
    }

    #[test]
    fn test_resolve_truncates_long_names() {
        let dir = tempdir().unwrap();
        let base = "x".repeat(400);
        let resolved = resolve_destination(&base, dir.path(), "pdf");
        assert_eq!(resolved.file_name.len(), MAX_FILENAME_BYTES);
        assert!(resolved.file_name.ends_with(".pdf"));
    }

    #[test]
    fn test_resolve_suffixed_long_names_stay_within_limit() {
        let dir = tempdir().unwrap();
        let base = "y".repeat(400);
        let first = resolve_destination(&base, dir.path(), "pdf");
        fs::write(&first.path, b"a").unwrap();

        let second = resolve_destination(&base, dir.path(), "pdf");
        assert!(second.file_name.len() <= MAX_FILENAME_BYTES);
        assert!(second.file_name.ends_with("_1.pdf"));
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn test_resolve_truncates_on_char_boundary() {
        let dir = tempdir().unwrap();
        let base = "ü".repeat(200); // 400 bytes
        let resolved = resolve_destination(&base, dir.path(), "pdf");
        assert!(resolved.file_name.len() <= MAX_FILENAME_BYTES);
        assert!(resolved.file_name.starts_with('ü'));
    }

    #[test]
    fn test_resolve_treats_dangling_symlink_as_occupied() {
        #[cfg(unix)]
        {
            let dir = tempdir().unwrap();
            std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("Link.pdf"))
                .unwrap();
            let resolved = resolve_destination("Link", dir.path(), "pdf");
            assert_eq!(resolved.file_name, "Link_1.pdf");
        }
    }

    #[test]
    fn test_truncate_to_bytes_trims_trailing_underscore() {
        assert_eq!(truncate_to_bytes("abc_def", 4), "abc");
        assert_eq!(truncate_to_bytes("abc", 10), "abc");
    }
}
