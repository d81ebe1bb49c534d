//! First-page content extraction
//!
//! Pulls the text of page 1 and the single largest embedded image on it.
//! Only the current best image is kept while scanning; the others are
//! dropped as soon as they lose.

use super::image::{ImageCandidate, ImageEncoding};
use super::{ExtractedContent, ExtractionError};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum characters of page text handed to the classifier
const MAX_TEXT_CHARS: usize = 8_000;

/// How deep to follow Form XObjects looking for nested images
const MAX_FORM_DEPTH: usize = 3;

/// Extracts naming signals from PDF documents
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_text_chars: usize,
}

impl ContentExtractor {
    pub fn new() -> Self {
        Self {
            max_text_chars: MAX_TEXT_CHARS,
        }
    }

    /// Extract on the blocking pool; a panicking parser fails only this document
    pub async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractionError> {
        let extractor = self.clone();
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract_blocking(&path))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
    }

    /// Extract first-page text and best image (blocking version)
    pub fn extract_blocking(&self, path: &Path) -> Result<ExtractedContent, ExtractionError> {
        // lopdf can panic on malformed streams
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.extract_inner(path))) {
            Ok(result) => result,
            Err(_panic) => {
                tracing::error!(
                    "[Extractor] PDF parsing PANICKED for {} - likely malformed",
                    path.display()
                );
                Err(ExtractionError::Panicked(path.to_path_buf()))
            }
        }
    }

    fn extract_inner(&self, path: &Path) -> Result<ExtractedContent, ExtractionError> {
        tracing::debug!("[Extractor] Opening {}", path.display());

        let document = Document::load(path).map_err(|source| ExtractionError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let pages = document.get_pages();
        let page_count = pages.len();
        let (&first_number, &first_page) = pages
            .iter()
            .next()
            .ok_or_else(|| ExtractionError::NoPages(path.to_path_buf()))?;

        let text = match document.extract_text(&[first_number]) {
            Ok(raw) => clean_text(&raw, self.max_text_chars),
            Err(e) => {
                // Unreadable text is not fatal; the image path may still work
                tracing::warn!(
                    "[Extractor] Text extraction failed for {}: {}",
                    path.display(),
                    e
                );
                String::new()
            }
        };
        tracing::debug!(
            "[Extractor] Extracted text from first page (length {})",
            text.chars().count()
        );

        let mut scan = ImageScan::default();
        if let Some(resources) = page_resources(&document, first_page) {
            scan.visit_resources(&document, resources, 0);
        }

        let image = match scan.best {
            Some(best) => {
                tracing::debug!(
                    "[Extractor] Best image candidate {}x{} (area {}, object {:?}) out of {} images",
                    best.width,
                    best.height,
                    best.area,
                    best.id,
                    scan.seen
                );
                Some(materialize(&document, &best))
            }
            None => {
                tracing::warn!("[Extractor] No images found in PDF: {}", file_label(path));
                None
            }
        };

        Ok(ExtractedContent {
            text,
            image,
            page_count,
            images_seen: scan.seen,
        })
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-so-far image while walking page resources
#[derive(Debug, Clone)]
struct BestImage {
    id: ObjectId,
    width: u32,
    height: u32,
    area: u64,
}

#[derive(Default)]
struct ImageScan {
    best: Option<BestImage>,
    seen: usize,
    visited: HashSet<ObjectId>,
}

impl ImageScan {
    fn visit_resources(&mut self, doc: &Document, resources: &Dictionary, depth: usize) {
        let xobjects = match resources.get(b"XObject").ok().and_then(|o| resolve_dict(doc, o)) {
            Some(dict) => dict,
            None => return,
        };

        for (_name, value) in xobjects.iter() {
            let id = match value.as_reference() {
                Ok(id) => id,
                Err(_) => continue,
            };
            if !self.visited.insert(id) {
                continue;
            }
            let stream = match doc.get_object(id).and_then(Object::as_stream) {
                Ok(stream) => stream,
                Err(_) => continue,
            };

            match name_of(&stream.dict, b"Subtype").as_deref() {
                Some("Image") => self.consider(id, stream),
                Some("Form") if depth < MAX_FORM_DEPTH => {
                    if let Some(inner) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| resolve_dict(doc, o))
                    {
                        self.visit_resources(doc, inner, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }

    fn consider(&mut self, id: ObjectId, stream: &Stream) {
        self.seen += 1;
        let width = dimension(&stream.dict, b"Width");
        let height = dimension(&stream.dict, b"Height");
        let area = width as u64 * height as u64;

        // Strictly greater: ties keep the first image found
        let better = match &self.best {
            Some(best) => area > best.area,
            None => true,
        };
        if better {
            self.best = Some(BestImage {
                id,
                width,
                height,
                area,
            });
        }
    }
}

/// Turn the winning image object into a candidate with its bytes
fn materialize(doc: &Document, best: &BestImage) -> ImageCandidate {
    let stream = match doc.get_object(best.id).and_then(Object::as_stream) {
        Ok(stream) => stream,
        Err(e) => {
            return unsupported(best, format!("unreadable image object: {}", e));
        }
    };

    let filters = filter_names(&stream.dict);
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    let color = name_of(&stream.dict, b"ColorSpace");

    match filters.as_slice() {
        [only] if only == "DCTDecode" => ImageCandidate {
            width: best.width,
            height: best.height,
            encoding: ImageEncoding::Jpeg,
            data: stream.content.clone(),
        },
        [] | [_] if filters.iter().all(|f| f == "FlateDecode") => {
            let encoding = match (color.as_deref(), bits) {
                (Some("DeviceRGB"), 8) => ImageEncoding::RawRgb8,
                (Some("DeviceGray"), 8) => ImageEncoding::RawGray8,
                (other, bits) => {
                    return unsupported(
                        best,
                        format!("{} at {} bits", other.unwrap_or("unknown colorspace"), bits),
                    )
                }
            };
            let data = if filters.is_empty() {
                stream.content.clone()
            } else {
                match stream.decompressed_content() {
                    Ok(data) => data,
                    Err(e) => return unsupported(best, format!("corrupt image stream: {}", e)),
                }
            };
            ImageCandidate {
                width: best.width,
                height: best.height,
                encoding,
                data,
            }
        }
        other => unsupported(best, other.join("+")),
    }
}

fn unsupported(best: &BestImage, reason: String) -> ImageCandidate {
    ImageCandidate {
        width: best.width,
        height: best.height,
        encoding: ImageEncoding::Unsupported(reason),
        data: Vec::new(),
    }
}

/// Page resources, following `Parent` links for inherited dictionaries
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    let mut seen = HashSet::new();

    loop {
        if let Some(resources) = current.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) {
            return Some(resources);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        if !seen.insert(parent) {
            return None;
        }
        current = doc.get_dictionary(parent).ok()?;
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .and_then(Object::as_name)
        .ok()
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> u32 {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// Collapse blank runs and bound the length
fn clean_text(raw: &str, max_chars: usize) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n").chars().take(max_chars).collect()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
