//! Page images for the vision request
//!
//! The worker stores the best embedded image as JPEG or PNG. Before it goes
//! into a data URL it is re-encoded as an RGB JPEG whose longest edge is at
//! most [`MAX_VISION_EDGE`].

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest edge, in pixels, of the image sent for description
pub const MAX_VISION_EDGE: u32 = 1600;

/// MIME type of everything [`encode_for_vision`] produces
pub const VISION_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum VisionImageError {
    #[error("failed to read stored image {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode vision JPEG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("image preparation task failed: {0}")]
    Task(String),
}

/// Re-encode a stored page image as a bounded RGB JPEG
pub fn encode_for_vision(stored: &[u8]) -> Result<Vec<u8>, VisionImageError> {
    let decoded = image::load_from_memory(stored).map_err(VisionImageError::Decode)?;
    let rgb = DynamicImage::ImageRgb8(fit_within(decoded, MAX_VISION_EDGE).to_rgb8());

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(VisionImageError::Encode)?;
    Ok(jpeg)
}

/// Scale down to fit a `max_edge` square, keeping the aspect ratio; never upscales
fn fit_within(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        return img;
    }
    img.resize(max_edge, max_edge, FilterType::Lanczos3)
}

/// Read the stored image and encode it off the async threads
pub async fn load_vision_jpeg(path: &Path) -> Result<Vec<u8>, VisionImageError> {
    let stored = tokio::fs::read(path)
        .await
        .map_err(|source| VisionImageError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    tokio::task::spawn_blocking(move || encode_for_vision(&stored))
        .await
        .map_err(|e| VisionImageError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        buffer
    }

    #[test]
    fn test_png_page_image_becomes_jpeg() {
        let stored = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(20, 10)));
        let jpeg = encode_for_vision(&stored).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_grayscale_scan_is_accepted() {
        let stored = png_bytes(DynamicImage::ImageLuma8(GrayImage::new(30, 40)));
        let decoded = image::load_from_memory(&encode_for_vision(&stored).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 40));
    }

    #[test]
    fn test_wide_scan_is_bounded_by_longest_edge() {
        let stored = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(3200, 800)));
        let decoded = image::load_from_memory(&encode_for_vision(&stored).unwrap()).unwrap();
        assert_eq!(decoded.width(), MAX_VISION_EDGE);
        assert_eq!(decoded.height(), 400);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let fitted = fit_within(img, MAX_VISION_EDGE);
        assert_eq!((fitted.width(), fitted.height()), (100, 50));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(matches!(
            encode_for_vision(b"not an image"),
            Err(VisionImageError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_stored_image_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_vision_jpeg(&dir.path().join("missing.jpg")).await;
        assert!(matches!(result, Err(VisionImageError::Read { .. })));
    }
}
