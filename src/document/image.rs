//! Embedded image candidates
//!
//! Holds the single best image found on a page and turns it into bytes that
//! can be written to an image file for the classifier.

use image::{GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// How the image samples are stored in the PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEncoding {
    /// DCTDecode stream, already a complete JPEG file
    Jpeg,
    /// Decompressed 8-bit samples in DeviceRGB
    RawRgb8,
    /// Decompressed 8-bit samples in DeviceGray
    RawGray8,
    /// Anything we cannot turn into an image file (JPX, CCITT, indexed, ...)
    Unsupported(String),
}

/// The largest image on the first page
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    /// JPEG file bytes or decompressed samples, depending on `encoding`
    pub data: Vec<u8>,
}

/// Why an image could not be materialized for classification
#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("unsupported image encoding: {0}")]
    Unsupported(String),

    #[error("image samples do not match {width}x{height}")]
    BadDimensions { width: u32, height: u32 },

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageCandidate {
    /// Pixel area used to rank candidates; missing dimensions count as 0
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// File bytes and matching extension for writing this image to disk
    pub fn to_file_bytes(&self) -> Result<(Vec<u8>, &'static str), ImageStoreError> {
        match &self.encoding {
            ImageEncoding::Jpeg => Ok((self.data.clone(), "jpg")),
            ImageEncoding::RawRgb8 => {
                let img = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
                    ImageStoreError::BadDimensions {
                        width: self.width,
                        height: self.height,
                    },
                )?;
                Ok((encode_png(image::DynamicImage::ImageRgb8(img))?, "png"))
            }
            ImageEncoding::RawGray8 => {
                let img = GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
                    ImageStoreError::BadDimensions {
                        width: self.width,
                        height: self.height,
                    },
                )?;
                Ok((encode_png(image::DynamicImage::ImageLuma8(img))?, "png"))
            }
            ImageEncoding::Unsupported(kind) => Err(ImageStoreError::Unsupported(kind.clone())),
        }
    }
}

fn encode_png(img: image::DynamicImage) -> Result<Vec<u8>, ImageStoreError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}
