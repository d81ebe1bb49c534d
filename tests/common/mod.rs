#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf_renamer::ai::{ClassifierInput, ClassifyError, NamingClassifier};
use pdf_renamer::services::{Stage, StatusTable};
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Real JPEG bytes of the given size
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .expect("jpeg encodes");
    buffer
}

/// One-page PDF with `text` and a DCT image per entry in `images`
pub fn pdf_bytes(text: &str, images: &[(u32, u32)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = Dictionary::new();
    for (index, &(width, height)) in images.iter().enumerate() {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            jpeg(width, height),
        ));
        xobjects.set(format!("Im{}", index), image_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => xobjects,
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12i64.into()]),
            Operation::new("Td", vec![72i64.into(), 720i64.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1i64,
            "MediaBox" => vec![0i64.into(), 0i64.into(), 595i64.into(), 842i64.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

pub fn write_pdf(path: &Path, text: &str, images: &[(u32, u32)]) {
    std::fs::write(path, pdf_bytes(text, images)).expect("pdf written");
}

/// Answers from the image when there is one (`W<width>x<height>`), else a fixed label
pub struct DimensionClassifier {
    pub text_label: &'static str,
    pub delay: Duration,
    pub calls: Mutex<Vec<String>>,
}

impl DimensionClassifier {
    pub fn new(text_label: &'static str) -> Self {
        Self {
            text_label,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl NamingClassifier for DimensionClassifier {
    async fn classify(&self, input: ClassifierInput<'_>) -> Result<String, ClassifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match input {
            ClassifierInput::ImageWithText { image, .. } => {
                let decoded = image::open(image).map_err(|e| ClassifyError::Unexpected(e.to_string()))?;
                self.calls.lock().unwrap().push("image".into());
                Ok(format!("W{}x{}", decoded.width(), decoded.height()))
            }
            ClassifierInput::Text(text) => {
                self.calls.lock().unwrap().push(format!("text:{}", text));
                Ok(self.text_label.to_string())
            }
        }
    }
}

/// Every call fails like an unavailable service
pub struct FailingClassifier;

#[async_trait]
impl NamingClassifier for FailingClassifier {
    async fn classify(&self, _input: ClassifierInput<'_>) -> Result<String, ClassifyError> {
        Err(ClassifyError::Service {
            status: Some(503),
            message: "service unavailable".into(),
        })
    }
}

/// Poll until `count` records are in a terminal stage
pub async fn wait_for_terminal(table: &StatusTable, count: usize, timeout: Duration) -> bool {
    wait_until(timeout, || {
        table.count_in(Stage::Succeeded) + table.count_in(Stage::Failed) >= count
    })
    .await
}

pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
