//! Small PDFs built in-process for extractor tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::Path;

pub(crate) struct TestImage {
    dict: Dictionary,
    data: Vec<u8>,
}

impl TestImage {
    pub(crate) fn jpeg(width: i64, height: i64) -> Self {
        Self::jpeg_with_marker(width, height, 0xD9)
    }

    /// Fake JPEG whose last byte identifies it
    pub(crate) fn jpeg_with_marker(width: i64, height: i64, marker: u8) -> Self {
        Self {
            dict: dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, marker],
        }
    }

    pub(crate) fn raw_rgb(width: i64, height: i64) -> Self {
        Self {
            dict: dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            data: vec![128; (width * height * 3) as usize],
        }
    }

    pub(crate) fn without_dimensions() -> Self {
        Self {
            dict: dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Filter" => "DCTDecode",
            },
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        }
    }
}

/// One-page PDF with `text` and the given images on the page itself
pub(crate) fn write_pdf(path: &Path, text: &str, images: &[TestImage]) {
    build(path, text, images, false);
}

/// Same, but resources live on the parent `Pages` node
pub(crate) fn write_pdf_inherited(path: &Path, text: &str, images: &[TestImage]) {
    build(path, text, images, true);
}

fn build(path: &Path, text: &str, images: &[TestImage], inherited: bool) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = Dictionary::new();
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12i64.into()]),
        Operation::new("Td", vec![72i64.into(), 720i64.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ];
    for (index, image) in images.iter().enumerate() {
        let name = format!("Im{}", index);
        let id = doc.add_object(Stream::new(image.dict.clone(), image.data.clone()));
        xobjects.set(name.clone(), id);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        operations.push(Operation::new("Q", vec![]));
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => xobjects,
    });

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encodable content"),
    ));

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    };
    if !inherited {
        page.set("Resources", resources_id);
    }
    let page_id = doc.add_object(page);

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1i64,
        "MediaBox" => vec![0i64.into(), 0i64.into(), 595i64.into(), 842i64.into()],
    };
    if inherited {
        pages.set("Resources", resources_id);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).expect("test PDF written");
}
