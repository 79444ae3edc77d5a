//! Stored attachments: previously printed PDFs served instead of re-rendering.
//!
//! Hosts may also store a scanned image in place of the PDF (a signed
//! delivery slip, a photographed receipt). Those are wrapped into a one-page
//! PDF so the caller always receives PDF bytes.

use crate::error::ReportError;
use image::{DynamicImage, ImageFormat};
use lopdf::{dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// An attachment as stored by the host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub mimetype: Option<String>,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mimetype", &self.mimetype)
            .field("raw", &format_args!("<{} bytes>", self.raw.len()))
            .finish()
    }
}

impl Attachment {
    pub fn new(id: i64, name: impl Into<String>, mimetype: Option<&str>, raw: Vec<u8>) -> Self {
        Self {
            id,
            name: name.into(),
            mimetype: mimetype.map(str::to_string),
            raw,
        }
    }

    /// Whether the stored file is an image rather than a PDF.
    pub fn is_image(&self) -> bool {
        self.mimetype
            .as_deref()
            .is_some_and(|m| m.starts_with("image"))
    }

    /// The attachment as PDF bytes.
    ///
    /// Images are converted to RGB and placed on a page of the same size in
    /// points; everything else is returned as stored.
    pub fn to_pdf(&self) -> Result<Vec<u8>, ReportError> {
        if !self.is_image() {
            return Ok(self.raw.clone());
        }
        image_to_pdf(&self.raw).map_err(|detail| ReportError::AttachmentConversion {
            name: self.name.clone(),
            detail,
        })
    }
}

/// Wrap an encoded image into a single-page PDF.
pub fn image_to_pdf(raw: &[u8]) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(raw).map_err(|e| e.to_string())?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let (width, height) = (rgb.width() as i64, rgb.height() as i64);

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| e.to_string())?;
    debug!("Wrapped {}x{} image into PDF ({} bytes JPEG)", width, height, jpeg.len());

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false),
    );

    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}
