//! Single-page PDF serialization of a composed canvas.
//!
//! The canvas is flattened to RGB, JPEG-encoded and embedded as one image
//! XObject that fills the page. Page size follows the print DPI.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::Path;

use crate::error::{CertError, CertResult, IoContext};
use crate::print::PrintSpec;

/// Encode `canvas` as a one-page PDF.
pub fn encode_pdf(canvas: &RgbaImage, print: &PrintSpec) -> CertResult<Vec<u8>> {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return Err(CertError::compose("cannot serialize an empty canvas"));
    }

    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, print.jpeg_quality)
        .encode_image(&rgb)
        .map_err(|e| CertError::compose(format!("jpeg encode: {e}")))?;

    let (page_w, page_h) = print.page_size(width, height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    image.allows_compression = false;
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![page_w.into(), 0_i64.into(), 0_i64.into(), page_h.into(), 0_i64.into(), 0_i64.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| CertError::compose(format!("encode page content: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0_i64.into(), 0_i64.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1_i64,
    };
    doc.objects.insert(pages_id, pages.into());

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| CertError::compose(format!("write pdf: {e}")))?;
    Ok(bytes)
}

pub fn write_pdf(canvas: &RgbaImage, print: &PrintSpec, path: &Path) -> CertResult<()> {
    let bytes = encode_pdf(canvas, print)?;
    fs::write(path, bytes).io_context("write certificate", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn pdf_embeds_one_jpeg_page() {
        let canvas = RgbaImage::from_pixel(200, 100, Rgba([250, 240, 230, 255]));
        let bytes = encode_pdf(&canvas, &PrintSpec::default()).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, b"/DCTDecode"));
        assert!(contains(&bytes, b"/Im0 Do"));
        assert!(contains(&bytes, &[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let canvas = RgbaImage::new(0, 0);
        assert!(matches!(encode_pdf(&canvas, &PrintSpec::default()), Err(CertError::Compose(_))));
    }

    #[test]
    fn write_pdf_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Ada.pdf");
        let canvas = RgbaImage::from_pixel(32, 32, Rgba([255, 255, 255, 255]));
        write_pdf(&canvas, &PrintSpec::default(), &path).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }
}
