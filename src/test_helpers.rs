//! Shared test utilities for the imgcaption test suite.
//!
//! Builds small synthetic images on disk, optionally carrying an EXIF block,
//! so backend and pipeline tests never depend on binary fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("party.jpg");
//! create_jpeg_with_exif(&path, 400, 300, &[ascii_field(Tag::DateTime, "2019:01:16 11:11:15")]);
//! ```

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{ImageEncoder, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

// =========================================================================
// Plain images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, encode_jpeg(width, height)).unwrap();
}

/// Create an RGB PNG (no alpha channel).
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

/// Create a half-transparent RGBA PNG.
pub fn create_test_png_rgba(path: &Path, width: u32, height: u32) {
    RgbaImage::from_pixel(width, height, image::Rgba([200, 200, 200, 128]))
        .save(path)
        .unwrap();
}

/// Write bytes that carry an image extension but are not an image.
pub fn create_corrupt_image(path: &Path) {
    std::fs::write(path, b"definitely not pixels").unwrap();
}

// =========================================================================
// EXIF
// =========================================================================

/// ASCII tag in the primary IFD.
pub fn ascii_field(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

/// Orientation tag (1–8) in the primary IFD.
pub fn orientation_field(orientation: u16) -> Field {
    Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![orientation]),
    }
}

/// Serialize fields into a bare TIFF structure.
fn tiff_block(fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    buf.into_inner()
}

/// Create a JPEG whose APP1 segment carries the given EXIF fields.
///
/// The segment is spliced in right after SOI, where cameras put it.
pub fn create_jpeg_with_exif(path: &Path, width: u32, height: u32, fields: &[Field]) {
    let jpeg = encode_jpeg(width, height);
    let tiff = tiff_block(fields);

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);
    let segment_len = u16::try_from(payload.len() + 2).unwrap();

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    std::fs::write(path, out).unwrap();
}
