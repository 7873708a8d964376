//! Pure Rust caption backend.
//!
//! Everything is statically linked into the binary, default font included.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TGA, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | EXIF tag table | `kamadak-exif` |
//! | Glyph outlines | `ab_glyph::FontArc` (bundled DejaVu Sans or a file) |
//! | Measure / draw | `imageproc::drawing::{text_size, draw_text_mut}` |
//! | Encode | `image` crate, format chosen by output extension |

use super::backend::{BackendError, Dimensions, ImageBackend, TextExtent};
use super::params::{FontSource, RenderParams, RenderTarget};
use crate::metadata::{MetadataMap, TagValue};
use ab_glyph::{FontArc, PxScale};
use exif::{Field, In, Value};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;
use std::process::Command;
use std::sync::{Mutex, PoisonError};

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Pure Rust backend using the `image` crate ecosystem.
///
/// Parsed fonts are cached per source, so a batch parses each font once.
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    fonts: Mutex<HashMap<FontSource, FontArc>>,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            fonts: Mutex::new(HashMap::new()),
        }
    }

    fn font(&self, source: &FontSource) -> Result<FontArc, BackendError> {
        let mut cache = self.fonts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(font) = cache.get(source) {
            return Ok(font.clone());
        }

        let font = match source {
            FontSource::Bundled => FontArc::try_from_slice(BUNDLED_FONT)
                .map_err(|e| BackendError::Font(format!("bundled font: {e}")))?,
            FontSource::File(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| BackendError::Font(format!("{}: {e}", path.display())))?;
                FontArc::try_from_vec(bytes)
                    .map_err(|e| BackendError::Font(format!("{}: {e}", path.display())))?
            }
        };
        log::debug!("Loaded font {source}");
        cache.insert(source.clone(), font.clone());
        Ok(font)
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> BackendError {
    BackendError::Decode(format!("{}: {e}", path.display()))
}

fn open_decoder(path: &Path) -> Result<impl ImageDecoder, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| decode_error(path, e))
}

/// Orientations that turn the image on its side.
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Decode an image and rotate it upright.
fn load_oriented(path: &Path) -> Result<DynamicImage, BackendError> {
    let mut decoder = open_decoder(path)?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Save a DynamicImage to the given path, inferring format from extension.
///
/// JPEG has no alpha channel, so RGBA input is flattened first.
fn save_image(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| BackendError::Encode(format!("{}: {e}", path.display())))?;

    let flattened;
    let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        flattened = DynamicImage::ImageRgb8(img.to_rgb8());
        &flattened
    } else {
        img
    };

    img.save_with_format(path, format)
        .map_err(|e| BackendError::Encode(format!("{}: {e}", path.display())))
}

/// Offsets covering a filled disk of `radius`; drawing the glyphs at each one
/// thickens them into an outline. Radius 0 is a single plain draw.
fn stroke_offsets(radius: u32) -> Vec<(i32, i32)> {
    let r = i32::try_from(radius).unwrap_or(i32::MAX).min(1024);
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn draw_caption(canvas: &mut RgbaImage, font: &FontArc, params: &RenderParams) {
    let color = Rgba(params.color.rgba());
    let scale = PxScale::from(params.font_size as f32);
    let origin = params.placement;

    for (dx, dy) in stroke_offsets(params.stroke_width) {
        draw_text_mut(
            canvas,
            color,
            origin.x.saturating_add(dx),
            origin.y.saturating_add(dy),
            scale,
            font,
            &params.caption,
        );
    }
}

/// Save into the temp directory and hand the file to the desktop viewer.
fn preview(img: &DynamicImage, source: &Path) -> Result<(), BackendError> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview.png".to_string());
    let path = std::env::temp_dir().join(format!(
        "imgcaption-preview-{}-{name}",
        std::process::id()
    ));
    save_image(img, &path)?;
    log::info!("Preview written to {}", path.display());

    let status = viewer_command()
        .arg(&path)
        .status()
        .map_err(|e| BackendError::Preview(format!("could not launch viewer: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(BackendError::Preview(format!("viewer exited with {status}")))
    }
}

#[cfg(target_os = "macos")]
fn viewer_command() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn viewer_command() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command() -> Command {
    Command::new("xdg-open")
}

fn tag_value(field: &Field) -> TagValue {
    match &field.value {
        Value::Ascii(parts) => TagValue::Text(
            parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Short(v) if v.len() == 1 => TagValue::Integer(i64::from(v[0])),
        Value::Long(v) if v.len() == 1 => TagValue::Integer(i64::from(v[0])),
        Value::SShort(v) if v.len() == 1 => TagValue::Integer(i64::from(v[0])),
        Value::SLong(v) if v.len() == 1 => TagValue::Integer(i64::from(v[0])),
        Value::Byte(bytes) | Value::Undefined(bytes, _) => TagValue::Bytes(bytes.clone()),
        _ => TagValue::Text(field.display_value().to_string()),
    }
}

/// Primary-image fields only; thumbnail IFD tags would shadow nothing useful.
fn tag_table(exif: &exif::Exif) -> MetadataMap {
    let mut map = MetadataMap::new();
    for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
        map.insert_if_absent(field.tag.to_string(), tag_value(field));
    }
    map
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let mut decoder = open_decoder(path)?;
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        let (width, height) = decoder.dimensions();
        Ok(if swaps_axes(orientation) {
            Dimensions {
                width: height,
                height: width,
            }
        } else {
            Dimensions { width, height }
        })
    }

    fn read_metadata(&self, path: &Path) -> Result<MetadataMap, BackendError> {
        let mut reader = BufReader::new(File::open(path)?);
        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(tag_table(&exif)),
            Err(exif::Error::Io(e)) if e.kind() != ErrorKind::UnexpectedEof => {
                Err(BackendError::Io(e))
            }
            Err(e) => {
                log::debug!("No EXIF data in {}: {e}", path.display());
                Ok(MetadataMap::new())
            }
        }
    }

    fn measure_text(
        &self,
        font: &FontSource,
        size: u32,
        text: &str,
    ) -> Result<TextExtent, BackendError> {
        let font = self.font(font)?;
        let (width, height) = text_size(PxScale::from(size as f32), &font, text);
        Ok(TextExtent { width, height })
    }

    fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
        let font = self.font(&params.font)?;
        let img = load_oriented(&params.source)?;
        let keep_alpha = img.color().has_alpha();

        let mut canvas = img.into_rgba8();
        draw_caption(&mut canvas, &font, params);

        let finished = if keep_alpha {
            DynamicImage::ImageRgba8(canvas)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).into_rgb8())
        };

        match &params.target {
            RenderTarget::File(path) => save_image(&finished, path),
            RenderTarget::Preview => preview(&finished, &params.source),
        }
    }
}
