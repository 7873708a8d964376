//! Parameter types for caption rendering.
//!
//! These structs describe *what* to draw, not *how*. They are the interface
//! between the job pipeline (which decides caption, size and position) and
//! the [`backend`](super::backend) (which does the pixel work), so tests can
//! swap in a mock without touching job logic.
//!
//! ## Types
//!
//! - [`FontSource`]: Bundled DejaVu Sans or a TrueType/OpenType file on disk.
//! - [`FontColor`]: RGBA fill color. Parsed from `#rgb`, `#rrggbb`, `#rrggbbaa` or a CSS name.
//! - [`RenderTarget`]: Write to a path, or show a preview.
//! - [`RenderParams`]: Everything needed to draw one caption.

use super::calculations::Placement;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Where glyph outlines come from.
///
/// Resolved once per invocation: jobs never look for fonts themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FontSource {
    /// DejaVu Sans, compiled into the binary.
    #[default]
    Bundled,
    File(PathBuf),
}

impl fmt::Display for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontSource::Bundled => f.write_str("DejaVu Sans (bundled)"),
            FontSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized color '{0}' (use #rgb, #rrggbb, #rrggbbaa or a name like blue)")]
pub struct ColorError(pub String);

/// Caption fill color, RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontColor(pub [u8; 4]);

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("navy", [0, 0, 128]),
];

impl FontColor {
    pub fn rgba(self) -> [u8; 4] {
        self.0
    }
}

impl Default for FontColor {
    fn default() -> Self {
        Self([0, 0, 255, 255])
    }
}

impl FromStr for FontColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let fail = || ColorError(s.to_string());

        if let Some(hex) = trimmed.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(fail());
            }
            let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
            let rgba = match hex.len() {
                3 => [nibble(0), nibble(1), nibble(2), Ok(255)],
                6 => [byte(0), byte(2), byte(4), Ok(255)],
                8 => [byte(0), byte(2), byte(4), byte(6)],
                _ => return Err(fail()),
            };
            let mut out = [0u8; 4];
            for (slot, value) in out.iter_mut().zip(rgba) {
                *slot = value.map_err(|_| fail())?;
            }
            return Ok(FontColor(out));
        }

        let lower = trimmed.to_ascii_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, [r, g, b])| FontColor([*r, *g, *b, 255]))
            .ok_or_else(fail)
    }
}

/// Where the rendered image goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    File(PathBuf),
    /// Temporary copy shown in the system viewer; nothing is written next to the source.
    Preview,
}

/// Parameters for drawing one caption onto one image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub source: PathBuf,
    pub target: RenderTarget,
    pub caption: String,
    pub font: FontSource,
    pub font_size: u32,
    pub color: FontColor,
    /// Outline radius in pixels; 0 draws the glyphs once.
    pub stroke_width: u32,
    pub placement: Placement,
}
