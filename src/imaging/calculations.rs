//! Pure calculation functions for caption sizing and placement.
//!
//! All functions here are pure and testable without any I/O or images.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Size at which the caption is rendered to estimate its width.
pub const PROBE_FONT_SIZE: u32 = 64;

/// Size used whenever fitting cannot produce a number.
pub const DEFAULT_FONT_SIZE: u32 = 64;

/// Margins are 1/20th of the image edge (5%).
const MARGIN_DIVISOR: i64 = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("caption rendered with zero width")]
    ZeroWidth,
    #[error("estimated size {0} is not a usable pixel size")]
    Unusable(f64),
}

/// Share of the image width the caption should cover.
///
/// Landscape images get a narrower caption than portrait or square ones.
pub fn target_width_ratio(image: (u32, u32)) -> f64 {
    let (width, height) = image;
    if width > height { 0.3 } else { 0.5 }
}

/// Estimate the font size that makes the caption span the target share of
/// the image width.
///
/// Linear extrapolation from one measurement at [`PROBE_FONT_SIZE`]:
///
/// ```text
/// size = probe / (measured_width / image_width) * ratio
/// ```
///
/// This is an approximation (glyph advance does not scale perfectly
/// linearly with hinting), kept as-is so captions match earlier releases.
/// Halves round to even, as those releases did.
///
/// # Examples
/// ```
/// # use imgcaption::imaging::calculations::fit_font_size;
/// // 640px-wide probe on a 4000x3000 landscape → 64 / 0.16 * 0.3 = 120
/// assert_eq!(fit_font_size(640, (4000, 3000)), Ok(120));
/// ```
pub fn fit_font_size(measured_width: u32, image: (u32, u32)) -> Result<u32, FitError> {
    if measured_width == 0 {
        return Err(FitError::ZeroWidth);
    }
    let (image_width, _) = image;
    let coverage = measured_width as f64 / image_width as f64;
    let estimate = (PROBE_FONT_SIZE as f64 / coverage * target_width_ratio(image)).round_ties_even();

    if !estimate.is_finite() || estimate < 1.0 || estimate > u32::MAX as f64 {
        return Err(FitError::Unusable(estimate));
    }
    Ok(estimate as u32)
}

/// Named anchor for the caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    Center,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignmentError {
    #[error(
        "unrecognized alignment '{0}' (expected bottom_left, bottom_right, top_left, top_right or center)"
    )]
    Unresolved(String),
}

impl Alignment {
    pub const ALL: [Alignment; 5] = [
        Alignment::BottomLeft,
        Alignment::BottomRight,
        Alignment::TopLeft,
        Alignment::TopRight,
        Alignment::Center,
    ];

    /// Canonical keyword, as accepted by the CLI and config file.
    pub fn keyword(self) -> &'static str {
        match self {
            Alignment::BottomLeft => "bottom_left",
            Alignment::BottomRight => "bottom_right",
            Alignment::TopLeft => "top_left",
            Alignment::TopRight => "top_right",
            Alignment::Center => "center",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Case-insensitive; `_`, `-` and spaces are ignored, so `BOTTOM_LEFT`,
/// `bottomleft`, `Bottom-Left`, `bl` and `b_l` are all the same anchor.
impl FromStr for Alignment {
    type Err = AlignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "bottomleft" | "bl" => Ok(Alignment::BottomLeft),
            "bottomright" | "br" => Ok(Alignment::BottomRight),
            "topleft" | "tl" => Ok(Alignment::TopLeft),
            "topright" | "tr" => Ok(Alignment::TopRight),
            "center" | "centre" | "c" => Ok(Alignment::Center),
            _ => Err(AlignmentError::Unresolved(s.to_string())),
        }
    }
}

/// Top-left draw origin of the caption, in image pixels.
///
/// May be negative when the caption is wider or taller than the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
}

/// Compute where the caption's top-left corner goes.
///
/// Corner anchors keep a margin of 1/20th of the image width horizontally
/// and 1/20th of the image height vertically. `Center` ignores margins.
///
/// # Arguments
/// * `image` - Image dimensions (width, height)
/// * `text` - Rendered caption dimensions (width, height)
/// * `alignment` - Anchor to place against
pub fn place(image: (u32, u32), text: (u32, u32), alignment: Alignment) -> Placement {
    let (iw, ih) = (i64::from(image.0), i64::from(image.1));
    let (tw, th) = (i64::from(text.0), i64::from(text.1));
    let pad_w = iw / MARGIN_DIVISOR;
    let pad_h = ih / MARGIN_DIVISOR;

    let (x, y) = match alignment {
        Alignment::BottomLeft => (pad_w, ih - pad_h - th),
        Alignment::BottomRight => (iw - pad_w - tw, ih - pad_h - th),
        Alignment::TopLeft => (pad_w, pad_h),
        Alignment::TopRight => (iw - pad_w - tw, pad_h),
        Alignment::Center => ((iw - tw).div_euclid(2), (ih - th).div_euclid(2)),
    };

    Placement {
        x: to_pixel(x),
        y: to_pixel(y),
    }
}

fn to_pixel(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
