//! High-level caption operations.
//!
//! These functions combine calculations with backend execution: measure with
//! the backend, decide with the pure math.

use super::backend::{BackendError, Dimensions, ImageBackend, TextExtent};
use super::calculations::{
    Alignment, DEFAULT_FONT_SIZE, PROBE_FONT_SIZE, Placement, fit_font_size, place,
};
use super::params::FontSource;
use std::fmt;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// How the caption's pixel size was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSizeDecision {
    /// Given by the user; fitting skipped.
    Explicit(u32),
    /// Estimated from the image width.
    Fitted(u32),
    /// Fitting failed; [`DEFAULT_FONT_SIZE`] used instead.
    Fallback { size: u32, reason: String },
}

impl FontSizeDecision {
    pub fn pixels(&self) -> u32 {
        match self {
            FontSizeDecision::Explicit(size) | FontSizeDecision::Fitted(size) => *size,
            FontSizeDecision::Fallback { size, .. } => *size,
        }
    }
}

impl fmt::Display for FontSizeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontSizeDecision::Explicit(size) => write!(f, "{size}px"),
            FontSizeDecision::Fitted(size) => write!(f, "{size}px (fitted)"),
            FontSizeDecision::Fallback { size, .. } => write!(f, "{size}px (default)"),
        }
    }
}

/// Pick the caption's pixel size.
///
/// Never fails: a measurement or fitting problem falls back to
/// [`DEFAULT_FONT_SIZE`] and the reason is carried in the decision.
pub fn decide_font_size(
    backend: &impl ImageBackend,
    caption: &str,
    font: &FontSource,
    image: Dimensions,
    explicit: Option<u32>,
) -> FontSizeDecision {
    if let Some(size) = explicit {
        return FontSizeDecision::Explicit(size);
    }

    let fitted = backend
        .measure_text(font, PROBE_FONT_SIZE, caption)
        .map_err(|e| e.to_string())
        .and_then(|probe| fit_font_size(probe.width, image.as_tuple()).map_err(|e| e.to_string()));

    match fitted {
        Ok(size) => FontSizeDecision::Fitted(size),
        Err(reason) => {
            log::warn!(
                "Unable to calculate font size for caption '{caption}'. Using default {DEFAULT_FONT_SIZE}. Error: {reason}"
            );
            FontSizeDecision::Fallback {
                size: DEFAULT_FONT_SIZE,
                reason,
            }
        }
    }
}

/// Measure the caption at its final size and anchor it.
pub fn place_caption(
    backend: &impl ImageBackend,
    caption: &str,
    font: &FontSource,
    size: u32,
    image: Dimensions,
    alignment: Alignment,
) -> Result<(TextExtent, Placement)> {
    let extent = backend.measure_text(font, size, caption)?;
    let placement = place(image.as_tuple(), extent.as_tuple(), alignment);
    Ok((extent, placement))
}
