//! Image processing for captions: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image` decoder header + EXIF orientation |
//! | **Tag table** | `kamadak-exif` (JPEG, TIFF, PNG, WebP containers) |
//! | **Measure text** | `imageproc::drawing::text_size` over an `ab_glyph` font |
//! | **Render** | orientation fix → `imageproc::drawing::draw_text_mut` → encode by extension |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for font fitting and placement (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
pub mod calculations;
pub mod operations;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, TextExtent};
pub use calculations::{Alignment, AlignmentError, Placement};
pub use operations::{FontSizeDecision, decide_font_size, place_caption};
pub use params::{FontColor, FontSource, RenderParams, RenderTarget};
pub use rust_backend::RustBackend;
