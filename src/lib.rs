//! # imgcaption
//!
//! Stamps photos with a caption built from their own metadata. A template such
//! as `"Party, ##DateTime"` is filled in per image from its EXIF tags, the text
//! is sized to the image, drawn in one of five positions, and the result is
//! written as a new file. Originals are never touched.
//!
//! # Architecture: One Job Per Image
//!
//! Every image goes through the same short pipeline, owned by [`job::run_job`]:
//!
//! ```text
//! guard     refuse to clobber an existing output unless asked
//! load      identify the image and its displayed dimensions
//! metadata  read EXIF tags, resolve the capture date
//! compose   fill the caption template
//! measure   pick a font size and a placement
//! render    draw the caption and save (or preview)
//! ```
//!
//! A job never panics and never aborts a batch: it returns a
//! [`job::JobOutcome`] carrying either the result or the stage that failed,
//! plus any warnings it recovered from. [`batch`] fans jobs out over a rayon
//! pool for directories and streams outcomes to the printer as they finish.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`batch`] | Dispatches a file or directory: output naming, collision checks, worker pool |
//! | [`job`] | The per-image pipeline and its outcome, warning and failure types |
//! | [`template`] | `##Name` substitution against a metadata map |
//! | [`date`] | Capture date resolution: EXIF timestamps, then dates in the file name |
//! | [`metadata`] | The tag map shared by the reader, the templates and the dump |
//! | [`imaging`] | Font sizing and placement math, the backend trait, the pure-Rust backend |
//! | [`config`] | `imgcaption.toml` loading, merging with stock defaults, validation |
//! | [`output`] | CLI output formatting, one `format_*`/`print_*` pair per report |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, text rasterisation and encoding all go through the `image`,
//! `imageproc` and `ab_glyph` crates, and a DejaVu Sans face is compiled into
//! the binary. There is no ImageMagick, FreeType or fontconfig to install, and
//! a caption looks the same on every machine.
//!
//! ## Backend Trait
//!
//! Everything that touches pixels or fonts sits behind
//! [`imaging::ImageBackend`]. The job pipeline, the batch dispatcher and the
//! sizing logic are tested against a recording mock, so the bulk of the suite
//! runs without decoding a single image.
//!
//! ## Width-Fitted Captions
//!
//! Unless a size is given, the caption is measured once at a probe size and
//! scaled so it spans a fixed share of the image width (less on landscape
//! images, where the width is generous). Captions stay legible on a phone
//! snapshot and a 40 megapixel frame alike.

pub mod batch;
pub mod config;
pub mod date;
pub mod imaging;
pub mod job;
pub mod metadata;
pub mod output;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
