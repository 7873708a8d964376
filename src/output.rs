//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Each job leads with the image it was about, then what happened to it, with
//! the caption and sizing decisions as indented context lines. Problems the
//! job recovered from are listed as `Warning:` lines under the same header,
//! so a batch reads as an inventory of what was stamped and how.
//!
//! # Output Format
//!
//! ## Job
//!
//! ```text
//! party.jpg → photos_captioned/party.jpg
//!     Caption: Party, 2019/01/16, 11:11
//!     Font: 120px (fitted) at (200, 2730)
//!     Warning: variable 'Artist' not found, left as written
//! broken.jpg ✗ load: Failed to decode image: ...
//! ```
//!
//! ## Batch summary
//!
//! ```text
//! Captioned 9 of 10 images → photos_captioned
//! Failed:
//!     broken.jpg (load)
//! ```
//!
//! ## Metadata dump
//!
//! ```text
//! photos/party.jpg => {DateTime: 2019:01:16 11:11:15, Make: samsung}
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::BatchReport;
use crate::imaging::BackendError;
use crate::job::{Delivery, JobOutcome};
use crate::metadata::MetadataMap;
use std::path::Path;

/// Longest caption shown before it is cut with `...`.
const CAPTION_DISPLAY_CHARS: usize = 60;

/// File name for display, falling back to the full path.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_caption(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Format one job outcome.
pub fn format_job_outcome(outcome: &JobOutcome) -> Vec<String> {
    let name = display_name(&outcome.source);
    let mut lines = Vec::new();

    match &outcome.result {
        Ok(captioned) => {
            let target = match &captioned.delivery {
                Delivery::Written(path) => path.display().to_string(),
                Delivery::Previewed => "preview".to_string(),
            };
            lines.push(format!("{name} → {target}"));
            let caption = if captioned.caption.is_empty() {
                "(empty)".to_string()
            } else {
                truncate_caption(&captioned.caption, CAPTION_DISPLAY_CHARS)
            };
            lines.push(format!("    Caption: {caption}"));
            lines.push(format!(
                "    Font: {} at ({}, {})",
                captioned.font_size, captioned.placement.x, captioned.placement.y
            ));
        }
        Err(failure) => {
            lines.push(format!("{name} ✗ {}: {}", failure.stage, failure.message));
        }
    }

    for warning in &outcome.warnings {
        lines.push(format!("    Warning: {warning}"));
    }
    lines
}

pub fn print_job_outcome(outcome: &JobOutcome) {
    for line in format_job_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch summary
// ============================================================================

/// Format the closing summary of a directory run.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Captioned {} of {} images → {}",
        report.succeeded(),
        report.outcomes.len(),
        report.output_dir.display()
    )];

    let failed: Vec<&JobOutcome> = report.failed().collect();
    if !failed.is_empty() {
        lines.push("Failed:".to_string());
        for outcome in failed {
            let stage = outcome
                .result
                .as_ref()
                .err()
                .map(|f| f.stage.to_string())
                .unwrap_or_default();
            lines.push(format!("    {} ({stage})", display_name(&outcome.source)));
        }
    }
    lines
}

pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Metadata dump
// ============================================================================

/// `path => {Tag: value, ...}`
pub fn format_metadata_line(path: &Path, tags: &Result<MetadataMap, BackendError>) -> String {
    match tags {
        Ok(map) => format!("{} => {map}", path.display()),
        Err(e) => format!("{} => error: {e}", path.display()),
    }
}

pub fn print_metadata(dump: &[(std::path::PathBuf, Result<MetadataMap, BackendError>)]) {
    for (path, tags) in dump {
        println!("{}", format_metadata_line(path, tags));
    }
}
