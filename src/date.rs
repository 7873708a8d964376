//! Capture timestamp resolution.
//!
//! The caption's `##DateTime` variable is filled from the first source that
//! yields a usable point in time:
//!
//! ```text
//! 1. Embedded tag    DateTime → DateTimeOriginal → DateTimeDigitized
//!                    (wire format "YYYY:MM:DD HH:MM:SS")
//! 2. Filename        date-like tokens in the file name, left to right,
//!                    ignoring anything at or before 1900-01-01T00:00:00
//! 3. Nothing         empty string
//! ```
//!
//! No step fails: every miss is logged at `warn` and falls through to the next
//! source. The filename heuristic exists for phone and messenger exports such
//! as `20190116_111115.jpg` or `IMG-20190116-WA0003.jpg` that lost their EXIF
//! block along the way.
//!
//! ## Filename candidates
//!
//! | Shape | Example |
//! |---|---|
//! | year-first, optional time | `20190116`, `2019-01-16`, `20190116_111115`, `2019-01-16 11.11.15` |
//! | month/day-first | `01-16-2019` (month first unless the first number exceeds 12) |
//! | month name | `16 Jan 2019`, `January 16, 2019` |
//!
//! A candidate glued to further digits (`120190116`) is not a date. The epoch
//! guard drops resolution-like tokens that happen to parse (`18991231`).

use crate::metadata::MetadataMap;
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use std::fmt::Write;
use std::path::Path;
use std::sync::LazyLock;

/// Wire format of EXIF date tags.
pub const CAPTURE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Tags consulted for the capture timestamp, in priority order.
pub const CAPTURE_TAGS: &[&str] = &["DateTime", "DateTimeOriginal", "DateTimeDigitized"];

/// Where the resolved string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Metadata,
    Filename,
    Unresolved,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResolution {
    /// Formatted timestamp, empty when unresolved.
    pub text: String,
    pub source: DateSource,
    /// Why the embedded tag was not used. `None` when it was.
    pub fallback_reason: Option<String>,
}

/// Resolve the display timestamp for an image.
///
/// `image_path` may be a full path; only its file name is searched for dates.
/// Filename candidates at or before 1900-01-01 are dropped before the first
/// is picked, so a resolution-like token ahead of a real date does not hide it.
pub fn resolve(metadata: &MetadataMap, image_path: &Path, date_format: &str) -> DateResolution {
    let reason = match from_metadata(metadata) {
        Ok(timestamp) => match format_timestamp(&timestamp, date_format) {
            Some(text) => {
                log::debug!("Capture timestamp for {}: {text}", image_path.display());
                return DateResolution {
                    text,
                    source: DateSource::Metadata,
                    fallback_reason: None,
                };
            }
            None => format!("date format '{date_format}' cannot be rendered"),
        },
        Err(reason) => reason,
    };

    let name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let from_name = find_dates(&name)
        .into_iter()
        .find(is_plausible)
        .and_then(|timestamp| format_timestamp(&timestamp, date_format));

    match from_name {
        Some(text) => {
            log::warn!(
                "{reason} for file {}. Extracted date from filename.",
                image_path.display()
            );
            DateResolution {
                text,
                source: DateSource::Filename,
                fallback_reason: Some(reason),
            }
        }
        None => {
            log::warn!(
                "Unable to resolve DateTime for file {}: {reason}. Filled with empty string.",
                image_path.display()
            );
            DateResolution {
                text: String::new(),
                source: DateSource::Unresolved,
                fallback_reason: Some(reason),
            }
        }
    }
}

/// First capture tag that parses, or the reason none did.
fn from_metadata(metadata: &MetadataMap) -> Result<NaiveDateTime, String> {
    let mut first_problem = None;
    for tag in CAPTURE_TAGS {
        if !metadata.contains(tag) {
            continue;
        }
        let problem = match metadata.text(tag) {
            Some(text) => match parse_capture_timestamp(text) {
                Some(timestamp) => return Ok(timestamp),
                None => format!("{tag} '{text}' does not match {CAPTURE_FORMAT}"),
            },
            None => format!("{tag} is not a text value"),
        };
        first_problem.get_or_insert(problem);
    }
    Err(first_problem.unwrap_or_else(|| "DateTime variable is missing".to_string()))
}

/// Parse an EXIF date string (`2019:01:16 11:11:15`).
///
/// Surrounding whitespace and the NUL padding some cameras leave behind are ignored.
pub fn parse_capture_timestamp(value: &str) -> Option<NaiveDateTime> {
    let cleaned = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(cleaned, CAPTURE_FORMAT).ok()
}

/// Whether a candidate lies strictly after 1900-01-01T00:00:00.
pub fn is_plausible(candidate: &NaiveDateTime) -> bool {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .is_some_and(|guard| *candidate > guard)
}

/// Whether `format` is a strftime string chrono can render.
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Render a timestamp, `None` when the format string is invalid.
///
/// `to_string()` on chrono's delayed format panics on bad specifiers; writing
/// through `fmt::Write` surfaces the error instead.
pub fn format_timestamp(timestamp: &NaiveDateTime, format: &str) -> Option<String> {
    if !is_valid_format(format) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", timestamp.format(format)).ok()?;
    Some(out)
}

// ============================================================================
// Filename date finder
// ============================================================================

static YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d{4})[-_.]?(\d{2})[-_.]?(\d{2})(?:[T _-]?(\d{2})[-_.:h]?(\d{2})(?:[-_.:m]?(\d{2}))?)?",
    )
    .expect("year-first date pattern is valid")
});

static MONTH_DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[-_.](\d{1,2})[-_.](\d{4})").expect("month/day-first pattern is valid")
});

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

static DAY_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(\d{{1,2}})(?:st|nd|rd|th)?[ _-]?({MONTHS})[a-z]*[ _,-]*(\d{{4}})"
    ))
    .expect("day-month-name pattern is valid")
});

static MONTH_NAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)({MONTHS})[a-z]*[ _-]?(\d{{1,2}})(?:st|nd|rd|th)?[ _,-]+(\d{{4}})"
    ))
    .expect("month-name-day pattern is valid")
});

struct Candidate {
    start: usize,
    end: usize,
    when: NaiveDateTime,
}

/// All date candidates in `name`, in the order they appear.
///
/// Overlapping matches from different shapes are resolved in favour of the one
/// that starts first. No plausibility filtering happens here; see [`is_plausible`].
pub fn find_dates(name: &str) -> Vec<NaiveDateTime> {
    let mut found = Vec::new();
    scan(&YEAR_FIRST, name, year_first, &mut found);
    scan(&MONTH_DAY_FIRST, name, month_day_first, &mut found);
    scan(&DAY_MONTH_NAME, name, day_month_name, &mut found);
    scan(&MONTH_NAME_DAY, name, month_name_day, &mut found);

    found.sort_by_key(|c| (c.start, std::cmp::Reverse(c.end)));

    let mut accepted: Vec<Candidate> = Vec::with_capacity(found.len());
    for candidate in found {
        if accepted.last().is_some_and(|prev| candidate.start < prev.end) {
            continue;
        }
        accepted.push(candidate);
    }
    accepted.into_iter().map(|c| c.when).collect()
}

/// Walk every match of `re`, skipping ones glued to neighbouring digits.
fn scan<F>(re: &Regex, haystack: &str, build: F, out: &mut Vec<Candidate>)
where
    F: Fn(&Captures<'_>) -> Option<NaiveDateTime>,
{
    let bytes = haystack.as_bytes();
    let mut pos = 0;
    while pos < haystack.len() {
        let Some(caps) = re.captures_at(haystack, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        let digit_before = whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit();
        let digit_after = bytes.get(whole.end()).is_some_and(u8::is_ascii_digit);

        if !digit_before && !digit_after {
            if let Some(when) = build(&caps) {
                out.push(Candidate {
                    start: whole.start(),
                    end: whole.end(),
                    when,
                });
            }
            pos = whole.end();
        } else {
            let first_len = haystack[whole.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            pos = whole.start() + first_len;
        }
    }
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    MONTHS
        .split('|')
        .position(|m| m == prefix)
        .map(|i| i as u32 + 1)
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn year_first(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(
        number(caps, 1)? as i32,
        number(caps, 2)?,
        number(caps, 3)?,
    )?;
    // A malformed time part does not invalidate the date itself
    let time = match (number(caps, 4), number(caps, 5)) {
        (Some(h), Some(m)) => NaiveTime::from_hms_opt(h, m, number(caps, 6).unwrap_or(0)),
        _ => None,
    };
    Some(match time {
        Some(time) => date.and_time(time),
        None => at_midnight(date),
    })
}

fn month_day_first(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let (first, second, year) = (number(caps, 1)?, number(caps, 2)?, number(caps, 3)?);
    let (month, day) = if first > 12 {
        (second, first)
    } else {
        (first, second)
    };
    NaiveDate::from_ymd_opt(year as i32, month, day).map(at_midnight)
}

fn day_month_name(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let day = number(caps, 1)?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year = number(caps, 3)?;
    NaiveDate::from_ymd_opt(year as i32, month, day).map(at_midnight)
}

fn month_name_day(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let month = month_number(caps.get(1)?.as_str())?;
    let day = number(caps, 2)?;
    let year = number(caps, 3)?;
    NaiveDate::from_ymd_opt(year as i32, month, day).map(at_midnight)
}
