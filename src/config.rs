//! Caption configuration module.
//!
//! Handles loading, validating, and merging `imgcaption.toml`. Configuration
//! is layered, later layers overriding earlier ones key by key:
//!
//! ```text
//! stock defaults  →  imgcaption.toml (or --config FILE)  →  command-line flags
//! ```
//!
//! The command line is just another TOML overlay built from the flags that
//! were given, so every value goes through the same validation no matter
//! where it came from.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [caption]
//! template = "##DateTime"        # Caption text; ##Tag expands to an EXIF tag
//! date_format = "%Y/%m/%d, %H:%M" # strftime format for ##DateTime
//! alignment = "bottom_left"      # bottom_left, bottom_right, top_left, top_right, center
//!
//! [font]
//! # path = "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf"  # default: bundled DejaVu Sans
//! # size = 48                    # pixels; default: fitted to the image width
//! color = "blue"                 # name, #rgb, #rrggbb or #rrggbbaa
//! stroke_width = 1               # outline radius in pixels, 0-100
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::date;
use crate::imaging::{Alignment, FontColor, FontSource};
use crate::job::JobSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "imgcaption.toml";

/// Widest outline accepted; beyond this the glyphs melt into a blob.
pub const MAX_STROKE_WIDTH: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Validation(String),
}

/// Caption configuration loaded from `imgcaption.toml`.
///
/// All fields have defaults matching the classic behaviour: the capture date
/// in blue, bottom left, sized to the image. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    /// Caption text and placement.
    pub caption: CaptionSection,
    /// Glyph source and styling.
    pub font: FontSection,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionSection {
    pub template: String,
    pub date_format: String,
    pub alignment: String,
}

impl Default for CaptionSection {
    fn default() -> Self {
        Self {
            template: "##DateTime".to_string(),
            date_format: "%Y/%m/%d, %H:%M".to_string(),
            alignment: Alignment::default().keyword().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontSection {
    /// TrueType/OpenType file. `None` uses the bundled font.
    pub path: Option<PathBuf>,
    /// Fixed pixel size. `None` fits the caption to the image width.
    pub size: Option<u32>,
    pub color: String,
    pub stroke_width: u32,
}

impl Default for FontSection {
    fn default() -> Self {
        Self {
            path: None,
            size: None,
            color: "blue".to_string(),
            stroke_width: 1,
        }
    }
}

impl CaptionConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.job_settings().map(|_| ())
    }

    /// Parse the textual settings into what a caption job consumes.
    ///
    /// The font source is decided here, once, so jobs never probe the
    /// filesystem for fonts. Overwrite and preview are command-line only and
    /// start out off.
    pub fn job_settings(&self) -> Result<JobSettings, ConfigError> {
        let invalid = |key: &str, detail: String| ConfigError::Validation(format!("{key}: {detail}"));

        if !date::is_valid_format(&self.caption.date_format) {
            return Err(invalid(
                "caption.date_format",
                format!("'{}' is not a valid strftime format", self.caption.date_format),
            ));
        }
        let alignment: Alignment = self
            .caption
            .alignment
            .parse()
            .map_err(|e| invalid("caption.alignment", format!("{e}")))?;
        let color: FontColor = self
            .font
            .color
            .parse()
            .map_err(|e| invalid("font.color", format!("{e}")))?;
        if self.font.size == Some(0) {
            return Err(invalid("font.size", "must be at least 1".into()));
        }
        if self.font.stroke_width > MAX_STROKE_WIDTH {
            return Err(invalid(
                "font.stroke_width",
                format!("must be 0-{MAX_STROKE_WIDTH}"),
            ));
        }
        let font = match &self.font.path {
            None => FontSource::Bundled,
            Some(path) if path.is_file() => FontSource::File(path.clone()),
            Some(path) => {
                return Err(invalid(
                    "font.path",
                    format!("no font file at {}", path.display()),
                ));
            }
        };

        Ok(JobSettings {
            template: self.caption.template.clone(),
            date_format: self.caption.date_format.clone(),
            alignment,
            font,
            font_size: self.font.size,
            color,
            stroke_width: self.font.stroke_width,
            overwrite: false,
            preview: false,
        })
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel caption workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CaptionConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CaptionConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CaptionConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, falling back to stock defaults when it is absent.
///
/// Layers stock defaults, then the file, then `overrides` (the command line),
/// rejects unknown keys, and validates the result.
pub fn load_config(
    path: &Path,
    overrides: Option<toml::Value>,
) -> Result<CaptionConfig, ConfigError> {
    let mut base = stock_defaults_value();
    if let Some(user) = load_raw_config(path)? {
        log::info!("Using config {}", path.display());
        base = merge_toml(base, user);
    }
    resolve_config(base, overrides)
}

/// Returns a fully-commented stock `imgcaption.toml` with all keys and explanations.
///
/// Used by the `--gen-config` flag.
pub fn stock_config_toml() -> &'static str {
    r###"# imgcaption configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# imgcaption reads ./imgcaption.toml, or the file given with --config.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Caption text
# ---------------------------------------------------------------------------
[caption]
# Caption template. ##Name expands to the image's EXIF tag Name,
# ##{Name} does the same when letters follow, #### is a literal ##.
# ##DateTime is the capture date, formatted with date_format below.
# Tags an image lacks are left in the caption as written.
template = "##DateTime"

# strftime format for ##DateTime.
date_format = "%Y/%m/%d, %H:%M"

# Where the caption goes: bottom_left, bottom_right, top_left, top_right
# or center. Short forms (bl, br, tl, tr, c) work too.
alignment = "bottom_left"

# ---------------------------------------------------------------------------
# Font
# ---------------------------------------------------------------------------
[font]
# TrueType/OpenType font file. Omit to use the bundled DejaVu Sans.
# path = "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf"

# Font size in pixels. Omit to fit the caption to 30% of the width of
# landscape images and 50% of portrait ones.
# size = 48

# Color name (blue, white, black, ...) or #rgb, #rrggbb, #rrggbbaa.
color = "blue"

# Outline thickness in pixels (0-100). 0 draws plain glyphs.
stroke_width = 1

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel caption workers for directories.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"###
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = CaptionConfig::default();
        assert_eq!(config.caption.template, "##DateTime");
        assert_eq!(config.caption.date_format, "%Y/%m/%d, %H:%M");
        assert_eq!(config.caption.alignment, "bottom_left");
        assert_eq!(config.font.path, None);
        assert_eq!(config.font.size, None);
        assert_eq!(config.font.color, "blue");
        assert_eq!(config.font.stroke_width, 1);
    }

    #[test]
    fn default_config_settings() {
        let settings = CaptionConfig::default().job_settings().unwrap();
        assert_eq!(settings, JobSettings::default());
        assert_eq!(settings.font, FontSource::Bundled);
        assert_eq!(settings.alignment, Alignment::BottomLeft);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[font]
color = "#ffffff"
"##;
        let config: CaptionConfig = toml::from_str(toml).unwrap();
        // Overridden value
        assert_eq!(config.font.color, "#ffffff");
        // Default values preserved
        assert_eq!(config.font.stroke_width, 1);
        assert_eq!(config.caption.template, "##DateTime");
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME), None).unwrap();
        assert_eq!(config, CaptionConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);

        fs::write(
            &config_path,
            r##"
[caption]
template = "Party, ##DateTime"
alignment = "tr"

[font]
size = 40
"##,
        )
        .unwrap();

        let config = load_config(&config_path, None).unwrap();
        assert_eq!(config.caption.template, "Party, ##DateTime");
        assert_eq!(config.caption.alignment, "tr");
        assert_eq!(config.font.size, Some(40));
        // Unspecified values should be defaults
        assert_eq!(config.caption.date_format, "%Y/%m/%d, %H:%M");
        assert_eq!(config.font.color, "blue");
    }

    #[test]
    fn load_config_overrides_beat_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            "[caption]\ntemplate = \"From file\"\nalignment = \"tr\"\n",
        )
        .unwrap();
        let overrides: toml::Value = toml::from_str("[caption]\ntemplate = \"From flag\"").unwrap();

        let config = load_config(&config_path, Some(overrides)).unwrap();
        assert_eq!(config.caption.template, "From flag");
        assert_eq!(config.caption.alignment, "tr");
    }

    #[test]
    fn load_config_overrides_apply_without_file() {
        let tmp = TempDir::new().unwrap();
        let overrides: toml::Value = toml::from_str("[font]\nsize = 30").unwrap();

        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME), Some(overrides)).unwrap();
        assert_eq!(config.font.size, Some(30));
        assert_eq!(config.caption.template, "##DateTime");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path, None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[caption]\nalignment = \"middle\"\n").unwrap();

        let result = load_config(&config_path, None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_raw_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(result.is_none());
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"size = 64"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"size = 40"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("size").unwrap().as_integer(), Some(40));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[font]
color = "blue"
stroke_width = 1
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[font]
color = "white"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let font = merged.get("font").unwrap();
        assert_eq!(font.get("color").unwrap().as_str(), Some("white"));
        // stroke_width preserved from base
        assert_eq!(font.get("stroke_width").unwrap().as_integer(), Some(1));
    }

    #[test]
    fn merge_toml_three_layers() {
        let file: toml::Value = toml::from_str(
            r#"
[caption]
template = "From file ##DateTime"
alignment = "tr"
"#,
        )
        .unwrap();
        let cli: toml::Value = toml::from_str(
            r#"
[caption]
alignment = "center"
"#,
        )
        .unwrap();

        let merged = merge_toml(merge_toml(stock_defaults_value(), file), cli);
        let config: CaptionConfig = merged.try_into().unwrap();
        assert_eq!(config.caption.template, "From file ##DateTime");
        assert_eq!(config.caption.alignment, "center");
        // date_format preserved from stock
        assert_eq!(config.caption.date_format, "%Y/%m/%d, %H:%M");
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[font]
colour = "red"
"#;
        let result: Result<CaptionConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[fonts]
color = "red"
"#;
        let result: Result<CaptionConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    fn settings_error(toml_str: &str) -> String {
        let config: CaptionConfig = toml::from_str(toml_str).unwrap();
        match config.validate() {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(CaptionConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_alignment() {
        let msg = settings_error("[caption]\nalignment = \"middle\"");
        assert!(msg.contains("caption.alignment"), "{msg}");
        assert!(msg.contains("middle"), "{msg}");
    }

    #[test]
    fn validate_date_format() {
        let msg = settings_error("[caption]\ndate_format = \"%Y %Q\"");
        assert!(msg.contains("caption.date_format"), "{msg}");
    }

    #[test]
    fn validate_color() {
        let msg = settings_error("[font]\ncolor = \"#12\"");
        assert!(msg.contains("font.color"), "{msg}");
    }

    #[test]
    fn validate_size_zero() {
        let msg = settings_error("[font]\nsize = 0");
        assert!(msg.contains("font.size"), "{msg}");
    }

    #[test]
    fn validate_stroke_width_boundary() {
        let ok: CaptionConfig = toml::from_str("[font]\nstroke_width = 100").unwrap();
        assert!(ok.validate().is_ok());
        let msg = settings_error("[font]\nstroke_width = 101");
        assert!(msg.contains("font.stroke_width"), "{msg}");
    }

    #[test]
    fn validate_missing_font_file() {
        let msg = settings_error("[font]\npath = \"/nonexistent/font.ttf\"");
        assert!(msg.contains("font.path"), "{msg}");
    }

    #[test]
    fn existing_font_file_is_used() {
        let tmp = TempDir::new().unwrap();
        let font = tmp.path().join("custom.ttf");
        fs::write(&font, b"glyphs").unwrap();

        let config = CaptionConfig {
            font: FontSection {
                path: Some(font.clone()),
                ..FontSection::default()
            },
            ..CaptionConfig::default()
        };
        assert_eq!(config.job_settings().unwrap().font, FontSource::File(font));
    }

    #[test]
    fn empty_template_is_allowed() {
        let config: CaptionConfig = toml::from_str("[caption]\ntemplate = \"\"").unwrap();
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_matches_defaults() {
        let parsed: CaptionConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, CaptionConfig::default());
    }

    #[test]
    fn stock_defaults_value_resolves() {
        let config = resolve_config(stock_defaults_value(), None).unwrap();
        assert_eq!(config, CaptionConfig::default());
    }
}
