//! One caption job: one image in, one captioned image out.
//!
//! ```text
//! guard ─→ identify ─→ read tags ─→ resolve DateTime ─→ compose caption
//!   │                                                        │
//!   │         render ←─ place ←─ measure ←─ decide font size ←┘
//!   ▼
//! JobOutcome { warnings, result }
//! ```
//!
//! A job never panics and never returns `Err`: every failure becomes a
//! [`JobFailure`] inside the [`JobOutcome`], tagged with the [`JobStage`] it
//! happened in. Recoverable problems (a missing template variable, a date
//! that would not parse, a font size that could not be fitted) are
//! [`JobWarning`]s on an otherwise successful outcome.
//!
//! The collision guard runs before anything is decoded, so an existing output
//! file is never overwritten by accident and costs no pixel work.

use crate::date::{self, DateSource};
use crate::imaging::{
    Alignment, BackendError, FontColor, FontSizeDecision, FontSource, ImageBackend, Placement,
    RenderParams, RenderTarget, TextExtent, decide_font_size, place_caption,
};
use crate::template;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything a job needs besides its two paths.
///
/// Built once per invocation from the merged configuration and shared
/// read-only by every job in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub template: String,
    pub date_format: String,
    pub alignment: Alignment,
    pub font: FontSource,
    /// `None` fits the caption to the image.
    pub font_size: Option<u32>,
    pub color: FontColor,
    pub stroke_width: u32,
    pub overwrite: bool,
    pub preview: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            template: "##DateTime".to_string(),
            date_format: "%Y/%m/%d, %H:%M".to_string(),
            alignment: Alignment::default(),
            font: FontSource::Bundled,
            font_size: None,
            color: FontColor::default(),
            stroke_width: 1,
            overwrite: false,
            preview: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobWarning {
    MissingTemplateVariable { name: String },
    DateParseFailure { reason: String },
    FontFitFallback { reason: String },
}

impl fmt::Display for JobWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobWarning::MissingTemplateVariable { name } => {
                write!(f, "variable '{name}' not found, left as written")
            }
            JobWarning::DateParseFailure { reason } => write!(f, "no capture date: {reason}"),
            JobWarning::FontFitFallback { reason } => {
                write!(f, "font size not fitted ({reason}), used default")
            }
        }
    }
}

/// Pipeline step a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Guard,
    Load,
    Metadata,
    Measure,
    Render,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStage::Guard => "output check",
            JobStage::Load => "load",
            JobStage::Metadata => "metadata",
            JobStage::Measure => "measure",
            JobStage::Render => "render",
        })
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("'{}' already exists. To overwrite use --overwrite flag.", .0.display())]
    OutputCollision(PathBuf),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Coarse error category, for reports and exit decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    OutputCollision,
    Io,
    Decode,
    Encode,
    Font,
    Preview,
}

impl From<&JobError> for FailureKind {
    fn from(error: &JobError) -> Self {
        match error {
            JobError::OutputCollision(_) => FailureKind::OutputCollision,
            JobError::Backend(BackendError::Io(_)) => FailureKind::Io,
            JobError::Backend(BackendError::Decode(_)) => FailureKind::Decode,
            JobError::Backend(BackendError::Encode(_)) => FailureKind::Encode,
            JobError::Backend(BackendError::Font(_)) => FailureKind::Font,
            JobError::Backend(BackendError::Preview(_)) => FailureKind::Preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub stage: JobStage,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Written(PathBuf),
    Previewed,
}

/// What a successful job drew and where.
#[derive(Debug, Clone, PartialEq)]
pub struct Captioned {
    pub caption: String,
    pub date_source: DateSource,
    pub font_size: FontSizeDecision,
    pub extent: TextExtent,
    pub placement: Placement,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub source: PathBuf,
    pub warnings: Vec<JobWarning>,
    pub result: Result<Captioned, JobFailure>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Caption `source` into `destination` (or a preview when the settings ask
/// for one).
pub fn run_job(
    backend: &impl ImageBackend,
    settings: &JobSettings,
    source: &Path,
    destination: &Path,
) -> JobOutcome {
    let mut warnings = Vec::new();
    let result = caption_image(backend, settings, source, destination, &mut warnings).map_err(
        |(stage, error)| {
            log::error!("{} failed during {stage}: {error}", source.display());
            JobFailure {
                stage,
                kind: FailureKind::from(&error),
                message: error.to_string(),
            }
        },
    );

    JobOutcome {
        source: source.to_path_buf(),
        warnings,
        result,
    }
}

fn at(stage: JobStage) -> impl Fn(BackendError) -> (JobStage, JobError) {
    move |e| (stage, JobError::Backend(e))
}

fn caption_image(
    backend: &impl ImageBackend,
    settings: &JobSettings,
    source: &Path,
    destination: &Path,
    warnings: &mut Vec<JobWarning>,
) -> Result<Captioned, (JobStage, JobError)> {
    if !settings.overwrite && destination.exists() {
        return Err((
            JobStage::Guard,
            JobError::OutputCollision(destination.to_path_buf()),
        ));
    }

    let dims = backend.identify(source).map_err(at(JobStage::Load))?;
    // The job owns this copy; the resolved date is added to it below.
    let mut variables = backend
        .read_metadata(source)
        .map_err(at(JobStage::Metadata))?;
    log::debug!("{}: {} tags", source.display(), variables.len());

    let date = date::resolve(&variables, source, &settings.date_format);
    if let Some(reason) = &date.fallback_reason {
        warnings.push(JobWarning::DateParseFailure {
            reason: reason.clone(),
        });
    }
    variables.insert("DateTime", date.text);

    let composition = template::compose(&settings.template, &variables);
    warnings.extend(
        composition
            .missing
            .into_iter()
            .map(|name| JobWarning::MissingTemplateVariable { name }),
    );
    let caption = composition.text;

    let font_size = decide_font_size(backend, &caption, &settings.font, dims, settings.font_size);
    if let FontSizeDecision::Fallback { reason, .. } = &font_size {
        warnings.push(JobWarning::FontFitFallback {
            reason: reason.clone(),
        });
    }

    let (extent, placement) = place_caption(
        backend,
        &caption,
        &settings.font,
        font_size.pixels(),
        dims,
        settings.alignment,
    )
    .map_err(at(JobStage::Measure))?;

    let (target, delivery) = if settings.preview {
        (RenderTarget::Preview, Delivery::Previewed)
    } else {
        (
            RenderTarget::File(destination.to_path_buf()),
            Delivery::Written(destination.to_path_buf()),
        )
    };

    backend
        .render(&RenderParams {
            source: source.to_path_buf(),
            target,
            caption: caption.clone(),
            font: settings.font.clone(),
            font_size: font_size.pixels(),
            color: settings.color,
            stroke_width: settings.stroke_width,
            placement,
        })
        .map_err(at(JobStage::Render))?;

    log::info!(
        "Caption '{caption}' added to file '{}'",
        match &delivery {
            Delivery::Written(path) => path.display().to_string(),
            Delivery::Previewed => "preview".to_string(),
        }
    );

    Ok(Captioned {
        caption,
        date_source: date.source,
        font_size,
        extent,
        placement,
        delivery,
    })
}
