//! Invocation-level orchestration: one file or a whole directory.
//!
//! ```text
//! caption_path
//!   ├── file      → caption_file       → run_job
//!   └── directory → caption_directory  → run_job × N (sequential or rayon pool)
//! ```
//!
//! Directory rules, checked in order before any image is touched:
//!
//! 1. Only top-level files with a `.jpg`, `.gif`, `.png` or `.tga` extension
//!    (any case) are captioned; subdirectories are not descended into.
//! 2. Preview is refused for directories.
//! 3. A directory without images is an error.
//! 4. The output directory (default: sibling `<name>_captioned`) must not
//!    exist unless overwrite was requested.
//!
//! Once jobs start, one failing image never stops the others: its failure is
//! recorded in the [`BatchReport`] and the batch goes on.

use crate::imaging::{BackendError, ImageBackend};
use crate::job::{JobOutcome, JobSettings, run_job};
use crate::metadata::MetadataMap;
use crate::template;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Extensions picked up from directories (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "gif", "png", "tga"];

/// Appended to a directory name for its default output directory.
pub const DIRECTORY_SUFFIX: &str = "_captioned";

/// Prepended to a file name for its default output file.
pub const FILE_PREFIX: &str = "captioned_";

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Unable to find image or directory under path: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("Preview is not supported for directories ({}); caption a single image to preview it", .0.display())]
    ConfigurationConflict(PathBuf),
    #[error("Unable to find any image under directory: {}", .0.display())]
    EmptyDirectory(PathBuf),
    #[error("'{}' already exists. To overwrite use --overwrite flag.", .0.display())]
    OutputCollision(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory listing failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Worker pool could not start: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What to caption, where to put it, and how.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Image file or directory of images.
    pub path: PathBuf,
    /// Output file or directory; `None` picks the default next to `path`.
    pub output: Option<PathBuf>,
    pub settings: JobSettings,
}

/// How directory jobs are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sequential,
    /// A dedicated rayon pool with this many workers.
    Parallel { workers: usize },
}

/// Outcome of captioning a directory.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    /// One per image, in file name order.
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[derive(Debug, Clone)]
pub enum RunReport {
    Single(JobOutcome),
    Batch(BatchReport),
}

/// Whether a path carries one of the [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Images directly inside `dir`, sorted by path.
///
/// Only a failure to list `dir` itself is fatal. An entry that cannot be
/// resolved (a dangling symlink, say) is skipped unless it carries an image
/// extension, in which case it is kept so its own job reports the problem.
pub fn gather_images(dir: &Path) -> Result<Vec<PathBuf>, CaptionError> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_image_extension(entry.path()) {
                    images.push(entry.into_path());
                }
            }
            Err(e) if e.depth() > 0 => match e.path() {
                Some(path) if has_image_extension(path) => {
                    log::warn!("Unable to inspect {}: {e}", path.display());
                    images.push(path.to_path_buf());
                }
                _ => log::debug!("Skipping unreadable entry: {e}"),
            },
            Err(e) => return Err(e.into()),
        }
    }
    images.sort();
    Ok(images)
}

/// `photos/` → `photos_captioned/`, next to it.
pub fn default_directory_output(dir: &Path) -> PathBuf {
    let named = match dir.file_name() {
        Some(_) => dir.to_path_buf(),
        // `.` and `..` have no name of their own
        None => dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()),
    };
    match named.file_name() {
        Some(name) => {
            let mut output = name.to_os_string();
            output.push(DIRECTORY_SUFFIX);
            named.with_file_name(output)
        }
        None => PathBuf::from(format!("images{DIRECTORY_SUFFIX}")),
    }
}

/// `photos/party.jpg` → `photos/captioned_party.jpg`.
pub fn default_file_output(file: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(FILE_PREFIX);
    name.push(file.file_name().unwrap_or_default());
    file.with_file_name(name)
}

fn emit(events: Option<&Sender<JobOutcome>>, outcome: &JobOutcome) {
    if let Some(tx) = events {
        // A gone receiver only means nobody is listening anymore
        tx.send(outcome.clone()).ok();
    }
}

/// Caption whatever `request.path` points at.
pub fn caption_path(
    backend: &impl ImageBackend,
    request: &CaptionRequest,
    dispatch: Dispatch,
    events: Option<Sender<JobOutcome>>,
) -> Result<RunReport, CaptionError> {
    if !request.path.exists() {
        return Err(CaptionError::PathNotFound(request.path.clone()));
    }

    if request.path.is_dir() {
        caption_directory(
            backend,
            &request.path,
            request.output.as_deref(),
            &request.settings,
            dispatch,
            events.as_ref(),
        )
        .map(RunReport::Batch)
    } else {
        Ok(RunReport::Single(caption_file(
            backend,
            &request.path,
            request.output.as_deref(),
            &request.settings,
            events.as_ref(),
        )))
    }
}

/// Caption a single image.
pub fn caption_file(
    backend: &impl ImageBackend,
    file: &Path,
    output: Option<&Path>,
    settings: &JobSettings,
    events: Option<&Sender<JobOutcome>>,
) -> JobOutcome {
    let destination = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_file_output(file));
    let outcome = run_job(backend, settings, file, &destination);
    emit(events, &outcome);
    outcome
}

/// Caption every image in `dir` into one output directory.
pub fn caption_directory(
    backend: &impl ImageBackend,
    dir: &Path,
    output: Option<&Path>,
    settings: &JobSettings,
    dispatch: Dispatch,
    events: Option<&Sender<JobOutcome>>,
) -> Result<BatchReport, CaptionError> {
    let images = gather_images(dir)?;
    if settings.preview {
        return Err(CaptionError::ConfigurationConflict(dir.to_path_buf()));
    }
    if images.is_empty() {
        return Err(CaptionError::EmptyDirectory(dir.to_path_buf()));
    }

    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_directory_output(dir));
    if output_dir.exists() && !settings.overwrite {
        return Err(CaptionError::OutputCollision(output_dir));
    }
    std::fs::create_dir_all(&output_dir)?;

    let jobs: Vec<(PathBuf, PathBuf)> = images
        .into_iter()
        .map(|source| {
            let destination = output_dir.join(source.file_name().unwrap_or_default());
            (source, destination)
        })
        .collect();

    log::info!(
        "Captioning {} images from {} into {}",
        jobs.len(),
        dir.display(),
        output_dir.display()
    );
    log::debug!(
        "Template '{}' references {:?}",
        settings.template,
        template::variables(&settings.template)
    );

    let run = |(source, destination): &(PathBuf, PathBuf)| {
        let outcome = run_job(backend, settings, source, destination);
        emit(events, &outcome);
        outcome
    };

    let outcomes: Vec<JobOutcome> = match dispatch {
        Dispatch::Sequential => jobs.iter().map(run).collect(),
        Dispatch::Parallel { workers } => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?;
            pool.install(|| jobs.par_iter().map(run).collect())
        }
    };

    Ok(BatchReport {
        output_dir,
        outcomes,
    })
}

/// Read the tag table of one image or of every image in a directory.
///
/// Per-file read failures are returned alongside the successes.
pub fn dump_metadata(
    backend: &impl ImageBackend,
    path: &Path,
) -> Result<Vec<(PathBuf, Result<MetadataMap, BackendError>)>, CaptionError> {
    if !path.exists() {
        return Err(CaptionError::PathNotFound(path.to_path_buf()));
    }
    let files = if path.is_dir() {
        let images = gather_images(path)?;
        if images.is_empty() {
            return Err(CaptionError::EmptyDirectory(path.to_path_buf()));
        }
        images
    } else {
        vec![path.to_path_buf()]
    };

    Ok(files
        .into_iter()
        .map(|file| {
            let tags = backend.read_metadata(&file);
            (file, tags)
        })
        .collect())
}
