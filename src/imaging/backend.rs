//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: identify, read_metadata, measure_text, and render.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked, with the default font compiled in.

use super::params::{FontSource, RenderParams};
use crate::metadata::MetadataMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Font unusable: {0}")]
    Font(String),
    #[error("Preview failed: {0}")]
    Preview(String),
}

/// Result of an identify operation, after EXIF orientation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pixel size of a rendered caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

impl TextExtent {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// Every backend must implement all four operations, so the rest of the
/// codebase is backend-agnostic.
pub trait ImageBackend: Sync {
    /// Get image dimensions as displayed (orientation-corrected).
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Read the embedded tag table. Images without tags yield an empty map.
    fn read_metadata(&self, path: &Path) -> Result<MetadataMap, BackendError>;

    /// Size of `text` drawn with `font` at `size` pixels.
    fn measure_text(
        &self,
        font: &FontSource,
        size: u32,
        text: &str,
    ) -> Result<TextExtent, BackendError>;

    /// Draw the caption and deliver the result.
    fn render(&self, params: &RenderParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::RenderTarget;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Behavior is keyed by path rather than call order, since batch jobs run
    /// in any order. Text measures `size / 2` pixels per character and `size`
    /// pixels tall.
    pub struct MockBackend {
        pub dimensions: Dimensions,
        pub metadata: Mutex<HashMap<PathBuf, MetadataMap>>,
        pub corrupt: Mutex<HashSet<PathBuf>>,
        pub failing_renders: Mutex<HashSet<PathBuf>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        ReadMetadata(String),
        Measure {
            text: String,
            size: u32,
        },
        Render {
            source: String,
            target: RenderTarget,
            caption: String,
            font_size: u32,
            x: i32,
            y: i32,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_dimensions(4000, 3000)
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Dimensions { width, height },
                metadata: Mutex::new(HashMap::new()),
                corrupt: Mutex::new(HashSet::new()),
                failing_renders: Mutex::new(HashSet::new()),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn add_metadata(&self, path: impl Into<PathBuf>, tags: MetadataMap) {
            self.metadata.lock().unwrap().insert(path.into(), tags);
        }

        /// Make `identify` fail for this path, as for an undecodable file.
        pub fn add_corrupt(&self, path: impl Into<PathBuf>) {
            self.corrupt.lock().unwrap().insert(path.into());
        }

        /// Make `render` fail when writing this source.
        pub fn add_failing_render(&self, path: impl Into<PathBuf>) {
            self.failing_renders.lock().unwrap().insert(path.into());
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn renders(&self) -> Vec<RecordedOp> {
            self.get_operations()
                .into_iter()
                .filter(|op| matches!(op, RecordedOp::Render { .. }))
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            if self.corrupt.lock().unwrap().contains(path) {
                return Err(BackendError::Decode(format!(
                    "{}: not an image",
                    path.display()
                )));
            }
            Ok(self.dimensions)
        }

        fn read_metadata(&self, path: &Path) -> Result<MetadataMap, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ReadMetadata(path.to_string_lossy().to_string()));

            Ok(self
                .metadata
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_default())
        }

        fn measure_text(
            &self,
            _font: &FontSource,
            size: u32,
            text: &str,
        ) -> Result<TextExtent, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Measure {
                text: text.to_string(),
                size,
            });
            let chars = text.chars().count() as u32;
            Ok(TextExtent {
                width: chars * size / 2,
                height: if chars == 0 { 0 } else { size },
            })
        }

        fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Render {
                source: params.source.to_string_lossy().to_string(),
                target: params.target.clone(),
                caption: params.caption.clone(),
                font_size: params.font_size,
                x: params.placement.x,
                y: params.placement.y,
            });
            if self.failing_renders.lock().unwrap().contains(&params.source) {
                return Err(BackendError::Encode("disk full".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_corrupt_path_fails_identify() {
        let backend = MockBackend::new();
        backend.add_corrupt("/test/broken.jpg");

        assert!(matches!(
            backend.identify(Path::new("/test/broken.jpg")),
            Err(BackendError::Decode(_))
        ));
        assert!(backend.identify(Path::new("/test/fine.jpg")).is_ok());
    }

    #[test]
    fn mock_metadata_is_per_path() {
        let backend = MockBackend::new();
        backend.add_metadata("/a.jpg", [("Make", "Canon")].into_iter().collect());

        let a = backend.read_metadata(Path::new("/a.jpg")).unwrap();
        let b = backend.read_metadata(Path::new("/b.jpg")).unwrap();
        assert_eq!(a.text("Make"), Some("Canon"));
        assert!(b.is_empty());
    }

    #[test]
    fn mock_measures_proportionally() {
        let backend = MockBackend::new();
        let extent = backend
            .measure_text(&FontSource::Bundled, 64, "abcd")
            .unwrap();
        assert_eq!(extent, TextExtent { width: 128, height: 64 });
        let empty = backend.measure_text(&FontSource::Bundled, 64, "").unwrap();
        assert_eq!(empty, TextExtent::default());
    }
}
