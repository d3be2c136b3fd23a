//! Extraction options and configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default rasterization resolution in dots per inch.
pub const DEFAULT_RESOLUTION: u32 = 600;

/// Default directory for extracted images, relative to the working directory.
pub const DEFAULT_IMAGE_DIR: &str = "images";

/// Options controlling a harvest run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Image rasterization resolution (DPI)
    pub resolution: u32,

    /// Directory extracted images are written to
    pub image_dir: PathBuf,

    /// Whether to dispatch pages to a worker pool
    pub parallel: bool,

    /// Worker count override (defaults to available parallelism)
    pub workers: Option<usize>,

    /// Per-page deadline; a page running longer becomes a page-level error
    pub page_timeout: Option<Duration>,

    /// Whether to read the document information dictionary into the record
    pub include_metadata: bool,
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rasterization resolution.
    pub fn with_resolution(mut self, dpi: u32) -> Self {
        self.resolution = dpi;
        self
    }

    /// Set image output directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the per-page timeout.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = Some(timeout);
        self
    }

    /// Include document information in the record.
    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Check the options for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::InvalidResolution(self.resolution));
        }
        if self.workers == Some(0) {
            return Err(Error::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.page_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "page timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of workers to use for a document with `page_count` pages.
    ///
    /// Falls back to the available hardware parallelism, never below 1 and
    /// never above the page count.
    pub fn worker_count(&self, page_count: usize) -> usize {
        let requested = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        requested.min(page_count).max(1)
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            parallel: true,
            workers: None,
            page_timeout: None,
            include_metadata: false,
        }
    }
}
