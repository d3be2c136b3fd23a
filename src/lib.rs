//! # pdfharvest
//!
//! Parallel page-by-page content harvesting for PDF documents.
//!
//! Every page of a document is processed independently: its text is
//! extracted and normalized to plain ASCII, and every embedded image is
//! rasterized to a PNG file. The per-page results are gathered, in page
//! order, into a single [`DocumentRecord`] ready to be serialized as JSON.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfharvest::{render, Harvester, JsonFormat};
//!
//! fn main() -> pdfharvest::Result<()> {
//!     let record = Harvester::new()
//!         .with_resolution(300)
//!         .with_image_dir("images")
//!         .run("document.pdf")?;
//!
//!     render::save_json(&record, "response_data.json", JsonFormat::Pretty)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A page that cannot be processed does not abort the run. Its entry in the
//! record carries an `error` message, no text and no images, and the other
//! pages are unaffected. Only failures to open the document at all are
//! returned as `Err`.

pub mod assemble;
pub mod backend;
pub mod coordinator;
pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod options;
pub mod render;

// Re-export commonly used types
pub use assemble::{assemble, assemble_with};
pub use backend::{BackendLoader, ImagePlacement, LopdfBackend, LopdfLoader, PdfBackend};
pub use coordinator::{extract_all, extract_all_with_progress};
pub use detect::is_pdf;
pub use error::{Error, Result};
pub use extract::{extract_page, image_path};
pub use model::{BoundingBox, DocumentInfo, DocumentRecord, ExtractedImage, PageResult};
pub use options::{ExtractOptions, DEFAULT_IMAGE_DIR, DEFAULT_RESOLUTION};
pub use render::JsonFormat;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harvest a PDF file with default options.
///
/// Images go to `./images` at 600 dpi, pages are processed in parallel.
///
/// # Example
///
/// ```no_run
/// use pdfharvest::harvest_file;
///
/// let record = harvest_file("document.pdf").unwrap();
/// println!("Pages: {}", record.page_count());
/// ```
pub fn harvest_file<P: AsRef<Path>>(path: P) -> Result<DocumentRecord> {
    assemble(path, &ExtractOptions::default())
}

/// Builder for harvesting PDF documents.
///
/// # Example
///
/// ```no_run
/// use pdfharvest::Harvester;
///
/// let record = Harvester::new()
///     .with_resolution(300)
///     .with_workers(4)
///     .with_metadata()
///     .run("document.pdf")?;
/// # Ok::<(), pdfharvest::Error>(())
/// ```
pub struct Harvester {
    options: ExtractOptions,
}

impl Harvester {
    /// Create a new Harvester builder.
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
        }
    }

    /// Set image rasterization resolution in dpi.
    pub fn with_resolution(mut self, dpi: u32) -> Self {
        self.options = self.options.with_resolution(dpi);
        self
    }

    /// Set image output directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options = self.options.with_image_dir(dir);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.options = self.options.with_workers(workers);
        self
    }

    /// Fail pages that take longer than `timeout`.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_page_timeout(timeout);
        self
    }

    /// Include the document information dictionary in the record.
    pub fn with_metadata(mut self) -> Self {
        self.options = self.options.with_metadata(true);
        self
    }

    /// Get the options this builder will run with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Harvest a PDF file.
    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<DocumentRecord> {
        assemble(path, &self.options)
    }
}

impl Default for Harvester {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvester_defaults() {
        let harvester = Harvester::default();
        let options = harvester.options();
        assert_eq!(options.resolution, DEFAULT_RESOLUTION);
        assert_eq!(options.image_dir, PathBuf::from(DEFAULT_IMAGE_DIR));
        assert!(options.parallel);
        assert!(!options.include_metadata);
    }

    #[test]
    fn test_harvester_chained() {
        let harvester = Harvester::new()
            .with_resolution(150)
            .with_image_dir("out/img")
            .with_workers(3)
            .with_page_timeout(Duration::from_secs(30))
            .with_metadata()
            .sequential();

        let options = harvester.options();
        assert_eq!(options.resolution, 150);
        assert_eq!(options.image_dir, PathBuf::from("out/img"));
        assert_eq!(options.workers, Some(3));
        assert_eq!(options.page_timeout, Some(Duration::from_secs(30)));
        assert!(options.include_metadata);
        assert!(!options.parallel);
    }

    // ==================== Edge Case Tests ====================

    #[test]
    fn test_harvest_missing_file() {
        let result = harvest_file("definitely/not/here.pdf");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_harvester_rejects_zero_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, "%PDF-1.4\n").unwrap();

        let result = Harvester::new().with_resolution(0).run(&path);
        assert!(matches!(result, Err(Error::InvalidResolution(0))));
    }

    #[test]
    fn test_harvester_invalid_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, [0xFF, 0xFE, 0x00, 0x01, 0x02, 0x03]).unwrap();

        let result = Harvester::new().run(&path);
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }
}
