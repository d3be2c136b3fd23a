//! Error types for pdfharvest.

use std::io;
use thiserror::Error;

/// Result type alias for pdfharvest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while harvesting a PDF.
///
/// Document-level failures surface as `Err` from the coordinator and the
/// assembler. Page-level failures never leave the page boundary: they are
/// rendered into the page's `error` field instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading the document or writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Page index is out of range.
    #[error("Page index {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// Error extracting text content.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// Error locating or decoding an embedded image.
    #[error("Image extraction error: {0}")]
    ImageExtract(String),

    /// Error rasterizing a page region.
    #[error("Rasterization error: {0}")]
    Rasterize(String),

    /// Resolution must be a positive number of dots per inch.
    #[error("Invalid resolution: {0} dpi")]
    InvalidResolution(u32),

    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A page task ran past its deadline.
    #[error("Page {page_num} timed out after {seconds:.2} seconds")]
    Timeout {
        /// 1-based page number
        page_num: usize,
        /// Configured timeout
        seconds: f64,
    },

    /// A queued page could not start because every worker is stuck.
    #[error("Page {page_num} was not started: all {workers} workers are stuck on timed-out pages")]
    PoolExhausted {
        /// 1-based page number
        page_num: usize,
        /// Size of the worker pool
        workers: usize,
    },

    /// A page task panicked.
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// Error serializing the document record.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Error::Io(e),
            _ => Error::ImageExtract(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page index 10 is out of range (document has 5 pages)"
        );

        let err = Error::Timeout {
            page_num: 3,
            seconds: 1.5,
        };
        assert_eq!(err.to_string(), "Page 3 timed out after 1.50 seconds");

        let err = Error::PoolExhausted {
            page_num: 4,
            workers: 2,
        };
        assert!(err.to_string().starts_with("Page 4 was not started"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialize(_)));
    }
}
