//! Page-level types.

use super::ExtractedImage;
use serde::{Deserialize, Serialize};

/// The outcome of extracting one page.
///
/// A page either succeeded (`text` is set, `error` is `None`) or failed in
/// isolation (`text` is `None`, `images` is empty and `error` describes the
/// failure). Either way the document keeps exactly one entry per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Page number (1-indexed)
    pub page_num: usize,

    /// Normalized page text
    pub text: Option<String>,

    /// Images persisted from this page, in encounter order
    pub images: Vec<ExtractedImage>,

    /// Failure description for pages that could not be extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    /// Create a successful page result.
    pub fn new(page_num: usize, text: Option<String>, images: Vec<ExtractedImage>) -> Self {
        Self {
            page_num,
            text,
            images,
            error: None,
        }
    }

    /// Create a failed page result.
    pub fn failed(page_num: usize, error: impl Into<String>) -> Self {
        Self {
            page_num,
            text: None,
            images: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Check if the page was extracted without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Zero-based page index.
    pub fn index(&self) -> usize {
        self.page_num.saturating_sub(1)
    }
}
