//! Document-level types.

use super::{ExtractedImage, PageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The aggregated output of one run over one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Path of the source document, as given
    pub pdf_path: String,

    /// File name without extension
    pub file_name: String,

    /// Extension without the leading dot
    pub extension: String,

    /// Per-page results ordered by page number
    pub pages: Vec<PageResult>,

    /// Document information dictionary, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentInfo>,
}

impl DocumentRecord {
    /// Create a record for `path` with name and extension taken from the
    /// path string alone.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            pdf_path: path.to_string_lossy().into_owned(),
            file_name,
            extension,
            pages: Vec::new(),
            metadata: None,
        }
    }

    /// Attach the page sequence.
    pub fn with_pages(mut self, pages: Vec<PageResult>) -> Self {
        self.pages = pages;
        self
    }

    /// Attach document information.
    pub fn with_metadata(mut self, metadata: DocumentInfo) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: usize) -> Option<&PageResult> {
        if page_num == 0 {
            return None;
        }
        self.pages.get(page_num - 1)
    }

    /// Pages that failed extraction.
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| !p.is_ok())
    }

    /// All images across all pages, in page order.
    pub fn images(&self) -> impl Iterator<Item = &ExtractedImage> {
        self.pages.iter().flat_map(|p| p.images.iter())
    }
}

/// Document information read from the PDF's Info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Document author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Document subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Creator application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// PDF producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// PDF version (e.g., "1.7")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,

    /// Total number of pages
    #[serde(default)]
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_extension_from_path() {
        let record = DocumentRecord::for_path("reports/annual.2023.pdf");
        assert_eq!(record.pdf_path, "reports/annual.2023.pdf");
        assert_eq!(record.file_name, "annual.2023");
        assert_eq!(record.extension, "pdf");
    }

    #[test]
    fn test_path_without_extension() {
        let record = DocumentRecord::for_path("scan");
        assert_eq!(record.file_name, "scan");
        assert_eq!(record.extension, "");

        let record = DocumentRecord::for_path(".hidden");
        assert_eq!(record.file_name, ".hidden");
        assert_eq!(record.extension, "");
    }

    #[test]
    fn test_get_page() {
        let record = DocumentRecord::for_path("a.pdf").with_pages(vec![
            PageResult::new(1, Some("one".into()), Vec::new()),
            PageResult::failed(2, "bad"),
        ]);
        assert_eq!(record.page_count(), 2);
        assert!(record.get_page(0).is_none());
        assert_eq!(record.get_page(2).unwrap().page_num, 2);
        assert_eq!(record.failed_pages().count(), 1);
    }

    #[test]
    fn test_json_field_layout() {
        let record = DocumentRecord::for_path("doc.pdf")
            .with_pages(vec![PageResult::new(1, Some(String::new()), Vec::new())]);
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(json["file_name"], "doc");
        assert_eq!(json["extension"], "pdf");
        assert!(obj.get("metadata").is_none());

        let record = record.with_metadata(DocumentInfo {
            title: Some("Annual Report".into()),
            page_count: 1,
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metadata"]["title"], "Annual Report");
        assert_eq!(json["metadata"]["page_count"], 1);
    }
}
