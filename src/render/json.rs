//! JSON rendering for document records.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::DocumentRecord;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a record to JSON.
pub fn to_json(record: &DocumentRecord, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(record),
        JsonFormat::Compact => serde_json::to_string(record),
    };

    result.map_err(|e| Error::Serialize(format!("JSON serialization error: {}", e)))
}

/// Serialize a record and write it to `path`.
///
/// Nothing is written unless serialization succeeds.
pub fn save_json(record: &DocumentRecord, path: impl AsRef<Path>, format: JsonFormat) -> Result<()> {
    let path = path.as_ref();
    let json = to_json(record, format)?;
    fs::write(path, json)?;
    log::info!("Output saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, ExtractedImage, PageResult};

    fn sample_record() -> DocumentRecord {
        DocumentRecord::for_path("docs/report.pdf").with_pages(vec![
            PageResult::new(
                1,
                Some("Hello".to_string()),
                vec![ExtractedImage::new(
                    0,
                    "images/extracted_image_page_1_img_0.png",
                    BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                )],
            ),
            PageResult::failed(2, "Text extraction error: bad stream"),
        ])
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&sample_record(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"file_name\": \"report\""));
        assert!(json.contains('\n')); // Pretty has newlines
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&sample_record(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n')); // Compact has no newlines
    }

    #[test]
    fn test_json_shape() {
        let json = to_json(&sample_record(), JsonFormat::Compact).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["pdf_path"], "docs/report.pdf");
        assert_eq!(value["extension"], "pdf");
        assert!(value.get("metadata").is_none());

        let pages = value["pages"].as_array().unwrap();
        assert_eq!(pages[0]["page_num"], 1);
        assert!(pages[0].get("error").is_none());
        assert_eq!(
            pages[0]["images"][0],
            serde_json::json!({
                "index": 0,
                "path": "images/extracted_image_page_1_img_0.png"
            })
        );

        assert!(pages[1]["text"].is_null());
        assert_eq!(pages[1]["images"], serde_json::json!([]));
        assert_eq!(pages[1]["error"], "Text extraction error: bad stream");
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response_data.json");
        save_json(&sample_record(), &path, JsonFormat::Pretty).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let back: DocumentRecord = serde_json::from_str(&written).unwrap();
        assert_eq!(back.pages.len(), 2);
        assert_eq!(back.pages[1].error.as_deref(), Some("Text extraction error: bad stream"));
    }

    #[test]
    fn test_save_json_bad_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(matches!(
            save_json(&sample_record(), &path, JsonFormat::Pretty),
            Err(Error::Io(_))
        ));
    }
}
