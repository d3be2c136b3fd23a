//! Document-level assembly.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendLoader, LopdfLoader};
use crate::coordinator::extract_all_with_progress;
use crate::error::Result;
use crate::model::{DocumentRecord, PageResult};
use crate::options::ExtractOptions;

/// Extract the document at `path` into a [`DocumentRecord`] using the lopdf
/// backend.
pub fn assemble(path: impl AsRef<Path>, options: &ExtractOptions) -> Result<DocumentRecord> {
    assemble_with(Arc::new(LopdfLoader), path, options, |_| {})
}

/// Extract the document at `path` with a custom loader, reporting each page
/// to `progress` as it completes.
///
/// Either every page has a result or the whole call fails; a partially
/// populated record is never returned.
pub fn assemble_with<F>(
    loader: Arc<dyn BackendLoader>,
    path: impl AsRef<Path>,
    options: &ExtractOptions,
    progress: F,
) -> Result<DocumentRecord>
where
    F: FnMut(&PageResult),
{
    let path = path.as_ref();
    let start = Instant::now();
    log::info!("Processing PDF: {}", path.display());

    match build_record(loader, path, options, progress) {
        Ok(record) => {
            let failed = record.failed_pages().count();
            if failed > 0 {
                log::warn!(
                    "{} of {} pages failed in {}",
                    failed,
                    record.page_count(),
                    path.display()
                );
            }
            log::info!(
                "PDF processed successfully in {:.2} seconds.",
                start.elapsed().as_secs_f64()
            );
            Ok(record)
        }
        Err(e) => {
            log::error!("Failed to process PDF {}: {}", path.display(), e);
            Err(e)
        }
    }
}

fn build_record<F>(
    loader: Arc<dyn BackendLoader>,
    path: &Path,
    options: &ExtractOptions,
    progress: F,
) -> Result<DocumentRecord>
where
    F: FnMut(&PageResult),
{
    options.validate()?;

    let metadata = if options.include_metadata {
        Some(loader.load(path)?.info())
    } else {
        None
    };

    let pages = extract_all_with_progress(loader, path, options, progress)?;
    let mut record = DocumentRecord::for_path(path).with_pages(pages);
    if let Some(info) = metadata {
        record = record.with_metadata(info);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_assemble_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        let options = ExtractOptions::new().with_image_dir(dir.path().join("images"));

        let result = assemble(&missing, &options);
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!dir.path().join("images").exists());
    }

    #[test]
    fn test_assemble_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "just some text").unwrap();

        let result = assemble(&path, &ExtractOptions::new());
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_assemble_rejects_invalid_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, "%PDF-1.4\n").unwrap();

        let options = ExtractOptions::new().with_resolution(0);
        let result = assemble(&path, &options);
        assert!(matches!(result, Err(Error::InvalidResolution(0))));
    }
}
