//! PDF header sniffing.
//!
//! Runs before the document is handed to the parser so that a missing or
//! non-PDF input fails fast with a clear document-level error.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into the file the header may start. Some producers emit junk
/// before `%PDF-`, and readers accept it within the first kilobyte.
const HEADER_WINDOW: usize = 1024;

/// Read the PDF version (e.g. "1.7") from the file header at `path`.
pub fn sniff_version<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut head = Vec::with_capacity(HEADER_WINDOW);
    File::open(path)?
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut head)?;
    sniff_version_bytes(&head)
}

/// Read the PDF version from the leading bytes of a document.
pub fn sniff_version_bytes(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let start = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let version = window
        .get(start + PDF_MAGIC.len()..start + PDF_MAGIC.len() + 3)
        .ok_or(Error::UnknownFormat)?;

    match version {
        [major @ b'1'..=b'2', b'.', minor] if minor.is_ascii_digit() => {
            Ok(format!("{}.{}", *major as char, *minor as char))
        }
        _ => Err(Error::UnsupportedVersion(
            String::from_utf8_lossy(version).into_owned(),
        )),
    }
}

/// Check whether `path` looks like a PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    sniff_version(path).is_ok()
}
