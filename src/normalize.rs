//! Text normalization for extracted page text.
//!
//! Raw page text is mapped to an ASCII-safe canonical form: the text is put
//! through Unicode compatibility decomposition (NFKD) and every character
//! outside the 7-bit ASCII range is dropped. Accented letters keep their
//! base letter, ligatures expand to their components, and anything without
//! an ASCII decomposition disappears.

use unicode_normalization::UnicodeNormalization;

/// Normalize optional page text.
///
/// `None` and the empty string pass through unchanged.
///
/// # Example
///
/// ```
/// use pdfharvest::normalize::normalize;
///
/// assert_eq!(normalize(Some("Café")), Some("Cafe".to_string()));
/// assert_eq!(normalize(None), None);
/// ```
pub fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_str)
}

/// Normalize a text slice to its ASCII-safe form.
pub fn normalize_str(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    raw.nfkd().filter(char::is_ascii).collect()
}
