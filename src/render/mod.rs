//! Output rendering for document records.

mod json;

pub use json::{save_json, to_json, JsonFormat};
