//! Record types produced by the extraction pipeline.
//!
//! These types are what ends up serialized in the output JSON: a
//! [`DocumentRecord`] holding one [`PageResult`] per page, each with the
//! [`ExtractedImage`]s written for that page.

mod document;
mod image;
mod page;

pub use document::{DocumentInfo, DocumentRecord};
pub use image::{BoundingBox, ExtractedImage};
pub use page::PageResult;
