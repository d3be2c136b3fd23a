//! PDF backend abstraction layer.
//!
//! The extraction pipeline only needs four capabilities from a PDF library:
//! page count, per-page text, per-page image placements, and rasterization
//! of an arbitrary page region. [`PdfBackend`] captures exactly that, so the
//! pipeline never touches concrete PDF library types. [`LopdfBackend`] is the
//! production implementation.
//!
//! Workers never share a backend. Each page task asks the
//! [`BackendLoader`] for its own handle, which is why the loader is the only
//! piece that has to be `Send + Sync`.

mod lopdf_backend;
pub mod raster;

use std::path::Path;

use image::RgbImage;

use crate::error::Result;
use crate::model::{BoundingBox, DocumentInfo};

pub use lopdf_backend::{LopdfBackend, LopdfLoader};

/// An image drawn on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    /// Resource name the image was drawn with (e.g. "Im0")
    pub name: String,

    /// Where the image lands on the page
    pub bbox: BoundingBox,
}

impl ImagePlacement {
    /// Create a placement.
    pub fn new(name: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            name: name.into(),
            bbox,
        }
    }
}

/// Read-only access to one open PDF document.
///
/// Page indices are zero-based and must be below [`page_count`].
///
/// [`page_count`]: PdfBackend::page_count
pub trait PdfBackend {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Raw text of a page. Empty when the page has no text layer.
    fn page_text(&self, index: usize) -> Result<String>;

    /// Images drawn on a page, in content-stream order.
    fn page_images(&self, index: usize) -> Result<Vec<ImagePlacement>>;

    /// Rasterize a region of a page at `resolution` dots per inch.
    fn render_region(&self, index: usize, region: &BoundingBox, resolution: u32)
        -> Result<RgbImage>;

    /// Document information dictionary.
    fn info(&self) -> DocumentInfo {
        DocumentInfo::default()
    }
}

/// Opens documents for the pipeline.
pub trait BackendLoader: Send + Sync {
    /// Open the document at `path`.
    fn load(&self, path: &Path) -> Result<Box<dyn PdfBackend>>;
}

/// 2D affine transform in PDF row-vector convention: `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Create a matrix from its six components.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self × other`: apply `self` first, then `other`.
    ///
    /// A `cm` operator with matrix `m` updates the CTM to `m.concat(&ctm)`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Map a point through the transform.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Corners of the unit square after transformation, the footprint of
    /// an image drawn under this matrix.
    pub fn unit_square(&self) -> [(f32, f32); 4] {
        [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
