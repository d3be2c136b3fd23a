//! Image-level types.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page space.
///
/// Coordinates are in points (1/72 inch) with the origin at the top-left
/// corner of the page: `top < bottom` for a non-empty box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (x0)
    pub left: f32,
    /// Top edge, measured from the top of the page
    pub top: f32,
    /// Right edge (x1)
    pub right: f32,
    /// Bottom edge, measured from the top of the page
    pub bottom: f32,
}

impl BoundingBox {
    /// Create a bounding box from its four edges.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest box containing all the given points.
    ///
    /// Returns `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox.left = bbox.left.min(x);
            bbox.right = bbox.right.max(x);
            bbox.top = bbox.top.min(y);
            bbox.bottom = bbox.bottom.max(y);
        }
        Some(bbox)
    }

    /// Width in points.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height in points.
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Check if the box has no area.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Check if two boxes overlap with a non-zero area.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

/// An image rasterized from a page and persisted to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Zero-based index within its page, in encounter order
    pub index: usize,

    /// Path the PNG was written to
    pub path: String,

    /// Region of the page that was rasterized
    #[serde(skip_serializing, default)]
    pub bbox: BoundingBox,
}

impl ExtractedImage {
    /// Create an image descriptor.
    pub fn new(index: usize, path: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            index,
            path: path.into(),
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(bbox.width(), 100.0);
        assert_eq!(bbox.height(), 50.0);
        assert!(!bbox.is_empty());
        assert!(BoundingBox::new(5.0, 5.0, 5.0, 10.0).is_empty());
    }

    #[test]
    fn test_bbox_enclosing() {
        let bbox = BoundingBox::enclosing([(3.0, 9.0), (1.0, 4.0), (7.0, 2.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(1.0, 2.0, 7.0, 9.0));
        assert!(BoundingBox::enclosing(Vec::<(f32, f32)>::new()).is_none());
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&BoundingBox::new(5.0, 5.0, 15.0, 15.0)));
        // Touching edges do not overlap
        assert!(!a.intersects(&BoundingBox::new(10.0, 0.0, 20.0, 10.0)));
        assert!(!a.intersects(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn test_image_json_shape() {
        let image = ExtractedImage::new(
            0,
            "images/extracted_image_page_2_img_0.png",
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
        );
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 0,
                "path": "images/extracted_image_page_2_img_0.png"
            })
        );
    }
}
