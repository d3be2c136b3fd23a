//! Single-page extraction.
//!
//! [`extract_page`] turns one page of an open document into a
//! [`PageResult`]: normalized text plus every embedded image rasterized to a
//! PNG file. It never fails. Any error raised while processing the page,
//! including one from a single image, is caught here and recorded on the
//! page so the rest of the document can still complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::ImageFormat;

use crate::backend::PdfBackend;
use crate::error::{Error, Result};
use crate::model::{ExtractedImage, PageResult};
use crate::normalize::normalize;
use crate::options::ExtractOptions;

/// Output path for an extracted image.
///
/// Unique per `(page_num, image_index)`, so concurrent pages never write to
/// the same file.
pub fn image_path(dir: &Path, page_num: usize, image_index: usize) -> PathBuf {
    dir.join(format!(
        "extracted_image_page_{}_img_{}.png",
        page_num, image_index
    ))
}

/// Extract the page at zero-based `index`.
pub fn extract_page(
    backend: &dyn PdfBackend,
    index: usize,
    options: &ExtractOptions,
) -> PageResult {
    let page_num = index + 1;
    let start = Instant::now();

    match try_extract_page(backend, index, options) {
        Ok(page) => {
            log::info!("Processed page {} successfully.", page_num);
            log::info!(
                "Page {} processed in {:.2} seconds.",
                page_num,
                start.elapsed().as_secs_f64()
            );
            page
        }
        Err(e) => {
            log::error!("Error processing page {}: {}", page_num, e);
            PageResult::failed(page_num, e.to_string())
        }
    }
}

fn try_extract_page(
    backend: &dyn PdfBackend,
    index: usize,
    options: &ExtractOptions,
) -> Result<PageResult> {
    let page_num = index + 1;
    let raw_text = backend.page_text(index)?;
    let text = normalize(Some(&raw_text));

    let placements = backend.page_images(index)?;
    let rasters = placements
        .iter()
        .map(|placement| backend.render_region(index, &placement.bbox, options.resolution))
        .collect::<Result<Vec<_>>>()?;

    let mut images = Vec::with_capacity(placements.len());
    for (image_index, (placement, raster)) in placements.iter().zip(rasters).enumerate() {
        let path = image_path(&options.image_dir, page_num, image_index);
        // create_dir_all tolerates the directory already existing, including
        // when another worker creates it concurrently.
        let saved = fs::create_dir_all(&options.image_dir)
            .map_err(Error::from)
            .and_then(|()| {
                raster
                    .save_with_format(&path, ImageFormat::Png)
                    .map_err(Error::from)
            });
        if let Err(e) = saved {
            remove_images(&images);
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        log::debug!(
            "Page {} image {} ({}) saved to {}",
            page_num,
            image_index,
            placement.name,
            path.display()
        );
        images.push(ExtractedImage::new(
            image_index,
            path.to_string_lossy(),
            placement.bbox,
        ));
    }

    Ok(PageResult::new(page_num, text, images))
}

/// Delete image files written for a page whose result is being dropped.
pub(crate) fn remove_images(images: &[ExtractedImage]) {
    for image in images {
        if let Err(e) = fs::remove_file(&image.path) {
            log::warn!("Could not remove {}: {}", image.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ImagePlacement;
    use crate::model::BoundingBox;
    use image::{Rgb, RgbImage};

    struct OnePage {
        text: &'static str,
        images: Vec<BoundingBox>,
        fail_render: Option<usize>,
    }

    impl PdfBackend for OnePage {
        fn page_count(&self) -> usize {
            1
        }

        fn page_text(&self, index: usize) -> Result<String> {
            if index >= 1 {
                return Err(Error::PageOutOfRange(index, 1));
            }
            Ok(self.text.to_string())
        }

        fn page_images(&self, _index: usize) -> Result<Vec<ImagePlacement>> {
            Ok(self
                .images
                .iter()
                .enumerate()
                .map(|(i, bbox)| ImagePlacement::new(format!("Im{}", i), *bbox))
                .collect())
        }

        fn render_region(
            &self,
            _index: usize,
            region: &BoundingBox,
            resolution: u32,
        ) -> Result<RgbImage> {
            let position = self.images.iter().position(|b| b == region);
            if position.is_some() && position == self.fail_render {
                return Err(Error::Rasterize("render failed".into()));
            }
            let (w, h) = crate::backend::raster::canvas_size(region, resolution)?;
            Ok(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])))
        }
    }

    #[test]
    fn test_image_path_format() {
        let path = image_path(Path::new("images"), 2, 0);
        assert_eq!(
            path,
            PathBuf::from("images").join("extracted_image_page_2_img_0.png")
        );
    }

    #[test]
    fn test_extract_text_only_page() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractOptions::new().with_image_dir(dir.path().join("images"));
        let backend = OnePage {
            text: "Résumé",
            images: Vec::new(),
            fail_render: None,
        };

        let page = extract_page(&backend, 0, &options);
        assert!(page.is_ok());
        assert_eq!(page.page_num, 1);
        assert_eq!(page.text.as_deref(), Some("Resume"));
        assert!(page.images.is_empty());
        // No images, no directory
        assert!(!dir.path().join("images").exists());
    }

    #[test]
    fn test_extract_writes_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("nested").join("images");
        let options = ExtractOptions::new()
            .with_image_dir(&image_dir)
            .with_resolution(72);
        let backend = OnePage {
            text: "",
            images: vec![
                BoundingBox::new(0.0, 0.0, 10.0, 20.0),
                BoundingBox::new(50.0, 50.0, 60.0, 55.0),
            ],
            fail_render: None,
        };

        let page = extract_page(&backend, 0, &options);
        assert!(page.is_ok(), "{:?}", page.error);
        assert_eq!(page.text.as_deref(), Some(""));
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[1].index, 1);
        assert!(page.images[1]
            .path
            .ends_with("extracted_image_page_1_img_1.png"));

        let first = image::open(&page.images[0].path).unwrap();
        assert_eq!((first.width(), first.height()), (10, 20));
    }

    #[test]
    fn test_image_failure_fails_page() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractOptions::new().with_image_dir(dir.path());
        let backend = OnePage {
            text: "has text",
            images: vec![BoundingBox::new(0.0, 0.0, 10.0, 10.0)],
            fail_render: Some(0),
        };

        let page = extract_page(&backend, 0, &options);
        assert!(!page.is_ok());
        assert!(page.text.is_none());
        assert!(page.images.is_empty());
        assert!(page.error.unwrap().contains("render failed"));
    }

    #[test]
    fn test_late_image_failure_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractOptions::new()
            .with_image_dir(dir.path())
            .with_resolution(72);
        let backend = OnePage {
            text: "two figures",
            images: vec![
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(20.0, 0.0, 30.0, 10.0),
            ],
            fail_render: Some(1),
        };

        let page = extract_page(&backend, 0, &options);
        assert!(!page.is_ok());
        assert!(page.images.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extracted_image_page_1_img_0.png");
        fs::write(&path, b"png").unwrap();
        let images = vec![ExtractedImage::new(
            0,
            path.to_string_lossy(),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        )];

        remove_images(&images);
        assert!(!path.exists());
    }

    #[test]
    fn test_out_of_range_is_page_error() {
        let options = ExtractOptions::new();
        let backend = OnePage {
            text: "x",
            images: Vec::new(),
            fail_render: None,
        };

        let page = extract_page(&backend, 5, &options);
        assert_eq!(page.page_num, 6);
        assert!(page.error.is_some());
    }
}
