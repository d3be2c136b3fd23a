//! Region rasterization and image sample decoding.
//!
//! A page region is rasterized onto a white RGB canvas sized from the region
//! and the requested resolution. Every image drawn on the page that overlaps
//! the region is painted into it with nearest-neighbour sampling, clipped to
//! the canvas.

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::model::BoundingBox;

/// PDF user space unit: 72 points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Upper bound on canvas size, in pixels.
pub const MAX_RASTER_PIXELS: u64 = 100_000_000;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Pixel dimensions of `region` rasterized at `resolution` DPI.
///
/// Each side is at least one pixel.
pub fn canvas_size(region: &BoundingBox, resolution: u32) -> Result<(u32, u32)> {
    if resolution == 0 {
        return Err(Error::InvalidResolution(resolution));
    }
    if !region.width().is_finite() || !region.height().is_finite() {
        return Err(Error::Rasterize(format!(
            "region {:?} has non-finite extent",
            region
        )));
    }

    let scale = resolution as f32 / POINTS_PER_INCH;
    let width = (region.width().max(0.0) * scale).ceil().max(1.0);
    let height = (region.height().max(0.0) * scale).ceil().max(1.0);

    if width as u64 * height as u64 > MAX_RASTER_PIXELS {
        return Err(Error::Rasterize(format!(
            "region of {:.0}x{:.0} px at {} dpi exceeds the {} pixel limit",
            width, height, resolution, MAX_RASTER_PIXELS
        )));
    }

    Ok((width as u32, height as u32))
}

/// White canvas covering `region` at `resolution` DPI.
pub fn blank_canvas(region: &BoundingBox, resolution: u32) -> Result<RgbImage> {
    let (width, height) = canvas_size(region, resolution)?;
    Ok(RgbImage::from_pixel(width, height, WHITE))
}

/// Orientation of an image relative to its footprint on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flip {
    /// Image columns run right to left
    pub horizontal: bool,
    /// Image rows run bottom to top
    pub vertical: bool,
}

/// Paint `src`, drawn at `target` on the page, into a canvas covering
/// `region`.
pub fn paint(
    canvas: &mut RgbImage,
    region: &BoundingBox,
    resolution: u32,
    target: &BoundingBox,
    flip: Flip,
    src: &RgbImage,
) {
    if target.is_empty() || src.width() == 0 || src.height() == 0 {
        return;
    }

    let scale = resolution as f32 / POINTS_PER_INCH;
    let dest_left = (target.left - region.left) * scale;
    let dest_top = (target.top - region.top) * scale;
    let dest_width = target.width() * scale;
    let dest_height = target.height() * scale;

    let x_start = dest_left.floor().max(0.0) as u32;
    let y_start = dest_top.floor().max(0.0) as u32;
    let x_end = ((dest_left + dest_width).ceil().max(0.0) as u32).min(canvas.width());
    let y_end = ((dest_top + dest_height).ceil().max(0.0) as u32).min(canvas.height());

    for py in y_start..y_end {
        let v = (py as f32 + 0.5 - dest_top) / dest_height;
        if !(0.0..1.0).contains(&v) {
            continue;
        }
        let mut sy = ((v * src.height() as f32) as u32).min(src.height() - 1);
        if flip.vertical {
            sy = src.height() - 1 - sy;
        }

        for px in x_start..x_end {
            let u = (px as f32 + 0.5 - dest_left) / dest_width;
            if !(0.0..1.0).contains(&u) {
                continue;
            }
            let mut sx = ((u * src.width() as f32) as u32).min(src.width() - 1);
            if flip.horizontal {
                sx = src.width() - 1 - sx;
            }
            canvas.put_pixel(px, py, *src.get_pixel(sx, sy));
        }
    }
}

/// Color space of raw image samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    /// One gray component
    Gray,
    /// Red, green, blue
    Rgb,
    /// Cyan, magenta, yellow, black
    Cmyk,
    /// Palette lookup into a base color space
    Indexed {
        /// Color space of the palette entries
        base: Box<ColorSpace>,
        /// Packed palette entries
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Color space with `n` components (`ICCBased` streams declare `/N`).
    pub fn from_components(n: usize) -> Option<Self> {
        match n {
            1 => Some(ColorSpace::Gray),
            3 => Some(ColorSpace::Rgb),
            4 => Some(ColorSpace::Cmyk),
            _ => None,
        }
    }

    /// Number of components per sample.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
            ColorSpace::Indexed { .. } => 1,
        }
    }

    fn to_rgb(&self, sample: &[u8]) -> Rgb<u8> {
        match self {
            ColorSpace::Gray => Rgb([sample[0], sample[0], sample[0]]),
            ColorSpace::Rgb => Rgb([sample[0], sample[1], sample[2]]),
            ColorSpace::Cmyk => cmyk_to_rgb(sample[0], sample[1], sample[2], sample[3]),
            ColorSpace::Indexed { base, lookup } => {
                let n = base.components();
                let start = sample[0] as usize * n;
                match lookup.get(start..start + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => Rgb([0, 0, 0]),
                }
            }
        }
    }
}

/// Decode raw (already unfiltered) image samples into an RGB image.
///
/// Supports 8 bits per component in any [`ColorSpace`], and 1 bit per
/// component for gray images.
pub fn decode_samples(
    width: u32,
    height: u32,
    bits_per_component: u8,
    color_space: &ColorSpace,
    data: &[u8],
) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(Error::ImageExtract(format!(
            "invalid image dimensions {}x{}",
            width, height
        )));
    }

    match (bits_per_component, color_space) {
        (8, _) => {
            let n = color_space.components();
            let expected = width as usize * height as usize * n;
            if data.len() < expected {
                return Err(Error::ImageExtract(format!(
                    "truncated image data: expected {} bytes, found {}",
                    expected,
                    data.len()
                )));
            }
            let mut img = RgbImage::new(width, height);
            for (pixel, sample) in img.pixels_mut().zip(data.chunks_exact(n)) {
                *pixel = color_space.to_rgb(sample);
            }
            Ok(img)
        }
        (1, ColorSpace::Gray) => decode_bilevel(width, height, data),
        (bits, cs) => Err(Error::ImageExtract(format!(
            "unsupported image format: {} bits per component in {:?}",
            bits, cs
        ))),
    }
}

/// Decode 1-bit rows padded to byte boundaries: 0 is black, 1 is white.
///
/// Stencil masks (`/ImageMask true`) read the same way with the default
/// decode array, a 0 bit marking painted area.
pub fn decode_bilevel(width: u32, height: u32, data: &[u8]) -> Result<RgbImage> {
    let row_bytes = (width as usize).div_ceil(8);
    let expected = row_bytes * height as usize;
    if data.len() < expected {
        return Err(Error::ImageExtract(format!(
            "truncated 1-bit image data: expected {} bytes, found {}",
            expected,
            data.len()
        )));
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * row_bytes + x as usize / 8];
        if byte & (0x80 >> (x % 8)) == 0 {
            Rgb([0, 0, 0])
        } else {
            WHITE
        }
    }))
}

/// Decode a baseline or progressive JPEG (`DCTDecode`) stream.
pub fn decode_jpeg(data: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    Ok(img.to_rgb8())
}

/// Naive CMYK to RGB conversion.
fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> Rgb<u8> {
    let k = 255 - k as u16;
    let channel = |v: u8| ((255 - v as u16) * k / 255) as u8;
    Rgb([channel(c), channel(m), channel(y)])
}
