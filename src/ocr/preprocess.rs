//! Raster cleanup before recognition.
//!
//! Recognition quality degrades on rasters that are oversized, low
//! contrast or soft. The pass here is deliberately cheap: bound the
//! dimensions, grayscale, stretch the histogram when it is compressed,
//! and run one unsharp pass.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

/// Below this, the short edge is upscaled before recognition.
const MIN_DIMENSION: u32 = 300;
/// Upscale target for the short edge of small inputs.
const UPSCALE_TARGET: u32 = 600;
/// Histogram ranges at least this wide are left alone.
const CONTRAST_RANGE_OK: u32 = 200;

/// Unsharp mask, edge-enhancing.
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Prepare an image for recognition: resize within bounds, grayscale,
/// normalize contrast, sharpen.
pub fn optimize_for_ocr(image: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let resized = resize_within_bounds(image, max_dimension);
    let gray = resized.to_luma8();
    let normalized = stretch_contrast(gray);
    let sharpened = imageops::filter3x3(&normalized, &SHARPEN_KERNEL);
    DynamicImage::ImageLuma8(sharpened)
}

/// Downscale large images for memory and speed; upscale tiny ones (small
/// region crops especially) so glyphs have enough pixels to recognize.
fn resize_within_bounds(image: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return image.clone();
    }
    let largest = width.max(height);
    let smallest = width.min(height);

    if largest > max_dimension {
        let scale = max_dimension as f64 / largest as f64;
        image.resize(
            (width as f64 * scale).round() as u32,
            (height as f64 * scale).round() as u32,
            FilterType::Lanczos3,
        )
    } else if smallest < MIN_DIMENSION {
        let scale = UPSCALE_TARGET as f64 / smallest as f64;
        // resize fits within the box, so clamping the targets keeps the
        // upscale from blowing past the dimension cap
        image.resize(
            ((width as f64 * scale).round() as u32).min(max_dimension),
            ((height as f64 * scale).round() as u32).min(max_dimension),
            FilterType::Lanczos3,
        )
    } else {
        image.clone()
    }
}

/// Linear histogram stretch for low-contrast rasters.
fn stretch_contrast(gray: GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for pixel in gray.pixels() {
        min = min.min(pixel.0[0]);
        max = max.max(pixel.0[0]);
    }
    let range = max.saturating_sub(min) as u32;
    if range == 0 || range >= CONTRAST_RANGE_OK {
        return gray;
    }

    let mut stretched = gray;
    for pixel in stretched.pixels_mut() {
        let value = (pixel.0[0] - min) as u32;
        pixel.0[0] = (value * 255 / range) as u8;
    }
    stretched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_raster_downscaled_to_cap() {
        let image = DynamicImage::new_luma8(3000, 1500);
        let out = optimize_for_ocr(&image, 2048);
        assert!(out.width() <= 2048 && out.height() <= 2048);
        assert_eq!(out.width(), 2048);
    }

    #[test]
    fn test_small_crop_upscaled() {
        let image = DynamicImage::new_luma8(120, 60);
        let out = optimize_for_ocr(&image, 2048);
        assert!(out.height() >= 300, "short edge still {}", out.height());
    }

    #[test]
    fn test_upscale_respects_dimension_cap() {
        let image = DynamicImage::new_luma8(2000, 16);
        let out = optimize_for_ocr(&image, 2048);
        assert!(out.width() <= 2048);
    }

    #[test]
    fn test_contrast_stretch_expands_compressed_histogram() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, image::Luma([100]));
        gray.put_pixel(1, 0, image::Luma([150]));
        let out = stretch_contrast(gray);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_full_range_histogram_untouched() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, image::Luma([0]));
        gray.put_pixel(1, 0, image::Luma([255]));
        let out = stretch_contrast(gray.clone());
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn test_output_is_grayscale() {
        let image = DynamicImage::new_rgb8(400, 400);
        let out = optimize_for_ocr(&image, 2048);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }
}
