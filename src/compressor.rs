//! Percentage-based image downscaling.
//!
//! Scales width and height independently by `percentage / 100` using a
//! Lanczos3 kernel. Stateless and safe to share across tasks.

use image::imageops::FilterType;
use image::DynamicImage;

/// Stateless resizer used by the worker's fan-out tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    /// Create a new compressor.
    pub fn new() -> Self {
        Self
    }

    /// Scale `img` to `percentage` of its original linear dimensions.
    ///
    /// `percentage` must be in `(0, 100]`. The caller must not feed a
    /// zero-size source image; target dimensions are clamped to at least
    /// one pixel so rounding can never produce an empty image.
    pub fn scale(&self, img: &DynamicImage, percentage: u32) -> DynamicImage {
        debug_assert!(percentage > 0 && percentage <= 100);
        let (width, height) = scaled_dimensions(img.width(), img.height(), percentage);
        img.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Compute the rounded target dimensions for a given percentage.
pub fn scaled_dimensions(width: u32, height: u32, percentage: u32) -> (u32, u32) {
    let coefficient = percentage as f64 / 100.0;
    let scaled_w = (width as f64 * coefficient).round() as u32;
    let scaled_h = (height as f64 * coefficient).round() as u32;
    (scaled_w.max(1), scaled_h.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_half() {
        assert_eq!(scaled_dimensions(400, 300, 50), (200, 150));
    }

    #[test]
    fn dimensions_three_quarters() {
        assert_eq!(scaled_dimensions(400, 300, 75), (300, 225));
    }

    #[test]
    fn dimensions_quarter_rounds() {
        // 25% of 301 is 75.25, rounds down to 75.
        assert_eq!(scaled_dimensions(301, 103, 25), (75, 26));
    }

    #[test]
    fn dimensions_never_zero() {
        assert_eq!(scaled_dimensions(1, 1, 25), (1, 1));
        assert_eq!(scaled_dimensions(2, 3, 25), (1, 1));
    }

    #[test]
    fn dimensions_full_is_identity() {
        assert_eq!(scaled_dimensions(1920, 1080, 100), (1920, 1080));
    }

    #[test]
    fn scale_resizes_image() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            40,
            30,
            image::Rgb([10, 20, 30]),
        ));
        let scaled = Compressor::new().scale(&img, 50);
        assert_eq!((scaled.width(), scaled.height()), (20, 15));
    }
}
