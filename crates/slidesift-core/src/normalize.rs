//! Pure frame conversions: every function returns a new buffer (or passes
//! the input through untouched) and never mutates in place.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Longest edge allowed before a frame is downscaled for comparison.
pub const MAX_DIMENSION: u32 = 1024;

/// Downscale so the longest edge is at most `max_dimension`, preserving
/// aspect ratio. Frames already within bounds pass through unchanged.
///
/// Fractional target dimensions truncate toward zero with a floor of one
/// pixel, so extreme aspect ratios stay representable.
pub fn shrink_to_max(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return image;
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
}

/// Convert to single-channel luminance. The color original is untouched;
/// scoring runs on the result, saving on the original.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Resize a luminance image to the given dimensions (bilinear). Lines a
/// stored slide up with a candidate before scoring.
pub fn resize_to_match(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    #[test]
    fn shrink_caps_longest_edge() {
        let shrunk = shrink_to_max(solid(2048, 1024, [10, 20, 30]), 1024);
        assert_eq!(shrunk.dimensions(), (1024, 512));
    }

    #[test]
    fn shrink_is_noop_within_bounds() {
        let shrunk = shrink_to_max(solid(800, 600, [10, 20, 30]), 1024);
        assert_eq!(shrunk.dimensions(), (800, 600));
    }

    #[test]
    fn shrink_truncates_fractional_dimensions() {
        // scale = 1024/5000 = 0.2048, so 10 * 0.2048 = 2.048 -> 2
        let shrunk = shrink_to_max(solid(5000, 10, [0, 0, 0]), 1024);
        assert_eq!(shrunk.dimensions(), (1024, 2));
    }

    #[test]
    fn shrink_floors_at_one_pixel() {
        let shrunk = shrink_to_max(solid(10000, 3, [0, 0, 0]), 1024);
        assert_eq!(shrunk.dimensions(), (1024, 1));
    }

    #[test]
    fn luminance_separates_primaries() {
        let red = to_luma(&solid(4, 4, [255, 0, 0]));
        let blue = to_luma(&solid(4, 4, [0, 0, 255]));
        assert_eq!(red.dimensions(), (4, 4));

        // Exact values depend on the luma weighting; both common standards
        // land in these bands, well apart from each other.
        let r = red.get_pixel(0, 0)[0];
        let b = blue.get_pixel(0, 0)[0];
        assert!((50..=80).contains(&r), "red luma {r}");
        assert!((15..=35).contains(&b), "blue luma {b}");
    }

    #[test]
    fn gray_luminance_is_exact() {
        let gray = to_luma(&solid(4, 4, [90, 90, 90]));
        assert_eq!(gray.get_pixel(0, 0)[0], 90);
    }

    #[test]
    fn resize_handles_degenerate_dimensions() {
        let luma = to_luma(&solid(100, 50, [128, 128, 128]));
        assert_eq!(resize_to_match(&luma, 1, 1).dimensions(), (1, 1));
        assert_eq!(resize_to_match(&luma, 400, 3).dimensions(), (400, 3));
    }
}
