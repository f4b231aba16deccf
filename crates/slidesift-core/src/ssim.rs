//! Mean structural similarity (SSIM) between two luminance images.
//!
//! Local means, variances and covariance over 7x7 uniform windows with the
//! standard stabilization constants for 8-bit data. Scores land in
//! [-1.0, 1.0]; identical images score exactly 1.0, and zero-variance
//! (flat) images are handled by the constants without any division by zero.

use image::GrayImage;

/// Side length of the square comparison window.
const WINDOW: u32 = 7;
/// Luminance stabilizer, (0.01 * 255)^2.
const C1: f64 = 6.5025;
/// Contrast stabilizer, (0.03 * 255)^2.
const C2: f64 = 58.5225;

/// Mean SSIM over every window position that fully fits inside the images.
///
/// Stateless and safe to call from multiple threads. Both images must have
/// the same non-zero dimensions; callers resize beforehand.
pub fn score(a: &GrayImage, b: &GrayImage) -> f64 {
    assert_eq!(
        a.dimensions(),
        b.dimensions(),
        "ssim requires equal dimensions"
    );
    let (width, height) = a.dimensions();
    assert!(width > 0 && height > 0, "ssim requires non-empty images");

    let win = window_size(width, height) as usize;
    let tables = IntegralTables::build(a, b);

    let np = (win * win) as f64;
    // Sample (n-1) normalization; a one-pixel window has zero variance.
    let norm = if win > 1 { np / (np - 1.0) } else { 0.0 };

    let width = width as usize;
    let height = height as usize;
    let mut total = 0.0;
    let mut positions = 0u64;

    for y in 0..=(height - win) {
        for x in 0..=(width - win) {
            let sums = tables.window(x, y, win);
            let mean_a = sums.a as f64 / np;
            let mean_b = sums.b as f64 / np;
            let var_a = norm * (sums.aa as f64 / np - mean_a * mean_a);
            let var_b = norm * (sums.bb as f64 / np - mean_b * mean_b);
            let covar = norm * (sums.ab as f64 / np - mean_a * mean_b);

            let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * covar + C2);
            let denominator =
                (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
            total += numerator / denominator;
            positions += 1;
        }
    }

    total / positions as f64
}

/// Shrink the window for images smaller than the default, keeping it odd.
fn window_size(width: u32, height: u32) -> u32 {
    let win = WINDOW.min(width).min(height);
    if win % 2 == 0 {
        win - 1
    } else {
        win
    }
}

struct WindowSums {
    a: u64,
    b: u64,
    aa: u64,
    bb: u64,
    ab: u64,
}

/// Summed-area tables for both images, their squares, and their product,
/// with one row/column of zero padding so window lookups need no branches.
/// Exact in u64: the largest entry is 255^2 per pixel over a 1024-pixel
/// edge, far below overflow.
struct IntegralTables {
    a: Vec<u64>,
    b: Vec<u64>,
    aa: Vec<u64>,
    bb: Vec<u64>,
    ab: Vec<u64>,
    stride: usize,
}

impl IntegralTables {
    fn build(a: &GrayImage, b: &GrayImage) -> Self {
        let (width, height) = a.dimensions();
        let width = width as usize;
        let height = height as usize;
        let stride = width + 1;
        let len = stride * (height + 1);

        let mut tables = Self {
            a: vec![0; len],
            b: vec![0; len],
            aa: vec![0; len],
            bb: vec![0; len],
            ab: vec![0; len],
            stride,
        };

        let pixels_a = a.as_raw();
        let pixels_b = b.as_raw();

        for y in 0..height {
            let row = (y + 1) * stride;
            let above = y * stride;
            for x in 0..width {
                let va = pixels_a[y * width + x] as u64;
                let vb = pixels_b[y * width + x] as u64;
                let i = row + x + 1;
                let carry = |t: &[u64]| t[row + x] + t[above + x + 1] - t[above + x];
                tables.a[i] = va + carry(&tables.a);
                tables.b[i] = vb + carry(&tables.b);
                tables.aa[i] = va * va + carry(&tables.aa);
                tables.bb[i] = vb * vb + carry(&tables.bb);
                tables.ab[i] = va * vb + carry(&tables.ab);
            }
        }

        tables
    }

    fn window(&self, x: usize, y: usize, win: usize) -> WindowSums {
        let top = y * self.stride;
        let bottom = (y + win) * self.stride;
        let left = x;
        let right = x + win;
        // Additions first keeps the intermediate non-negative.
        let sum =
            |t: &[u64]| t[bottom + right] + t[top + left] - t[top + right] - t[bottom + left];
        WindowSums {
            a: sum(&self.a),
            b: sum(&self.b),
            aa: sum(&self.aa),
            bb: sum(&self.bb),
            ab: sum(&self.ab),
        }
    }
}
