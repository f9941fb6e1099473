//! Whole-image binarization for candidate extraction.

use calib_grid_core::GrayImageView;

/// Otsu threshold over an intensity histogram of `total` pixels.
///
/// Values strictly below the returned threshold are classified dark.
fn otsu_threshold_from_histogram(hist: &[u32; 256], total: f64) -> u8 {
    let min_v = hist.iter().position(|&h| h > 0).unwrap_or(0);
    let max_v = hist.iter().rposition(|&h| h > 0).unwrap_or(255);
    if min_v == max_v {
        return min_v as u8;
    }

    let nonzero_bins = hist.iter().filter(|&&h| h > 0).count();
    if nonzero_bins <= 2 {
        return ((min_v + max_v + 1) / 2) as u8;
    }

    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += (t as f64) * (h as f64);
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    // `best_t` is the last value of the dark class.
    best_t.saturating_add(1)
}

/// Dark-pixel mask using one Otsu threshold for the whole raster.
pub(crate) fn binarize_global(img: &GrayImageView<'_>) -> Vec<bool> {
    let mut hist = [0u32; 256];
    for &v in img.data {
        hist[v as usize] += 1;
    }
    let thr = otsu_threshold_from_histogram(&hist, img.data.len() as f64);
    img.data.iter().map(|&v| v < thr).collect()
}

/// Dark-pixel mask against the local mean over a `(2r+1)²` window.
///
/// A pixel is dark when it is more than `offset` below its local mean.
pub(crate) fn binarize_adaptive(img: &GrayImageView<'_>, radius: usize, offset: f32) -> Vec<bool> {
    let w = img.width;
    let h = img.height;
    let integral = integral_image(img);
    let stride = w + 1;

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f32;
            let mean = sum as f32 / count;
            out.push((img.data[y * w + x] as f32) < mean - offset);
        }
    }
    out
}

// Summed-area table with a zero first row and column.
fn integral_image(img: &GrayImageView<'_>) -> Vec<u64> {
    let w = img.width;
    let stride = w + 1;
    let mut table = vec![0u64; stride * (img.height + 1)];
    for y in 0..img.height {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += img.data[y * w + x] as u64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sum;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use calib_grid_core::{filled_gray, GrayImage};

    fn histogram(samples: &[u8]) -> [u32; 256] {
        let mut hist = [0u32; 256];
        for &v in samples {
            hist[v as usize] += 1;
        }
        hist
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let mut samples = vec![20u8; 50];
        samples.extend(std::iter::repeat(30u8).take(10));
        samples.extend(std::iter::repeat(220u8).take(40));
        samples.extend(std::iter::repeat(230u8).take(20));
        let t = otsu_threshold_from_histogram(&histogram(&samples), samples.len() as f64);
        assert!(t > 30 && t <= 220, "threshold {t}");
    }

    #[test]
    fn two_levels_split_in_the_middle() {
        let t = otsu_threshold_from_histogram(&histogram(&[0, 0, 255, 255]), 4.0);
        assert_eq!(t, 128);
    }

    #[test]
    fn constant_image_has_no_dark_pixels() {
        let img = filled_gray(4, 4, 90);
        assert!(binarize_global(&img.view()).iter().all(|&d| !d));
    }

    #[test]
    fn global_mask_marks_dark_square() {
        let mut img = filled_gray(10, 10, 250);
        for y in 2..5 {
            for x in 3..7 {
                img.data[y * 10 + x] = 10;
            }
        }
        let mask = binarize_global(&img.view());
        assert_eq!(mask.iter().filter(|&&d| d).count(), 12);
        assert!(mask[2 * 10 + 3]);
        assert!(!mask[0]);
    }

    #[test]
    fn adaptive_mask_ignores_smooth_gradient() {
        let mut img = filled_gray(32, 8, 0);
        for y in 0..8 {
            for x in 0..32 {
                img.data[y * 32 + x] = (40 + x * 6) as u8;
            }
        }
        // Dark notch on top of the gradient.
        img.data[4 * 32 + 20] = 20;
        let mask = binarize_adaptive(&img.view(), 3, 10.0);
        assert_eq!(mask.iter().filter(|&&d| d).count(), 1);
        assert!(mask[4 * 32 + 20]);
    }

    #[test]
    fn integral_image_sums_rectangles() {
        let img = GrayImage {
            width: 3,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let t = integral_image(&img.view());
        assert_eq!(t[2 * 4 + 3], 21);
        assert_eq!(t[4 + 2], 3);
    }
}
