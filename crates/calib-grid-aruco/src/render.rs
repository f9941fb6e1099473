//! Marker rasterization: printable images and synthetic scenes.

use crate::DetectorError;
use calib_grid_core::{filled_gray, homography_from_4pt, GrayImage};
use calib_targets_aruco::Dictionary;
use nalgebra::Point2;

/// Border width (cells) of rendered markers.
pub const RENDER_BORDER_BITS: usize = 1;

/// Sub-samples per pixel axis when warping a marker into a scene.
const SUPERSAMPLE: usize = 4;

fn marker_code(dict: &Dictionary, id: u32) -> Result<u64, DetectorError> {
    dict.codes
        .get(id as usize)
        .copied()
        .ok_or(DetectorError::MarkerIdOutOfRange {
            id,
            count: dict.codes.len(),
        })
}

#[inline]
fn cell_is_black(code: u64, bits: usize, cx: usize, cy: usize) -> bool {
    let border = RENDER_BORDER_BITS;
    let cells = bits + 2 * border;
    if cx < border || cy < border || cx + border >= cells || cy + border >= cells {
        return true;
    }
    let idx = (cy - border) * bits + (cx - border);
    (code >> idx) & 1 == 1
}

/// Render marker `id` upright with a white quiet zone.
///
/// The result is `(marker_size + 2 + 2 * quiet_zone_cells) * cell_px`
/// pixels square; black is 0, white is 255.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: usize,
    quiet_zone_cells: usize,
) -> Result<GrayImage, DetectorError> {
    if cell_px == 0 {
        return Err(DetectorError::ZeroCellSize);
    }
    let code = marker_code(dict, id)?;
    let bits = dict.marker_size;
    let cells = bits + 2 * RENDER_BORDER_BITS;
    let total = cells + 2 * quiet_zone_cells;
    let side = total * cell_px;

    let mut img = filled_gray(side, side, 255);
    for cy in 0..cells {
        for cx in 0..cells {
            if !cell_is_black(code, bits, cx, cy) {
                continue;
            }
            let x0 = (cx + quiet_zone_cells) * cell_px;
            let y0 = (cy + quiet_zone_cells) * cell_px;
            for y in y0..y0 + cell_px {
                img.data[y * side + x0..y * side + x0 + cell_px].fill(0);
            }
        }
    }
    Ok(img)
}

/// Warp marker `id` onto `canvas` so its outer border corners land on
/// `corners` (canonical top-left first, pixel-edge coordinates).
///
/// Edge pixels are anti-aliased by supersampling.
pub fn draw_marker(
    canvas: &mut GrayImage,
    dict: &Dictionary,
    id: u32,
    corners: &[Point2<f32>; 4],
) -> Result<(), DetectorError> {
    let code = marker_code(dict, id)?;
    let bits = dict.marker_size;
    let cells = bits + 2 * RENDER_BORDER_BITS;
    let s = cells as f32;
    let canonical = [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ];
    let to_cells = homography_from_4pt(corners, &canonical).ok_or(DetectorError::DegenerateQuad)?;

    if canvas.width == 0 || canvas.height == 0 {
        return Ok(());
    }
    let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let x0 = min_x.floor().max(0.0) as usize;
    let y0 = min_y.floor().max(0.0) as usize;
    let x1 = (max_x.ceil().max(0.0) as usize).min(canvas.width - 1);
    let y1 = (max_y.ceil().max(0.0) as usize).min(canvas.height - 1);

    let step = 1.0 / SUPERSAMPLE as f32;
    let n = (SUPERSAMPLE * SUPERSAMPLE) as f32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let idx = y * canvas.width + x;
            let background = canvas.data[idx] as f32;
            let mut sum = 0.0f32;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let p = Point2::new(
                        x as f32 - 0.5 + (sx as f32 + 0.5) * step,
                        y as f32 - 0.5 + (sy as f32 + 0.5) * step,
                    );
                    let c = to_cells.apply(p);
                    sum += if c.x >= 0.0 && c.y >= 0.0 && c.x < s && c.y < s {
                        if cell_is_black(code, bits, c.x as usize, c.y as usize) {
                            0.0
                        } else {
                            255.0
                        }
                    } else {
                        background
                    };
                }
            }
            canvas.data[idx] = (sum / n).round() as u8;
        }
    }
    Ok(())
}
