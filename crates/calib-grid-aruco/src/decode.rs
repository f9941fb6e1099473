//! Dictionary decoding of fitted quads.

use calib_grid_core::{quad_signed_area, GrayImageView, Marker};
use calib_targets_aruco::{decode_marker_in_cell, MarkerCell, Matcher, ScanDecodeConfig};
use calib_targets_core::GridCoords;
use nalgebra::{Point2, Vector2};

/// Side of the rectified square the decoder samples in.
///
/// Sampling happens in image space through the cell homography, so this
/// only has to clear the decoder's minimum side.
const DECODE_SQUARE_PX: f32 = 64.0;

/// Decoder settings for a quad that is exactly the marker's outer border.
pub(crate) fn scan_config(border_bits: usize, min_border_score: f32) -> ScanDecodeConfig {
    ScanDecodeConfig {
        border_bits,
        inset_frac: 0.0,
        marker_size_rel: 1.0,
        min_border_score,
        dedup_by_id: false,
        ..ScanDecodeConfig::default()
    }
}

/// Rotate quad corners so index 0 is the marker's canonical top-left.
///
/// `rotation` follows the matcher convention: the observed code equals
/// the dictionary code rotated `rotation` quarter turns, which puts the
/// canonical top-left at observed corner `rotation`.
pub(crate) fn orient_corners(quad: &[Point2<f32>; 4], rotation: u8) -> [Point2<f32>; 4] {
    let r = (rotation & 3) as usize;
    std::array::from_fn(|k| quad[(k + r) % 4])
}

/// Read and match the marker inside `quad` (corners on pixel edges).
pub(crate) fn decode_quad(
    img: &GrayImageView<'_>,
    quad: &[Point2<f32>; 4],
    cfg: &ScanDecodeConfig,
    matcher: &Matcher,
) -> Option<Marker> {
    let quad = if quad_signed_area(quad) < 0.0 {
        [quad[0], quad[3], quad[2], quad[1]]
    } else {
        *quad
    };

    // The decoder averages around the pixel at floor(x); shift so that
    // lands on the nearest pixel center.
    let half = Vector2::new(0.5, 0.5);
    let cell = MarkerCell {
        gc: GridCoords { i: 0, j: 0 },
        corners_img: quad.map(|p| p + half),
    };
    let det = decode_marker_in_cell(img, &cell, DECODE_SQUARE_PX, cfg, matcher)?;

    Some(Marker {
        id: det.id,
        corners: orient_corners(&quad, det.rotation),
        rotation: det.rotation,
        hamming: det.hamming,
        border_score: det.border_score,
        score: det.score,
    })
}

/// Keep the best-scoring marker per id; output sorted by id.
pub(crate) fn dedup_by_id_keep_best(mut markers: Vec<Marker>) -> Vec<Marker> {
    markers.sort_by(|a, b| a.id.cmp(&b.id).then(b.score.total_cmp(&a.score)));
    markers.dedup_by_key(|m| m.id);
    markers
}
