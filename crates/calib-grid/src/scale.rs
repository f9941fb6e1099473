//! Pixel-per-unit scale from a detected marker of known size.
//!
//! The scale is exact only for objects at the marker's depth and
//! orientation. Perspective foreshortening is averaged over the four
//! sides, not corrected.

use crate::config::MarkerSize;
use crate::error::CalibrationError;
use calib_grid_core::Marker;
use serde::Serialize;

/// Pixels per physical unit. Positive and finite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Scale(f64);

impl Scale {
    pub fn px_per_unit(self) -> f64 {
        self.0
    }

    /// Physical length to pixels.
    pub fn to_pixels(self, units: f64) -> f64 {
        units * self.0
    }

    /// Pixels to physical length.
    pub fn to_units(self, pixels: f64) -> f64 {
        pixels / self.0
    }
}

/// Scale together with the measurements it was derived from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScaleEstimate {
    pub scale: Scale,
    pub marker_id: u32,
    /// Lengths of sides `c0c1, c1c2, c2c3, c3c0` in pixels.
    pub side_lengths_px: [f64; 4],
    pub mean_side_px: f64,
}

/// Derive the scale from the mean side length of `marker`.
pub fn estimate_scale(
    marker: &Marker,
    size: MarkerSize,
) -> Result<ScaleEstimate, CalibrationError> {
    marker
        .check_geometry()
        .map_err(|defect| CalibrationError::InvalidMarkerGeometry {
            reason: format!("marker {}: {defect}", marker.id),
        })?;

    let side_lengths_px = marker.side_lengths();
    let mean_side_px = side_lengths_px.iter().sum::<f64>() / 4.0;
    let px_per_unit = mean_side_px / size.get();
    if !(px_per_unit.is_finite() && px_per_unit > 0.0) {
        return Err(CalibrationError::InvalidMarkerGeometry {
            reason: format!("marker {}: scale {px_per_unit} is not usable", marker.id),
        });
    }

    Ok(ScaleEstimate {
        scale: Scale(px_per_unit),
        marker_id: marker.id,
        side_lengths_px,
        mean_side_px,
    })
}
