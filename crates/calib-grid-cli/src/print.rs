//! Printable marker PNGs with physical resolution metadata.

use calib_grid_aruco::{render_marker, DetectorError, Dictionary, RENDER_BORDER_BITS};
use crate::dpi;
use calib_grid_core::GrayImage;
use std::path::Path;

const CM_PER_INCH: f64 = 2.54;

/// Quiet zone around the printed marker, as a fraction of its side.
const QUIET_ZONE_FRAC: f64 = 0.2;

#[derive(thiserror::Error, Debug)]
pub enum PrintError {
    #[error("marker side must be positive, got {size_cm} cm")]
    NonPositiveSize { size_cm: f64 },
    #[error("dpi must be positive")]
    ZeroDpi,
    #[error(transparent)]
    Marker(#[from] DetectorError),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
}

/// A rendered marker and what it measures once printed.
#[derive(Clone, Debug)]
pub struct PrintableMarker {
    pub image: GrayImage,
    pub cell_px: usize,
    /// Outer border side in pixels.
    pub marker_px: usize,
    /// Outer border side when printed at `dpi`.
    pub printed_cm: f64,
    pub dpi: u32,
}

/// Render `id` so that its outer border prints as close to `size_cm` as
/// whole-pixel cells allow at `dpi`.
pub fn printable_marker(
    dict: &Dictionary,
    id: u32,
    size_cm: f64,
    dpi: u32,
) -> Result<PrintableMarker, PrintError> {
    if !(size_cm.is_finite() && size_cm > 0.0) {
        return Err(PrintError::NonPositiveSize { size_cm });
    }
    if dpi == 0 {
        return Err(PrintError::ZeroDpi);
    }
    let cells = dict.marker_size + 2 * RENDER_BORDER_BITS;
    let target_px = size_cm / CM_PER_INCH * dpi as f64;
    let cell_px = ((target_px / cells as f64).round() as usize).max(1);
    let quiet_cells = ((cells as f64 * QUIET_ZONE_FRAC).round() as usize).max(1);

    let image = render_marker(dict, id, cell_px, quiet_cells)?;
    let marker_px = cell_px * cells;
    Ok(PrintableMarker {
        image,
        cell_px,
        marker_px,
        printed_cm: marker_px as f64 / dpi as f64 * CM_PER_INCH,
        dpi,
    })
}

/// Write an 8-bit grayscale PNG with a pHYs chunk for `dpi`.
pub fn write_png_with_dpi(path: &Path, img: &GrayImage, dpi: u32) -> Result<(), PrintError> {
    dpi::write_png(
        path,
        img.width as u32,
        img.height as u32,
        png::ColorType::Grayscale,
        &img.data,
        dpi,
    )?;
    Ok(())
}
