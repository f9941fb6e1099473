//! Square fiducial marker detection for calib-grid.
//!
//! This crate finds ArUco-style markers in a grayscale raster:
//! - global and adaptive thresholding,
//! - connected components filtered to quad-like candidates,
//! - sub-pixel quad fitting,
//! - bit sampling and matching against a built-in dictionary.
//!
//! Dictionaries and the code matcher come from `calib-targets-aruco`.
//! Markers can also be rendered, for printing or synthetic scenes.

mod components;
mod decode;
mod detector;
mod quad;
mod render;
mod threshold;

pub use calib_targets_aruco::Dictionary;
pub use detector::{
    dictionary_by_name, ArucoDetector, DetectorError, DetectorParams, DEFAULT_DICTIONARY,
};
pub use render::{draw_marker, render_marker, RENDER_BORDER_BITS};
