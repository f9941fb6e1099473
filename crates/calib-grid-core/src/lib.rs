//! Core types and utilities for marker-calibrated grid overlays.
//!
//! Raster views, homographies and the logger come from
//! `calib-targets-core`; this crate adds the decoded [`Marker`] and its
//! quadrilateral checks. It does *not* depend on any concrete image codec.

mod marker;
mod raster;

pub use calib_targets_core::{homography_from_4pt, GrayImage, GrayImageView};
pub use marker::{quad_signed_area, Marker, QuadDefect};
pub use raster::filled_gray;

#[cfg(feature = "tracing")]
pub use calib_targets_core::init_tracing;

pub use calib_targets_core::init_with_level;
