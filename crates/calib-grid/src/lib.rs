//! Physically scaled measurement grids over photos.
//!
//! A square fiducial marker of known printed size is detected in each
//! photo. Its mean side length in pixels gives a pixels-per-unit scale,
//! which places grid lines at real-world spacing. Optional text
//! annotations and a detection overlay are drawn alongside.
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_grid::{CalibrationConfig, CalibrationPipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = CalibrationConfig::new(10.0); // marker side in cm
//! config.spacing = 5.0;
//! config.color = "red".into();
//! let pipeline = CalibrationPipeline::new(config)?;
//!
//! let photo = image::open("photo.jpg")?;
//! let result = pipeline.process_dynamic(&photo)?;
//! println!("{:.2} px/cm", result.estimate.scale.px_per_unit());
//! result.image.save("photo_calibrated.jpg")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `calib_grid::core`: marker geometry, homographies, grayscale views, logging.
//! - `calib_grid::aruco`: the ArUco detector and marker rendering.
//! - [`scale`], [`select`], [`grid`], [`debug`]: the individual stages.
//! - [`CalibrationPipeline`]: all stages behind one validated configuration.

pub use calib_grid_aruco as aruco;
pub use calib_grid_core as core;

pub mod config;
pub mod debug;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod scale;
pub mod select;
mod text;

pub use config::{CalibrationConfig, GridColor, MarkerSize};
pub use error::{CalibrationError, ConfigError, ConfigIoError};
pub use grid::{line_positions, render_grid, Annotations, GridSpec};
pub use pipeline::{gray_view, CalibratedImage, CalibrationPipeline, MarkerDetector};
pub use scale::{estimate_scale, Scale, ScaleEstimate};
pub use select::{select_marker, SelectionPolicy};
