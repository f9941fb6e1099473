//! End-to-end processing of one photo: detect, select, scale, draw.

use crate::config::{CalibrationConfig, MarkerSize};
use crate::debug::render_debug;
use crate::error::{CalibrationError, ConfigError};
use crate::grid::{render_grid, GridSpec};
use crate::scale::{estimate_scale, ScaleEstimate};
use crate::select::select_marker;
use calib_grid_aruco::ArucoDetector;
use calib_grid_core::{GrayImageView, Marker};
use image::{DynamicImage, RgbImage};
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Source of marker detections for the pipeline.
pub trait MarkerDetector: Send + Sync {
    /// Markers found in `img`, at most one per id.
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<Marker>;

    /// Number of ids the detector can report, if bounded.
    fn id_count(&self) -> Option<usize> {
        None
    }
}

impl MarkerDetector for ArucoDetector {
    fn detect(&self, img: &GrayImageView<'_>) -> Vec<Marker> {
        ArucoDetector::detect(self, img)
    }

    fn id_count(&self) -> Option<usize> {
        Some(self.dictionary().codes.len())
    }
}

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Result of processing one photo.
#[derive(Clone, Debug)]
pub struct CalibratedImage {
    /// Input with grid and annotations drawn on it.
    pub image: RgbImage,
    /// Detection overlay, when enabled.
    pub debug: Option<RgbImage>,
    pub estimate: ScaleEstimate,
    /// Every detection, sorted by id.
    pub markers: Vec<Marker>,
    /// The marker the scale was derived from.
    pub selected: Marker,
}

/// Validated configuration plus a detector, shared read-only across images.
pub struct CalibrationPipeline {
    config: CalibrationConfig,
    marker_size: MarkerSize,
    grid: GridSpec,
    detector: Box<dyn MarkerDetector>,
}

impl fmt::Debug for CalibrationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationPipeline")
            .field("config", &self.config)
            .field("marker_size", &self.marker_size)
            .field("grid", &self.grid)
            .finish_non_exhaustive()
    }
}

impl CalibrationPipeline {
    /// Validate `config` and build the ArUco detector it describes.
    pub fn new(config: CalibrationConfig) -> Result<Self, ConfigError> {
        let detector = ArucoDetector::new(config.detector.clone())?;
        Self::with_detector(config, detector)
    }

    /// Validate `config` and pair it with a custom detector.
    pub fn with_detector(
        config: CalibrationConfig,
        detector: impl MarkerDetector + 'static,
    ) -> Result<Self, ConfigError> {
        let marker_size = config.marker_size()?;
        let grid = config.grid_spec()?;
        if let (Some(id), Some(count)) = (config.target_id, detector.id_count()) {
            if id as usize >= count {
                return Err(ConfigError::TargetIdOutOfRange { id, count });
            }
        }
        Ok(Self {
            config,
            marker_size,
            grid,
            detector: Box::new(detector),
        })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn grid_spec(&self) -> &GridSpec {
        &self.grid
    }

    /// Calibrate `image` and draw the scaled grid on a copy of it.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width(), height = image.height()))
    )]
    pub fn process(&self, image: &RgbImage) -> Result<CalibratedImage, CalibrationError> {
        let gray = ::image::imageops::grayscale(image);
        let markers = self.detector.detect(&gray_view(&gray));

        let selected = select_marker(&markers, self.config.target_id, self.config.selection)?.clone();
        let estimate = estimate_scale(&selected, self.marker_size)?;
        log::debug!(
            "marker {} selected of {}: mean side {:.2} px, {:.4} px/{}",
            selected.id,
            markers.len(),
            estimate.mean_side_px,
            estimate.scale.px_per_unit(),
            self.grid.unit
        );

        let out = render_grid(image, estimate.scale, &self.grid)?;
        let debug = self.config.debug.then(|| {
            render_debug(image, &markers, selected.id, estimate.scale, &self.grid.unit)
        });

        Ok(CalibratedImage {
            image: out,
            debug,
            estimate,
            markers,
            selected,
        })
    }

    /// [`Self::process`] for any decoded image.
    pub fn process_dynamic(&self, image: &DynamicImage) -> Result<CalibratedImage, CalibrationError> {
        self.process(&image.to_rgb8())
    }
}
