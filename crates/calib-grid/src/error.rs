//! Error types of the calibration pipeline.

use calib_grid_aruco::DetectorError;

/// Invalid configuration. Raised before any image is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("marker size must be a positive finite number, got {value}")]
    NonPositiveMarkerSize { value: f64 },
    #[error("grid spacing must be a positive finite number, got {value}")]
    NonPositiveSpacing { value: f64 },
    #[error("grid line width must be at least 1 pixel")]
    ZeroLineWidth,
    #[error("unknown grid color {name:?} (expected one of red, green, blue, black, white)")]
    UnknownColor { name: String },
    #[error("unknown marker dictionary {name:?}")]
    UnknownDictionary { name: String },
    #[error("target marker id {id} is outside the dictionary ({count} markers)")]
    TargetIdOutOfRange { id: u32, count: usize },
    #[error("invalid detector parameters: {0}")]
    InvalidDetectorParams(#[source] DetectorError),
}

impl From<DetectorError> for ConfigError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::UnknownDictionary { name } => Self::UnknownDictionary { name },
            other => Self::InvalidDetectorParams(other),
        }
    }
}

/// Per-image failure. The image is skipped and no raster is produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("no calibration marker found")]
    NoMarkerFound,
    #[error("invalid marker geometry: {reason}")]
    InvalidMarkerGeometry { reason: String },
    #[error("several markers detected ({ids:?}) and no target id configured")]
    AmbiguousMarkerSelection { ids: Vec<u32> },
    #[error("target marker {target_id} not found (detected: {detected:?})")]
    TargetMarkerMissing { target_id: u32, detected: Vec<u32> },
    #[error("grid spacing of {spacing_px:.3} px is below one pixel")]
    GridTooDense { spacing_px: f64 },
}

/// Failure to read or parse a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
