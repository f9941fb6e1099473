//! JSON-loadable configuration and its validated building blocks.

use crate::error::{ConfigError, ConfigIoError};
use crate::grid::{Annotations, GridSpec};
use crate::select::SelectionPolicy;
use calib_grid_aruco::DetectorParams;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, str::FromStr};

/// Real-world side length of the calibration marker. Always positive and
/// finite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct MarkerSize(f64);

impl MarkerSize {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ConfigError::NonPositiveMarkerSize { value })
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Grid line and label color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridColor {
    Red,
    Green,
    Blue,
    Black,
    White,
}

impl GridColor {
    pub const ALL: [GridColor; 5] = [
        GridColor::Red,
        GridColor::Green,
        GridColor::Blue,
        GridColor::Black,
        GridColor::White,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GridColor::Red => "red",
            GridColor::Green => "green",
            GridColor::Blue => "blue",
            GridColor::Black => "black",
            GridColor::White => "white",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            GridColor::Red => [255, 0, 0],
            GridColor::Green => [0, 255, 0],
            GridColor::Blue => [0, 0, 255],
            GridColor::Black => [0, 0, 0],
            GridColor::White => [255, 255, 255],
        }
    }

    /// Fill behind text so labels stay readable in this color.
    pub fn label_background(self) -> [u8; 3] {
        match self {
            GridColor::White => [0, 0, 0],
            _ => [255, 255, 255],
        }
    }
}

impl FromStr for GridColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        GridColor::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| ConfigError::UnknownColor {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for GridColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_spacing() -> f64 {
    5.0
}

fn default_line_width() -> u32 {
    2
}

fn default_color() -> String {
    GridColor::Black.name().to_string()
}

fn default_unit() -> String {
    "cm".to_string()
}

fn default_true() -> bool {
    true
}

/// Everything needed to calibrate and annotate a batch of images.
///
/// Only `calibrate_size` is required in JSON; every other field has a
/// default. Nothing is validated until a pipeline is built from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Printed marker side length, in `unit`.
    pub calibrate_size: f64,
    /// Grid spacing, in `unit`.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
    /// Grid line width in pixels.
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    /// One of red, green, blue, black, white.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub viewpoint: Option<String>,
    /// Free text for the bottom-right corner, e.g. a capture time.
    #[serde(default)]
    pub stamp: Option<String>,
    /// Physical unit name used in labels.
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_true")]
    pub axis_labels: bool,
    #[serde(default = "default_true")]
    pub calibration_label: bool,
    /// Also produce the detection overlay.
    #[serde(default)]
    pub debug: bool,
    /// Calibrate from this marker id only.
    #[serde(default)]
    pub target_id: Option<u32>,
    #[serde(default)]
    pub selection: SelectionPolicy,
    #[serde(default)]
    pub detector: DetectorParams,
}

impl CalibrationConfig {
    /// Configuration with defaults for everything but the marker size.
    pub fn new(calibrate_size: f64) -> Self {
        Self {
            calibrate_size,
            spacing: default_spacing(),
            line_width: default_line_width(),
            color: default_color(),
            weight: None,
            viewpoint: None,
            stamp: None,
            unit: default_unit(),
            axis_labels: true,
            calibration_label: true,
            debug: false,
            target_id: None,
            selection: SelectionPolicy::default(),
            detector: DetectorParams::default(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn marker_size(&self) -> Result<MarkerSize, ConfigError> {
        MarkerSize::new(self.calibrate_size)
    }

    /// Build the validated grid description.
    pub fn grid_spec(&self) -> Result<GridSpec, ConfigError> {
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(ConfigError::NonPositiveSpacing {
                value: self.spacing,
            });
        }
        if self.line_width == 0 {
            return Err(ConfigError::ZeroLineWidth);
        }
        Ok(GridSpec {
            spacing: self.spacing,
            line_width: self.line_width,
            color: self.color.parse()?,
            annotations: Annotations {
                weight: self.weight.clone(),
                viewpoint: self.viewpoint.clone(),
                stamp: self.stamp.clone(),
            },
            axis_labels: self.axis_labels,
            calibration_label: self.calibration_label,
            unit: self.unit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse_case_insensitively() {
        assert_eq!("Red".parse::<GridColor>().unwrap(), GridColor::Red);
        assert_eq!(" white ".parse::<GridColor>().unwrap(), GridColor::White);
        assert_eq!(GridColor::Blue.rgb(), [0, 0, 255]);
        for c in GridColor::ALL {
            assert_eq!(c.name().parse::<GridColor>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_color_is_a_config_error() {
        let err = "purple".parse::<GridColor>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownColor {
                name: "purple".to_string()
            }
        );
    }

    #[test]
    fn white_grid_gets_dark_label_background() {
        assert_eq!(GridColor::White.label_background(), [0, 0, 0]);
        assert_eq!(GridColor::Red.label_background(), [255, 255, 255]);
    }

    #[test]
    fn marker_size_must_be_positive() {
        assert!(MarkerSize::new(10.0).is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                MarkerSize::new(bad),
                Err(ConfigError::NonPositiveMarkerSize { .. })
            ));
        }
    }

    #[test]
    fn json_needs_only_marker_size() {
        let cfg: CalibrationConfig = serde_json::from_str(r#"{"calibrate_size": 10}"#).unwrap();
        assert_eq!(cfg, CalibrationConfig::new(10.0));
        assert!(serde_json::from_str::<CalibrationConfig>("{}").is_err());
    }

    #[test]
    fn json_overrides_defaults() {
        let cfg: CalibrationConfig = serde_json::from_str(
            r#"{
                "calibrate_size": 4.5,
                "spacing": 1,
                "color": "green",
                "weight": "82 kg",
                "selection": "unique",
                "detector": {"min_border_score": 0.9}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.spacing, 1.0);
        assert_eq!(cfg.selection, SelectionPolicy::Unique);
        assert_eq!(cfg.detector.min_border_score, 0.9);
        let spec = cfg.grid_spec().unwrap();
        assert_eq!(spec.color, GridColor::Green);
        assert_eq!(spec.annotations.weight.as_deref(), Some("82 kg"));
    }

    #[test]
    fn grid_spec_rejects_bad_values() {
        let mut cfg = CalibrationConfig::new(10.0);
        cfg.spacing = 0.0;
        assert!(matches!(
            cfg.grid_spec(),
            Err(ConfigError::NonPositiveSpacing { .. })
        ));
        cfg.spacing = 1.0;
        cfg.line_width = 0;
        assert_eq!(cfg.grid_spec().unwrap_err(), ConfigError::ZeroLineWidth);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut cfg = CalibrationConfig::new(7.0);
        cfg.target_id = Some(3);
        cfg.write_json(&path).unwrap();
        assert_eq!(CalibrationConfig::load_json(&path).unwrap(), cfg);
        assert!(matches!(
            CalibrationConfig::load_json(dir.path().join("missing.json")),
            Err(ConfigIoError::Io(_))
        ));
    }
}
