//! Full-image marker detection.

use crate::components::label_components;
use crate::decode::{decode_quad, dedup_by_id_keep_best, scan_config};
use crate::quad::{fit_quad, QuadLimits};
use crate::threshold::{binarize_adaptive, binarize_global};
use calib_grid_core::{GrayImageView, Marker};
use calib_targets_aruco::{builtins, Dictionary, Matcher, ScanDecodeConfig};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Dictionary used when none is configured.
pub const DEFAULT_DICTIONARY: &str = "DICT_6X6_250";

/// Errors raised while configuring the detector or rendering markers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("unknown marker dictionary {name:?}")]
    UnknownDictionary { name: String },
    #[error("invalid detector parameter `{param}`: {reason}")]
    InvalidParam { param: &'static str, reason: String },
    #[error("marker id {id} is outside the dictionary ({count} markers)")]
    MarkerIdOutOfRange { id: u32, count: usize },
    #[error("marker cell size must be at least one pixel")]
    ZeroCellSize,
    #[error("marker corners do not span a quadrilateral")]
    DegenerateQuad,
}

/// Tunable detection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Built-in dictionary name, e.g. `DICT_6X6_250`.
    pub dictionary: String,
    /// Max corrected bit errors; `None` uses the dictionary's capacity.
    pub max_hamming: Option<u8>,
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Smallest accepted candidate side (bounding box and quad), pixels.
    pub min_marker_side_px: f32,
    /// Largest accepted candidate bounding box as a fraction of the image.
    pub max_marker_frac: f32,
    pub max_aspect_ratio: f32,
    /// Min dark-pixel fraction of the candidate bounding box.
    pub min_fill_ratio: f32,
    /// Min ratio of quad area to convex hull area.
    pub min_hull_fill: f32,
    /// Min ratio of shortest to longest quad side.
    pub min_side_ratio: f32,
    /// Adaptive threshold window radius as a fraction of the shorter
    /// image side. `0` disables the adaptive pass.
    pub adaptive_window_frac: f32,
    /// A pixel is dark when this far below its local mean.
    pub adaptive_offset: f32,
    /// Min fraction of border cells that must read black.
    pub min_border_score: f32,
    /// Drop candidates whose bounding box touches the image border.
    pub reject_border_touching: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            dictionary: DEFAULT_DICTIONARY.to_string(),
            max_hamming: None,
            border_bits: 1,
            min_marker_side_px: 20.0,
            max_marker_frac: 0.95,
            max_aspect_ratio: 4.0,
            min_fill_ratio: 0.15,
            min_hull_fill: 0.85,
            min_side_ratio: 0.25,
            adaptive_window_frac: 0.05,
            adaptive_offset: 7.0,
            min_border_score: 0.8,
            reject_border_touching: true,
        }
    }
}

/// Look up a built-in dictionary, e.g. `DICT_6X6_250`.
pub fn dictionary_by_name(name: &str) -> Result<Dictionary, DetectorError> {
    builtins::builtin_dictionary(name).ok_or_else(|| DetectorError::UnknownDictionary {
        name: name.to_string(),
    })
}

fn check_range(param: &'static str, value: f32, lo: f32, hi: f32) -> Result<(), DetectorError> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(DetectorError::InvalidParam {
            param,
            reason: format!("{value} is outside [{lo}, {hi}]"),
        })
    }
}

impl DetectorParams {
    /// Resolve the configured dictionary by name.
    pub fn resolve_dictionary(&self) -> Result<Dictionary, DetectorError> {
        dictionary_by_name(&self.dictionary)
    }

    /// Check ranges and the dictionary name.
    pub fn validate(&self) -> Result<Dictionary, DetectorError> {
        let dict = self.resolve_dictionary()?;
        if dict.bit_count() > 64 {
            return Err(DetectorError::InvalidParam {
                param: "dictionary",
                reason: format!("{} bits per marker exceed 64", dict.bit_count()),
            });
        }
        if self.border_bits == 0 {
            return Err(DetectorError::InvalidParam {
                param: "border_bits",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(h) = self.max_hamming {
            if h as usize > dict.bit_count() {
                return Err(DetectorError::InvalidParam {
                    param: "max_hamming",
                    reason: format!("{h} exceeds the {} code bits", dict.bit_count()),
                });
            }
        }
        check_range("min_marker_side_px", self.min_marker_side_px, 4.0, f32::MAX)?;
        check_range("max_marker_frac", self.max_marker_frac, 0.01, 1.0)?;
        check_range("max_aspect_ratio", self.max_aspect_ratio, 1.0, f32::MAX)?;
        check_range("min_fill_ratio", self.min_fill_ratio, 0.0, 1.0)?;
        check_range("min_hull_fill", self.min_hull_fill, 0.0, 1.0)?;
        check_range("min_side_ratio", self.min_side_ratio, 0.0, 1.0)?;
        check_range("adaptive_window_frac", self.adaptive_window_frac, 0.0, 0.5)?;
        check_range("adaptive_offset", self.adaptive_offset, 0.0, 255.0)?;
        check_range("min_border_score", self.min_border_score, 0.0, 1.0)?;
        Ok(dict)
    }
}

/// Square fiducial detector over a built-in dictionary.
///
/// Detection is a pure function of the input raster; the detector holds
/// no per-call state and can be shared across threads.
#[derive(Clone, Debug)]
pub struct ArucoDetector {
    params: DetectorParams,
    matcher: Matcher,
    scan: ScanDecodeConfig,
}

impl ArucoDetector {
    pub fn new(params: DetectorParams) -> Result<Self, DetectorError> {
        let dict = params.validate()?;
        let max_hamming = params.max_hamming.unwrap_or(dict.max_correction_bits);
        Ok(Self {
            matcher: Matcher::new(dict, max_hamming),
            scan: scan_config(params.border_bits, params.min_border_score),
            params,
        })
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect all decodable markers, best detection per id, sorted by id.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(w = img.width, h = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Vec<Marker> {
        if img.width == 0 || img.height == 0 || img.data.len() != img.width * img.height {
            return Vec::new();
        }

        let mut masks = vec![binarize_global(img)];
        let radius = (self.params.adaptive_window_frac * img.width.min(img.height) as f32).round();
        if radius >= 1.0 {
            masks.push(binarize_adaptive(
                img,
                radius as usize,
                self.params.adaptive_offset,
            ));
        }

        let mut found = Vec::new();
        for mask in &masks {
            found.extend(self.detect_in_mask(img, mask));
        }
        let markers = dedup_by_id_keep_best(found);
        debug!(
            "detected {} marker(s) in {}x{} image: {:?}",
            markers.len(),
            img.width,
            img.height,
            markers.iter().map(|m| m.id).collect::<Vec<_>>()
        );
        markers
    }

    fn detect_in_mask(&self, img: &GrayImageView<'_>, mask: &[bool]) -> Vec<Marker> {
        let p = &self.params;
        let comps = label_components(mask, img.width, img.height);
        let limits = QuadLimits {
            min_side_px: p.min_marker_side_px as f64,
            min_hull_fill: p.min_hull_fill as f64,
            min_side_ratio: p.min_side_ratio as f64,
        };
        let max_w = p.max_marker_frac * img.width as f32;
        let max_h = p.max_marker_frac * img.height as f32;

        let mut candidates = 0usize;
        let mut out = Vec::new();
        for (i, s) in comps.stats.iter().enumerate() {
            let (bw, bh) = (s.bbox_width() as f32, s.bbox_height() as f32);
            if bw.min(bh) < p.min_marker_side_px || bw > max_w || bh > max_h {
                continue;
            }
            if bw.max(bh) / bw.min(bh) > p.max_aspect_ratio || s.fill_ratio() < p.min_fill_ratio {
                continue;
            }
            if p.reject_border_touching
                && (s.min_x == 0
                    || s.min_y == 0
                    || s.max_x + 1 >= img.width
                    || s.max_y + 1 >= img.height)
            {
                continue;
            }

            let outline = comps.outline_points(i as u32 + 1);
            let Some(quad) = fit_quad(&outline, &limits) else {
                continue;
            };
            candidates += 1;
            if let Some(marker) = decode_quad(img, &quad, &self.scan, &self.matcher) {
                out.push(marker);
            }
        }
        debug!(
            "{} component(s), {} quad candidate(s), {} decoded",
            comps.stats.len(),
            candidates,
            out.len()
        );
        out
    }
}
