//! Choosing the calibration marker among several detections.

use crate::error::CalibrationError;
use calib_grid_core::Marker;
use serde::{Deserialize, Serialize};

/// What to do when several markers are detected and no target id is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Largest marker by image area; ties go to the lowest id.
    #[default]
    Largest,
    /// Exactly one detection is required.
    Unique,
}

/// Pick the marker to calibrate from.
///
/// A configured `target_id` takes precedence over `policy`.
pub fn select_marker(
    markers: &[Marker],
    target_id: Option<u32>,
    policy: SelectionPolicy,
) -> Result<&Marker, CalibrationError> {
    if markers.is_empty() {
        return Err(CalibrationError::NoMarkerFound);
    }
    let ids = || markers.iter().map(|m| m.id).collect::<Vec<_>>();

    if let Some(target_id) = target_id {
        return markers
            .iter()
            .find(|m| m.id == target_id)
            .ok_or_else(|| CalibrationError::TargetMarkerMissing {
                target_id,
                detected: ids(),
            });
    }

    match policy {
        SelectionPolicy::Unique => match markers {
            [only] => Ok(only),
            _ => Err(CalibrationError::AmbiguousMarkerSelection { ids: ids() }),
        },
        SelectionPolicy::Largest => {
            let mut best = &markers[0];
            for m in &markers[1..] {
                let (a, b) = (m.area(), best.area());
                if a > b || (a == b && m.id < best.id) {
                    best = m;
                }
            }
            Ok(best)
        }
    }
}
