//! Detected fiducial marker and its quadrilateral geometry.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Smallest side length (pixels) accepted as a real marker edge.
const MIN_SIDE_PX: f64 = 1e-6;
/// Smallest |sin| of the turn angle at a corner before it counts as collinear.
const MIN_TURN_SIN: f64 = 1e-6;

/// Why a quadrilateral cannot be used as marker geometry.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum QuadDefect {
    #[error("corner {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("side {index} is degenerate ({length:.3e} px)")]
    DegenerateSide { index: usize, length: f64 },
    #[error("corners adjacent to corner {index} are collinear")]
    Collinear { index: usize },
    #[error("corners do not form a convex quadrilateral")]
    NotConvex,
}

/// One decoded fiducial marker in pixel coordinates.
///
/// Integer coordinates refer to pixel centers. Corners are ordered
/// clockwise in image coordinates (y pointing down), starting at the
/// marker's canonical top-left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Dictionary identity.
    pub id: u32,
    pub corners: [Point2<f32>; 4],
    /// Quarter turns between the dictionary code and the observed code.
    pub rotation: u8,
    /// Corrected bit errors.
    pub hamming: u8,
    /// Fraction of border cells observed black.
    pub border_score: f32,
    /// Combined decode quality in `[0, 1]`.
    pub score: f32,
}

impl Marker {
    /// Marker with perfect decode quality, e.g. for synthetic inputs.
    pub fn from_corners(id: u32, corners: [Point2<f32>; 4]) -> Self {
        Self {
            id,
            corners,
            rotation: 0,
            hamming: 0,
            border_score: 1.0,
            score: 1.0,
        }
    }

    /// Pixel length of the four sides `c0c1, c1c2, c2c3, c3c0`.
    pub fn side_lengths(&self) -> [f64; 4] {
        let c = &self.corners;
        std::array::from_fn(|i| {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let dx = b.x as f64 - a.x as f64;
            let dy = b.y as f64 - a.y as f64;
            (dx * dx + dy * dy).sqrt()
        })
    }

    /// Enclosed area in square pixels.
    pub fn area(&self) -> f64 {
        quad_signed_area(&self.corners).abs()
    }

    pub fn center(&self) -> Point2<f32> {
        let sx: f32 = self.corners.iter().map(|p| p.x).sum();
        let sy: f32 = self.corners.iter().map(|p| p.y).sum();
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Check that the corners form a non-degenerate convex quadrilateral.
    pub fn check_geometry(&self) -> Result<(), QuadDefect> {
        let c = &self.corners;
        if let Some(index) = c.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(QuadDefect::NonFinite { index });
        }

        for (index, length) in self.side_lengths().into_iter().enumerate() {
            if length <= MIN_SIDE_PX {
                return Err(QuadDefect::DegenerateSide { index, length });
            }
        }

        let mut sign = 0.0_f64;
        for i in 0..4 {
            let prev = c[(i + 3) % 4];
            let cur = c[i];
            let next = c[(i + 1) % 4];
            let (ax, ay) = (cur.x as f64 - prev.x as f64, cur.y as f64 - prev.y as f64);
            let (bx, by) = (next.x as f64 - cur.x as f64, next.y as f64 - cur.y as f64);
            let norm = (ax * ax + ay * ay).sqrt() * (bx * bx + by * by).sqrt();
            let turn = (ax * by - ay * bx) / norm;
            if turn.abs() <= MIN_TURN_SIN {
                return Err(QuadDefect::Collinear { index: i });
            }
            if sign == 0.0 {
                sign = turn.signum();
            } else if turn.signum() != sign {
                return Err(QuadDefect::NotConvex);
            }
        }

        Ok(())
    }
}

/// Shoelace sum of a quadrilateral.
///
/// Positive when the corners run clockwise on screen (y pointing down).
pub fn quad_signed_area(corners: &[Point2<f32>; 4]) -> f64 {
    let mut s = 0.0_f64;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        s += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    0.5 * s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f32, y0: f32, side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ]
    }

    #[test]
    fn square_metrics() {
        let m = Marker::from_corners(3, square(10.0, 20.0, 40.0));
        assert_eq!(m.side_lengths(), [40.0; 4]);
        assert_relative_eq!(m.area(), 1600.0);
        assert_eq!(m.center(), Point2::new(30.0, 40.0));
        assert!(m.check_geometry().is_ok());
    }

    #[test]
    fn clockwise_on_screen_has_positive_area() {
        let cw = square(0.0, 0.0, 2.0);
        assert!(quad_signed_area(&cw) > 0.0);
        let ccw = [cw[0], cw[3], cw[2], cw[1]];
        assert!(quad_signed_area(&ccw) < 0.0);
        assert!(Marker::from_corners(0, ccw).check_geometry().is_ok());
    }

    #[test]
    fn repeated_corner_is_a_degenerate_side() {
        let mut c = square(0.0, 0.0, 10.0);
        c[1] = c[0];
        let err = Marker::from_corners(0, c).check_geometry().unwrap_err();
        assert!(matches!(err, QuadDefect::DegenerateSide { index: 0, .. }));
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let c = [
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 5.0),
        ];
        let err = Marker::from_corners(0, c).check_geometry().unwrap_err();
        assert_eq!(err, QuadDefect::Collinear { index: 1 });
    }

    #[test]
    fn bowtie_is_not_convex() {
        let s = square(0.0, 0.0, 10.0);
        let bowtie = [s[0], s[2], s[1], s[3]];
        let err = Marker::from_corners(0, bowtie).check_geometry().unwrap_err();
        assert_eq!(err, QuadDefect::NotConvex);
    }

    #[test]
    fn nan_corner_is_rejected() {
        let mut c = square(0.0, 0.0, 10.0);
        c[2].x = f32::NAN;
        let err = Marker::from_corners(0, c).check_geometry().unwrap_err();
        assert_eq!(err, QuadDefect::NonFinite { index: 2 });
    }
}
