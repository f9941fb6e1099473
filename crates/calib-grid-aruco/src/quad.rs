//! Quadrilateral fitting for marker candidates.
//!
//! Outline points of a component go through a convex hull, the hull is
//! reduced to its four dominant vertices, and each side is re-fitted
//! with a total-least-squares line for sub-pixel corners.

use nalgebra::{Point2, Vector2};

/// Portion of each side (by projection parameter) used for line fitting.
const FIT_T_MIN: f64 = 0.1;
const FIT_T_MAX: f64 = 0.9;
/// Max distance (px) from the coarse side for a point to join the fit.
const FIT_MAX_DIST: f64 = 2.0;
/// Refined corners further than this fraction of the shortest side from
/// the coarse corner are treated as a failed fit.
const MAX_CORNER_SHIFT_FRAC: f64 = 0.25;

/// Limits for accepting a hull as a marker quad.
#[derive(Clone, Copy, Debug)]
pub(crate) struct QuadLimits {
    pub min_side_px: f64,
    pub min_hull_fill: f64,
    pub min_side_ratio: f64,
}

/// Convex hull (Andrew's monotone chain). Collinear points are dropped.
///
/// The result has a positive shoelace sum, i.e. it runs clockwise on
/// screen with y pointing down.
pub(crate) fn convex_hull(points: &[(f64, f64)]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points.iter().map(|&(x, y)| Point2::new(x, y)).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(2 * pts.len());
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

pub(crate) fn polygon_area(poly: &[Point2<f64>]) -> f64 {
    let n = poly.len();
    let mut s = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        s += a.x * b.y - b.x * a.y;
    }
    0.5 * s
}

/// Drop the vertex spanning the smallest triangle with its neighbours
/// until four remain.
pub(crate) fn reduce_to_quad(poly: &[Point2<f64>]) -> Option<[Point2<f64>; 4]> {
    if poly.len() < 4 {
        return None;
    }
    let mut current = poly.to_vec();
    while current.len() > 4 {
        let n = current.len();
        let mut min_area = f64::MAX;
        let mut min_idx = 0;
        for i in 0..n {
            let p = current[(i + n - 1) % n];
            let c = current[i];
            let q = current[(i + 1) % n];
            let area = 0.5 * (p.x * (c.y - q.y) + c.x * (q.y - p.y) + q.x * (p.y - c.y)).abs();
            if area < min_area {
                min_area = area;
                min_idx = i;
            }
        }
        current.remove(min_idx);
    }
    Some([current[0], current[1], current[2], current[3]])
}

/// Fit a marker quad to the outline points of one component.
///
/// Returned corners lie on pixel edges (not pixel centers) and run
/// clockwise on screen.
pub(crate) fn fit_quad(outline: &[(f64, f64)], limits: &QuadLimits) -> Option<[Point2<f32>; 4]> {
    let hull = convex_hull(outline);
    let hull_area = polygon_area(&hull);
    if hull_area <= 0.0 {
        return None;
    }

    let coarse = reduce_to_quad(&hull)?;
    let quad_area = polygon_area(&coarse);
    if quad_area / hull_area < limits.min_hull_fill {
        return None;
    }

    let sides: [f64; 4] = std::array::from_fn(|i| (coarse[(i + 1) % 4] - coarse[i]).norm());
    let min_side = sides.iter().copied().fold(f64::INFINITY, f64::min);
    let max_side = sides.iter().copied().fold(0.0, f64::max);
    if min_side < limits.min_side_px || min_side / max_side < limits.min_side_ratio {
        return None;
    }

    let lines: [Line; 4] =
        std::array::from_fn(|i| fit_side(outline, coarse[i], coarse[(i + 1) % 4]));

    let mut corners = [Point2::new(0.0f32, 0.0); 4];
    for i in 0..4 {
        let p = lines[(i + 3) % 4].intersect(&lines[i])?;
        if (p - coarse[i]).norm() > MAX_CORNER_SHIFT_FRAC * min_side + 1.0 {
            return None;
        }
        corners[i] = Point2::new(p.x as f32, p.y as f32);
    }
    Some(corners)
}

/// Line `n · p = c` with unit normal `n` pointing out of the quad.
#[derive(Clone, Copy, Debug)]
struct Line {
    n: Vector2<f64>,
    c: f64,
}

impl Line {
    fn intersect(&self, other: &Line) -> Option<Point2<f64>> {
        let det = self.n.x * other.n.y - self.n.y * other.n.x;
        if det.abs() < 1e-9 {
            return None;
        }
        let x = (self.c * other.n.y - self.n.y * other.c) / det;
        let y = (self.n.x * other.c - self.c * other.n.x) / det;
        Some(Point2::new(x, y))
    }
}

// Outline points are pixel centers one half-step inside the true edge;
// averaged over row and column extremes that step is 0.5 / (|nx| + |ny|).
fn half_pixel_shift(n: &Vector2<f64>) -> f64 {
    0.5 / (n.x.abs() + n.y.abs())
}

fn fit_side(outline: &[(f64, f64)], a: Point2<f64>, b: Point2<f64>) -> Line {
    let d = b - a;
    let len = d.norm();
    let dir = d / len;
    let outward = Vector2::new(dir.y, -dir.x);

    let mut count = 0usize;
    let mut mean = Vector2::zeros();
    let mut selected = Vec::new();
    for &(x, y) in outline {
        let v = Vector2::new(x - a.x, y - a.y);
        let t = v.dot(&dir) / len;
        if !(FIT_T_MIN..=FIT_T_MAX).contains(&t) || v.dot(&outward).abs() > FIT_MAX_DIST {
            continue;
        }
        selected.push(Vector2::new(x, y));
        mean += Vector2::new(x, y);
        count += 1;
    }

    let coarse = Line {
        n: outward,
        c: outward.dot(&a.coords) + half_pixel_shift(&outward),
    };
    if count < 3 {
        return coarse;
    }
    mean /= count as f64;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in &selected {
        let q = p - mean;
        sxx += q.x * q.x;
        sxy += q.x * q.y;
        syy += q.y * q.y;
    }
    // Principal direction of the 2x2 scatter matrix.
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let fit_dir = Vector2::new(theta.cos(), theta.sin());
    let mut n = Vector2::new(fit_dir.y, -fit_dir.x);
    if n.dot(&outward) < 0.0 {
        n = -n;
    }
    if n.dot(&outward) < 0.9 {
        return coarse;
    }

    Line {
        n,
        c: n.dot(&mean) + half_pixel_shift(&n),
    }
}
