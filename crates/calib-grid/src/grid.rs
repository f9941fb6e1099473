//! Scaled grid and text annotations over a photo.
//!
//! The grid starts at the image origin: vertical lines at `x = p_k`,
//! horizontal lines at `y = p_k`, with `p_k = floor(k * spacing_px + 0.5)`.

use crate::config::GridColor;
use crate::error::CalibrationError;
use crate::scale::Scale;
use crate::text::{draw_label, LabelStyle};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

const MARGIN: i64 = 10;
const AXIS_LABEL_TOP: i64 = 5;
const AXIS_LABEL_SCALE: u32 = 2;
const AXIS_LABEL_PAD: u32 = 2;
const ANNOTATION_SCALE: u32 = 4;
const ANNOTATION_PAD: u32 = 5;
const CALIBRATION_SCALE: u32 = 2;
const CALIBRATION_PAD: u32 = 4;

/// Optional free-text annotations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotations {
    /// Drawn top-right as `Weight: …`.
    pub weight: Option<String>,
    /// Drawn top-left as `Camera: …`.
    pub viewpoint: Option<String>,
    /// Drawn bottom-right verbatim.
    pub stamp: Option<String>,
}

/// Validated grid appearance. Built by [`crate::CalibrationConfig::grid_spec`].
#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec {
    /// Line spacing in physical units.
    pub spacing: f64,
    /// Line width in pixels, at least 1.
    pub line_width: u32,
    pub color: GridColor,
    pub annotations: Annotations,
    pub axis_labels: bool,
    pub calibration_label: bool,
    pub unit: String,
}

/// Pixel positions of grid lines along an axis of `extent` pixels.
pub fn line_positions(extent: u32, spacing_px: f64) -> Vec<u32> {
    let mut out = Vec::new();
    if !(spacing_px.is_finite() && spacing_px > 0.0) {
        return out;
    }
    for k in 0u64.. {
        let p = (k as f64 * spacing_px + 0.5).floor();
        if p >= extent as f64 {
            break;
        }
        out.push(p as u32);
    }
    out
}

/// First pixel covered by a line of `width` centered at `p`.
#[inline]
fn line_start(p: u32, width: u32) -> i64 {
    p as i64 - ((width as i64 - 1) / 2)
}

/// `k * spacing` without trailing zeros: `5`, `2.5`, `0.125`.
fn format_value(v: f64) -> String {
    let s = format!("{v:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Draw the grid, axis labels and annotations onto a copy of `image`.
pub fn render_grid(
    image: &RgbImage,
    scale: Scale,
    spec: &GridSpec,
) -> Result<RgbImage, CalibrationError> {
    let spacing_px = scale.to_pixels(spec.spacing);
    if spacing_px.is_nan() || spacing_px < 1.0 {
        return Err(CalibrationError::GridTooDense { spacing_px });
    }

    let mut out = image.clone();
    let (w, h) = out.dimensions();
    if w == 0 || h == 0 {
        return Ok(out);
    }
    let fg = Rgb(spec.color.rgb());
    let bg = Rgb(spec.color.label_background());

    let xs = line_positions(w, spacing_px);
    let ys = line_positions(h, spacing_px);
    log::debug!(
        "grid: spacing {:.2} px, {} vertical and {} horizontal lines",
        spacing_px,
        xs.len(),
        ys.len()
    );

    for &x in &xs {
        let x0 = line_start(x, spec.line_width);
        draw_filled_rect_mut(
            &mut out,
            Rect::at(x0 as i32, 0).of_size(spec.line_width, h),
            fg,
        );
    }
    for &y in &ys {
        let y0 = line_start(y, spec.line_width);
        draw_filled_rect_mut(
            &mut out,
            Rect::at(0, y0 as i32).of_size(w, spec.line_width),
            fg,
        );
    }

    if spec.axis_labels {
        let style = LabelStyle {
            scale: AXIS_LABEL_SCALE,
            pad: AXIS_LABEL_PAD,
            fg,
            bg,
        };
        for (k, &x) in xs.iter().enumerate() {
            let text = format_value(k as f64 * spec.spacing);
            let (bw, _) = style.box_size(&text);
            let left = x as i64 - bw as i64 / 2 + style.pad as i64;
            draw_label(&mut out, left, AXIS_LABEL_TOP + style.pad as i64, &text, &style);
        }
    }

    draw_annotations(&mut out, scale, spec, fg, bg);
    Ok(out)
}

fn draw_annotations(out: &mut RgbImage, scale: Scale, spec: &GridSpec, fg: Rgb<u8>, bg: Rgb<u8>) {
    let (w, h) = (out.width() as i64, out.height() as i64);
    let big = LabelStyle {
        scale: ANNOTATION_SCALE,
        pad: ANNOTATION_PAD,
        fg,
        bg,
    };
    let small = LabelStyle {
        scale: CALIBRATION_SCALE,
        pad: CALIBRATION_PAD,
        fg,
        bg,
    };

    // Text origin for a box whose outer corner sits `MARGIN` from the edge.
    let left = |style: &LabelStyle| MARGIN + style.pad as i64;
    let right = |style: &LabelStyle, text: &str| {
        let (bw, _) = style.box_size(text);
        w - MARGIN - bw as i64 + style.pad as i64
    };
    let bottom = |style: &LabelStyle, text: &str| {
        let (_, bh) = style.box_size(text);
        h - MARGIN - bh as i64 + style.pad as i64
    };

    if let Some(viewpoint) = &spec.annotations.viewpoint {
        let text = format!("Camera: {viewpoint}");
        draw_label(out, left(&big), left(&big), &text, &big);
    }
    if let Some(weight) = &spec.annotations.weight {
        let text = format!("Weight: {weight}");
        draw_label(out, right(&big, &text), left(&big), &text, &big);
    }
    if spec.calibration_label {
        let text = format!("Calibrated: {:.2} px/{}", scale.px_per_unit(), spec.unit);
        draw_label(out, left(&small), bottom(&small, &text), &text, &small);
    }
    if let Some(stamp) = &spec.annotations.stamp {
        draw_label(out, right(&big, stamp), bottom(&big, stamp), stamp, &big);
    }
}
