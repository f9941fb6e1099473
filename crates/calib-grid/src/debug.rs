//! Detection overlay for checking what the calibration was based on.

use crate::scale::Scale;
use crate::text::{draw_label, LabelStyle};
use calib_grid_core::Marker;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

const SELECTED: Rgb<u8> = Rgb([0, 255, 0]);
const OTHER: Rgb<u8> = Rgb([255, 0, 0]);
const FIRST_CORNER: Rgb<u8> = Rgb([0, 0, 255]);
const TEXT_BG: Rgb<u8> = Rgb([0, 0, 0]);
const CORNER_RADIUS: i32 = 4;
const MARGIN: i64 = 10;

/// Outline every detected marker on a copy of `image`.
///
/// The marker used for calibration is drawn in green, the rest in red.
/// Corner 0 is marked blue so the decoded orientation is visible.
pub fn render_debug(
    image: &RgbImage,
    markers: &[Marker],
    selected_id: u32,
    scale: Scale,
    unit: &str,
) -> RgbImage {
    let mut out = image.clone();

    for marker in markers {
        let color = if marker.id == selected_id {
            SELECTED
        } else {
            OTHER
        };
        draw_outline(&mut out, marker, color);

        for (i, c) in marker.corners.iter().enumerate() {
            let fill = if i == 0 { FIRST_CORNER } else { color };
            let at = (c.x.round() as i32, c.y.round() as i32);
            draw_filled_circle_mut(&mut out, at, CORNER_RADIUS, fill);
        }

        let style = LabelStyle {
            scale: 2,
            pad: 2,
            fg: color,
            bg: TEXT_BG,
        };
        let text = format!("ID:{}", marker.id);
        let (tw, th) = crate::text::text_size(&text, style.scale);
        let center = marker.center();
        draw_label(
            &mut out,
            center.x.round() as i64 - tw as i64 / 2,
            center.y.round() as i64 - th as i64 / 2,
            &text,
            &style,
        );
    }

    let header = format!(
        "ID:{} | {:.2} px/{}",
        selected_id,
        scale.px_per_unit(),
        unit
    );
    let style = LabelStyle {
        scale: 2,
        pad: 4,
        fg: SELECTED,
        bg: TEXT_BG,
    };
    let at = MARGIN + style.pad as i64;
    draw_label(&mut out, at, at, &header, &style);
    out
}

/// Two-pixel polygon outline.
fn draw_outline(img: &mut RgbImage, marker: &Marker, color: Rgb<u8>) {
    let c = &marker.corners;
    for i in 0..4 {
        let a = c[i];
        let b = c[(i + 1) % 4];
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(img, (a.x + dx, a.y + dy), (b.x + dx, b.y + dy), color);
        }
    }
}
