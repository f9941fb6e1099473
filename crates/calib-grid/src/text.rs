//! Bitmap text from the built-in 8x8 font, integer-scaled.

use font8x8::{UnicodeFonts, BASIC_FONTS, GREEK_FONTS, LATIN_FONTS, MISC_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

const GLYPH_PX: u32 = 8;

/// Bitmap for `c`; characters outside the font draw as `?`.
fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| GREEK_FONTS.get(c))
        .or_else(|| MISC_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Width and height in pixels of `text` at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let n = text.chars().count() as u32;
    (n * GLYPH_PX * scale, GLYPH_PX * scale)
}

/// Draw `text` with its top-left corner at `(x, y)`, clipped to the image.
pub fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let s = scale as i64;
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as i64 * GLYPH_PX as i64 * s;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = gx + col as i64 * s;
                let py = y + row as i64 * s;
                for yy in py.max(0)..(py + s).min(h) {
                    for xx in px.max(0)..(px + s).min(w) {
                        img.put_pixel(xx as u32, yy as u32, color);
                    }
                }
            }
        }
    }
}

/// Glyph scale, box padding and colors of a text label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelStyle {
    pub scale: u32,
    pub pad: u32,
    pub fg: Rgb<u8>,
    pub bg: Rgb<u8>,
}

impl LabelStyle {
    /// Size of the label box including padding.
    pub fn box_size(&self, text: &str) -> (u32, u32) {
        let (tw, th) = text_size(text, self.scale);
        (tw + 2 * self.pad, th + 2 * self.pad)
    }
}

/// Draw `text` at `(x, y)` on a filled box extending `style.pad` pixels
/// around it.
pub fn draw_label(img: &mut RgbImage, x: i64, y: i64, text: &str, style: &LabelStyle) {
    let (bw, bh) = style.box_size(text);
    if bw > 0 && bh > 0 {
        let pad = style.pad as i64;
        let rect = Rect::at((x - pad) as i32, (y - pad) as i32).of_size(bw, bh);
        draw_filled_rect_mut(img, rect, style.bg);
    }
    draw_text(img, x, y, text, style.scale, style.fg);
}
