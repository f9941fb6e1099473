use crate::GrayImage;

/// Raster of the given size with every pixel set to `value`.
pub fn filled_gray(width: usize, height: usize, value: u8) -> GrayImage {
    GrayImage {
        width,
        height,
        data: vec![value; width * height],
    }
}
