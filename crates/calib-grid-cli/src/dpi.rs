//! Physical resolution metadata: read from inputs, carried into outputs.
//!
//! PNG keeps it in the `pHYs` chunk, JPEG in the JFIF `APP0` header.
//! Other formats are written without it.

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::RgbImage;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

/// Resolution assumed for inputs that carry none.
pub const DEFAULT_DPI: u32 = 72;

const METERS_PER_INCH: f64 = 0.0254;
const CM_PER_INCH: f64 = 2.54;

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Container {
    Png,
    Jpeg,
    Other,
}

fn container(path: &Path) -> Container {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => Container::Png,
        Some("jpg" | "jpeg") => Container::Jpeg,
        _ => Container::Other,
    }
}

/// Horizontal resolution stored in `path`, if its container records one.
pub fn read_dpi(path: &Path) -> Option<u32> {
    match container(path) {
        Container::Png => read_png_dpi(path),
        Container::Jpeg => {
            let mut head = [0u8; 18];
            File::open(path).ok()?.read_exact(&mut head).ok()?;
            jfif_dpi(&head)
        }
        Container::Other => None,
    }
}

fn read_png_dpi(path: &Path) -> Option<u32> {
    let decoder = png::Decoder::new(BufReader::new(File::open(path).ok()?));
    let reader = decoder.read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter if dims.xppu > 0 => {
            Some((dims.xppu as f64 * METERS_PER_INCH).round() as u32)
        }
        _ => None,
    }
}

/// Density from a JFIF header that directly follows the SOI marker.
fn jfif_dpi(head: &[u8]) -> Option<u32> {
    if head.len() < 18 || head[..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &head[6..11] != b"JFIF\0" {
        return None;
    }
    let x_density = u16::from_be_bytes([head[14], head[15]]) as f64;
    if x_density == 0.0 {
        return None;
    }
    match head[13] {
        1 => Some(x_density as u32),
        2 => Some((x_density * CM_PER_INCH).round() as u32),
        _ => None,
    }
}

/// Write pixels as an 8-bit PNG with a `pHYs` chunk for `dpi`.
pub fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    color: png::ColorType,
    data: &[u8],
    dpi: u32,
) -> Result<(), png::EncodingError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = (dpi as f64 / METERS_PER_INCH).round() as u32;
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    writer.finish()?;
    Ok(())
}

/// Save `img` to `path`, recording `dpi` where the format supports it.
pub fn save_with_dpi(img: &RgbImage, path: &Path, dpi: u32) -> Result<(), SaveError> {
    match container(path) {
        Container::Png => write_png(
            path,
            img.width(),
            img.height(),
            png::ColorType::Rgb,
            img.as_raw(),
            dpi,
        )?,
        Container::Jpeg => {
            let file = BufWriter::new(File::create(path)?);
            let mut encoder = JpegEncoder::new(file);
            encoder.set_pixel_density(PixelDensity::dpi(dpi.min(u16::MAX as u32) as u16));
            encoder.encode_image(img)?;
        }
        Container::Other => img.save(path)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample() -> RgbImage {
        RgbImage::from_pixel(6, 4, Rgb([10, 120, 240]))
    }

    #[test]
    fn png_resolution_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        save_with_dpi(&sample(), &path, 300).unwrap();

        let decoder = png::Decoder::new(BufReader::new(File::open(&path).unwrap()));
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(reader.info().color_type, png::ColorType::Rgb);
        assert_eq!(read_dpi(&path), Some(300));
    }

    #[test]
    fn jpeg_records_jfif_density() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.JPG");
        save_with_dpi(&sample(), &path, 240).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[6..11], b"JFIF\0");
        assert_eq!(bytes[13], 1);
        assert_eq!(u16::from_be_bytes([bytes[14], bytes[15]]), 240);
        assert_eq!(read_dpi(&path), Some(240));
    }

    #[test]
    fn jfif_units_are_converted() {
        let mut head = [0u8; 18];
        head[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        head[6..11].copy_from_slice(b"JFIF\0");
        head[13] = 2;
        head[14..16].copy_from_slice(&118u16.to_be_bytes());
        assert_eq!(jfif_dpi(&head), Some(300));

        head[13] = 0;
        assert_eq!(jfif_dpi(&head), None);
        assert_eq!(jfif_dpi(&head[..10]), None);
    }

    #[test]
    fn missing_metadata_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        sample().save(&path).unwrap();
        assert_eq!(read_dpi(&path), None);
        assert_eq!(read_dpi(&dir.path().join("absent.jpg")), None);
        assert_eq!(read_dpi(Path::new("x.bmp")), None);
    }
}
