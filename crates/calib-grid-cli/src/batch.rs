//! Image discovery and per-image processing for the `grid` command.

use crate::dpi::{read_dpi, save_with_dpi, SaveError, DEFAULT_DPI};
use calib_grid::{CalibrationError, CalibrationPipeline};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// File extensions picked up when scanning a directory.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// A directory that could not be listed.
#[derive(thiserror::Error, Debug)]
#[error("cannot list {}: {source}", path.display())]
pub struct DiscoverError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Why one image produced no output. The batch continues.
#[derive(thiserror::Error, Debug)]
pub enum ImageFailure {
    #[error("cannot read image: {0}")]
    Read(#[source] image::ImageError),
    #[error(transparent)]
    Calibrate(#[from] CalibrationError),
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SaveError,
    },
}

/// Outputs written for one image.
#[derive(Clone, Debug)]
pub struct ImageReport {
    pub marker_id: u32,
    pub px_per_unit: f64,
    /// Resolution recorded in the outputs.
    pub dpi: u32,
    pub output: PathBuf,
    pub debug: Option<PathBuf>,
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Supported image files directly inside `dir`, sorted by name.
pub fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    let failed = |source| DiscoverError {
        path: dir.to_path_buf(),
        source,
    };
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(failed)? {
        let path = entry.map_err(failed)?.path();
        if path.is_file() && is_supported(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Expand `inputs` into image files.
///
/// Directories are scanned one level deep and sorted by name; files are
/// taken as given. Duplicates keep their first position.
pub fn discover_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut out: Vec<PathBuf> = Vec::new();
    for input in inputs {
        if input.is_dir() {
            out.extend(scan_dir(input)?);
        } else {
            out.push(input.clone());
        }
    }
    let mut seen = HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    Ok(out)
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn name_key(stem: &str, input: &Path) -> String {
    let ext = input.extension().map(|e| e.to_string_lossy()).unwrap_or_default();
    format!("{stem}.{ext}").to_lowercase()
}

/// Output stem for every input so that no two outputs share a file name.
///
/// A file name shared by several inputs is prefixed with its parent
/// directory (`day1_IMG_1`); names still shared after that get `_2`,
/// `_3`, ... in input order.
pub fn output_stems(files: &[PathBuf]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for f in files {
        *counts.entry(name_key(&file_stem(f), f)).or_default() += 1;
    }

    let stems: Vec<String> = files
        .iter()
        .map(|f| {
            let stem = file_stem(f);
            if counts[&name_key(&stem, f)] < 2 {
                return stem;
            }
            match f.parent().and_then(Path::file_name) {
                Some(dir) => format!("{}_{stem}", dir.to_string_lossy()),
                None => stem,
            }
        })
        .collect();

    let mut used: HashSet<String> = HashSet::new();
    files
        .iter()
        .zip(stems)
        .map(|(f, stem)| {
            let mut candidate = stem.clone();
            let mut n = 2;
            while !used.insert(name_key(&candidate, f)) {
                candidate = format!("{stem}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

/// `<out_dir>/<stem>_<suffix>.<ext>`, keeping the input extension.
pub fn output_path(out_dir: &Path, stem: &str, input: &Path, suffix: &str) -> PathBuf {
    let name = match input.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}.png"),
    };
    out_dir.join(name)
}

fn write(img: &image::RgbImage, path: PathBuf, dpi: u32) -> Result<PathBuf, ImageFailure> {
    match save_with_dpi(img, &path, dpi) {
        Ok(()) => Ok(path),
        Err(source) => Err(ImageFailure::Write { path, source }),
    }
}

/// Calibrate one image and write its outputs under `stem`.
pub fn process_file(
    pipeline: &CalibrationPipeline,
    input: &Path,
    stem: &str,
    out_dir: &Path,
) -> Result<ImageReport, ImageFailure> {
    let img = image::open(input).map_err(ImageFailure::Read)?;
    let dpi = read_dpi(input).unwrap_or(DEFAULT_DPI);
    let result = pipeline.process_dynamic(&img)?;

    let output = write(
        &result.image,
        output_path(out_dir, stem, input, "calibrated"),
        dpi,
    )?;
    let debug = match &result.debug {
        Some(overlay) => Some(write(
            overlay,
            output_path(out_dir, stem, input, "debug"),
            dpi,
        )?),
        None => None,
    };

    Ok(ImageReport {
        marker_id: result.selected.id,
        px_per_unit: result.estimate.scale.px_per_unit(),
        dpi,
        output,
        debug,
    })
}

/// Process every file in parallel; results come back in input order.
pub fn process_all(
    pipeline: &CalibrationPipeline,
    files: &[PathBuf],
    out_dir: &Path,
) -> Vec<Result<ImageReport, ImageFailure>> {
    let stems = output_stems(files);
    files
        .par_iter()
        .zip(stems.par_iter())
        .map(|(path, stem)| process_file(pipeline, path, stem, out_dir))
        .collect()
}
