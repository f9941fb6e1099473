//! calib-grid CLI: calibrated grid overlays, printable markers, scale checks.

mod batch;
mod dpi;
mod print;

use calib_grid::aruco::{dictionary_by_name, ArucoDetector, DetectorError, DEFAULT_DICTIONARY};
use calib_grid::core::Marker;
use calib_grid::{
    estimate_scale, gray_view, select_marker, CalibrationConfig, CalibrationError,
    CalibrationPipeline, ConfigError, ConfigIoError, ScaleEstimate, SelectionPolicy,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("config file: {0}")]
    ConfigFile(#[from] ConfigIoError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Print(#[from] print::PrintError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("--calibrate-size is required unless --config provides it")]
    MissingMarkerSize,
    #[error("no supported images found")]
    NoImages,
    #[error("{failed} of {total} image(s) failed")]
    Failures { failed: usize, total: usize },
}

impl From<DetectorError> for CliError {
    fn from(err: DetectorError) -> Self {
        Self::Config(err.into())
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "calib-grid")]
#[command(about = "Overlay physically scaled grids on photos using a printed ArUco marker")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw calibrated grids on a batch of photos.
    Grid(GridArgs),

    /// Generate a printable marker PNG.
    Marker(MarkerArgs),

    /// Detect the marker in one photo and report the scale.
    Verify(VerifyArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SelectionArg {
    Largest,
    Unique,
}

impl From<SelectionArg> for SelectionPolicy {
    fn from(arg: SelectionArg) -> Self {
        match arg {
            SelectionArg::Largest => SelectionPolicy::Largest,
            SelectionArg::Unique => SelectionPolicy::Unique,
        }
    }
}

/// Options shared by every command that calibrates a photo.
#[derive(Debug, Clone, Args)]
struct CalibrationArgs {
    /// JSON configuration; flags given here override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Printed marker side length, in `--unit`.
    #[arg(long)]
    calibrate_size: Option<f64>,

    /// Physical unit name used in labels.
    #[arg(long)]
    unit: Option<String>,

    /// Calibrate from this marker id only.
    #[arg(long)]
    target_id: Option<u32>,

    /// Which marker to use when several are detected.
    #[arg(long, value_enum)]
    selection: Option<SelectionArg>,

    /// Marker dictionary name.
    #[arg(long)]
    dictionary: Option<String>,
}

impl CalibrationArgs {
    fn load(&self) -> CliResult<CalibrationConfig> {
        let mut cfg = match (&self.config, self.calibrate_size) {
            (Some(path), _) => CalibrationConfig::load_json(path)?,
            (None, Some(size)) => CalibrationConfig::new(size),
            (None, None) => return Err(CliError::MissingMarkerSize),
        };
        if let Some(size) = self.calibrate_size {
            cfg.calibrate_size = size;
        }
        if let Some(unit) = &self.unit {
            cfg.unit = unit.clone();
        }
        if let Some(id) = self.target_id {
            cfg.target_id = Some(id);
        }
        if let Some(selection) = self.selection {
            cfg.selection = selection.into();
        }
        if let Some(dictionary) = &self.dictionary {
            cfg.detector.dictionary = dictionary.clone();
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Args)]
struct GridArgs {
    /// Image files or directories of images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the annotated images.
    #[arg(short, long, default_value = "calibrated")]
    out_dir: PathBuf,

    #[command(flatten)]
    calibration: CalibrationArgs,

    /// Grid spacing, in `--unit`.
    #[arg(long)]
    spacing: Option<f64>,

    /// Grid line width in pixels.
    #[arg(long)]
    line_width: Option<u32>,

    /// Grid color: red, green, blue, black or white.
    #[arg(long)]
    color: Option<String>,

    /// Text drawn top-right as `Weight: ...`.
    #[arg(long)]
    weight: Option<String>,

    /// Text drawn top-left as `Camera: ...`.
    #[arg(long)]
    viewpoint: Option<String>,

    /// Text drawn bottom-right, e.g. a capture date.
    #[arg(long)]
    stamp: Option<String>,

    /// Omit distance labels along the top edge.
    #[arg(long)]
    no_axis_labels: bool,

    /// Omit the px/unit label.
    #[arg(long)]
    no_calibration_label: bool,

    /// Also write `<name>_debug` detection overlays.
    #[arg(long)]
    debug: bool,

    /// Exit with an error if any image fails.
    #[arg(long)]
    strict: bool,

    /// Worker threads (default: all cores).
    #[arg(long)]
    threads: Option<usize>,
}

impl GridArgs {
    fn to_config(&self) -> CliResult<CalibrationConfig> {
        let mut cfg = self.calibration.load()?;
        if let Some(spacing) = self.spacing {
            cfg.spacing = spacing;
        }
        if let Some(width) = self.line_width {
            cfg.line_width = width;
        }
        if let Some(color) = &self.color {
            cfg.color = color.clone();
        }
        if self.weight.is_some() {
            cfg.weight = self.weight.clone();
        }
        if self.viewpoint.is_some() {
            cfg.viewpoint = self.viewpoint.clone();
        }
        if self.stamp.is_some() {
            cfg.stamp = self.stamp.clone();
        }
        if self.no_axis_labels {
            cfg.axis_labels = false;
        }
        if self.no_calibration_label {
            cfg.calibration_label = false;
        }
        if self.debug {
            cfg.debug = true;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Args)]
struct MarkerArgs {
    /// Marker id.
    #[arg(long, default_value_t = 0)]
    id: u32,

    /// Printed side of the black border, in centimeters.
    #[arg(long, default_value_t = 10.0)]
    size: f64,

    /// Print resolution.
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Marker dictionary name.
    #[arg(long, default_value = DEFAULT_DICTIONARY)]
    dictionary: String,

    /// Output PNG path.
    #[arg(short, long, default_value = "aruco_marker.png")]
    output: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct VerifyArgs {
    /// Photo containing the marker.
    image: PathBuf,

    #[command(flatten)]
    calibration: CalibrationArgs,

    /// Print a JSON report instead of text.
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Warn,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    init_logging(level);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter) {
    let _ = calib_grid::core::init_with_level(level);
}

#[cfg(feature = "tracing")]
fn init_logging(_level: LevelFilter) {
    calib_grid::core::init_tracing(false);
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Grid(args) => run_grid(&args),
        Commands::Marker(args) => run_marker(&args),
        Commands::Verify(args) => run_verify(&args),
    }
}

// ── grid ───────────────────────────────────────────────────────────────

fn run_grid(args: &GridArgs) -> CliResult<()> {
    // Configuration errors are fatal and reported before any image is read.
    let pipeline = CalibrationPipeline::new(args.to_config()?)?;
    let cfg = pipeline.config();

    let files = batch::discover_images(&args.inputs).map_err(|err| CliError::Io {
        path: err.path,
        source: err.source,
    })?;
    if files.is_empty() {
        return Err(CliError::NoImages);
    }
    std::fs::create_dir_all(&args.out_dir).map_err(|source| CliError::Io {
        path: args.out_dir.clone(),
        source,
    })?;

    log::info!(
        "processing {} image(s): marker {} {}, grid every {} {}",
        files.len(),
        cfg.calibrate_size,
        cfg.unit,
        cfg.spacing,
        cfg.unit
    );

    let results = match args.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(|| batch::process_all(&pipeline, &files, &args.out_dir)),
        None => batch::process_all(&pipeline, &files, &args.out_dir),
    };

    let mut failed = 0usize;
    for (path, result) in files.iter().zip(&results) {
        match result {
            Ok(report) => {
                log::info!(
                    "{}: marker {} at {:.2} px/{} -> {} ({} dpi)",
                    path.display(),
                    report.marker_id,
                    report.px_per_unit,
                    cfg.unit,
                    report.output.display(),
                    report.dpi
                );
                if let Some(debug) = &report.debug {
                    log::info!("{}: debug overlay -> {}", path.display(), debug.display());
                }
            }
            Err(err) => {
                failed += 1;
                log::warn!("{}: skipped: {err}", path.display());
            }
        }
    }

    let total = files.len();
    println!(
        "processed {} of {} image(s), {} failed; output in {}",
        total - failed,
        total,
        failed,
        args.out_dir.display()
    );

    if args.strict && failed > 0 {
        return Err(CliError::Failures { failed, total });
    }
    Ok(())
}

// ── marker ─────────────────────────────────────────────────────────────

fn run_marker(args: &MarkerArgs) -> CliResult<()> {
    let dict = dictionary_by_name(&args.dictionary)?;
    let marker = print::printable_marker(&dict, args.id, args.size, args.dpi)?;
    print::write_png_with_dpi(&args.output, &marker.image, marker.dpi)?;

    println!("marker {} ({}) -> {}", args.id, dict.name, args.output.display());
    println!(
        "  border side: {} px = {:.3} cm at {} dpi",
        marker.marker_px, marker.printed_cm, marker.dpi
    );
    println!(
        "  image size:  {}x{} px (white quiet zone included)",
        marker.image.width, marker.image.height
    );
    println!(
        "  print at 100% scale and pass --calibrate-size {:.3} (unit cm)",
        marker.printed_cm
    );
    Ok(())
}

// ── verify ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct VerifyReport<'a> {
    markers: &'a [Marker],
    estimate: &'a ScaleEstimate,
    unit: &'a str,
}

fn run_verify(args: &VerifyArgs) -> CliResult<()> {
    let cfg = args.calibration.load()?;
    let size = cfg.marker_size()?;
    let detector = ArucoDetector::new(cfg.detector.clone())?;

    let img = image::open(&args.image).map_err(|source| CliError::Image {
        path: args.image.clone(),
        source,
    })?;
    let gray = img.to_luma8();
    let markers = detector.detect(&gray_view(&gray));
    let selected = select_marker(&markers, cfg.target_id, cfg.selection)?;
    let estimate = estimate_scale(selected, size)?;

    if args.json {
        let report = VerifyReport {
            markers: &markers,
            estimate: &estimate,
            unit: &cfg.unit,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let ids: Vec<u32> = markers.iter().map(|m| m.id).collect();
    let px = estimate.scale.px_per_unit();
    println!("{}: detected marker id(s) {:?}", args.image.display(), ids);
    println!("  selected:     {}", estimate.marker_id);
    println!(
        "  sides:        {:.2} {:.2} {:.2} {:.2} px (mean {:.2})",
        estimate.side_lengths_px[0],
        estimate.side_lengths_px[1],
        estimate.side_lengths_px[2],
        estimate.side_lengths_px[3],
        estimate.mean_side_px
    );
    println!("  scale:        {:.4} px/{}", px, cfg.unit);
    println!("  1 {} = {:.2} px", cfg.unit, estimate.scale.to_pixels(1.0));
    println!(
        "  100 px = {:.3} {}",
        estimate.scale.to_units(100.0),
        cfg.unit
    );
    println!(
        "  grid of {} {} = {:.2} px",
        cfg.spacing,
        cfg.unit,
        estimate.scale.to_pixels(cfg.spacing)
    );
    Ok(())
}
