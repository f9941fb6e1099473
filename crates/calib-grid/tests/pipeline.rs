use approx::assert_relative_eq;
use calib_grid::aruco::{dictionary_by_name, draw_marker, DEFAULT_DICTIONARY};
use calib_grid::core::{filled_gray, GrayImage, GrayImageView, Marker};
use calib_grid::{
    CalibrationConfig, CalibrationError, CalibrationPipeline, ConfigError, MarkerDetector,
    SelectionPolicy,
};
use image::{DynamicImage, Rgb, RgbImage};
use nalgebra::Point2;

const RED: [u8; 3] = [255, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];

fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width as u32, gray.height as u32, |x, y| {
        let v = gray.data[y as usize * gray.width + x as usize];
        Rgb([v, v, v])
    })
}

/// White photo with one axis-aligned marker of `side` pixels.
fn photo_with_marker(id: u32, x0: f32, y0: f32, side: f32) -> RgbImage {
    let dict = dictionary_by_name(DEFAULT_DICTIONARY).unwrap();
    let mut canvas = filled_gray(400, 300, 255);
    let corners = [
        Point2::new(x0, y0),
        Point2::new(x0 + side, y0),
        Point2::new(x0 + side, y0 + side),
        Point2::new(x0, y0 + side),
    ];
    draw_marker(&mut canvas, &dict, id, &corners).unwrap();
    to_rgb(&canvas)
}

fn bare_config(calibrate_size: f64) -> CalibrationConfig {
    let mut cfg = CalibrationConfig::new(calibrate_size);
    cfg.axis_labels = false;
    cfg.calibration_label = false;
    cfg
}

struct FixedMarkers(Vec<Marker>);

impl MarkerDetector for FixedMarkers {
    fn detect(&self, _img: &GrayImageView<'_>) -> Vec<Marker> {
        self.0.clone()
    }
}

fn square(id: u32, x0: f32, side: f32) -> Marker {
    Marker::from_corners(
        id,
        [
            Point2::new(x0, 10.0),
            Point2::new(x0 + side, 10.0),
            Point2::new(x0 + side, 10.0 + side),
            Point2::new(x0, 10.0 + side),
        ],
    )
}

#[test]
fn scale_matches_drawn_marker_side() {
    let photo = photo_with_marker(7, 99.5, 49.5, 200.0);
    let pipeline = CalibrationPipeline::new(bare_config(4.0)).unwrap();
    let out = pipeline.process(&photo).unwrap();

    assert_eq!(out.selected.id, 7);
    assert_eq!(out.markers.len(), 1);
    assert_relative_eq!(out.estimate.scale.px_per_unit(), 50.0, max_relative = 0.01);
    assert_relative_eq!(out.estimate.mean_side_px, 200.0, max_relative = 0.01);
    assert!(out.debug.is_none());
}

#[test]
fn grid_lines_follow_the_estimated_scale() {
    let photo = photo_with_marker(7, 99.5, 49.5, 200.0);
    let mut cfg = bare_config(4.0);
    cfg.spacing = 1.0;
    cfg.line_width = 1;
    cfg.color = "red".into();
    let out = CalibrationPipeline::new(cfg).unwrap().process(&photo).unwrap();

    // 50 px per unit; row 275 lies below the marker.
    for x in (0..400).step_by(50) {
        assert_eq!(out.image.get_pixel(x, 275).0, RED, "column {x}");
        assert_eq!(out.image.get_pixel(x + 25, 275).0, WHITE, "column {}", x + 25);
    }
    for y in (0..300).step_by(50) {
        assert_eq!(out.image.get_pixel(375, y).0, RED, "row {y}");
    }
    assert_eq!(out.image.get_pixel(375, 274).0, WHITE);
}

#[test]
fn runs_are_byte_identical() {
    let photo = photo_with_marker(12, 80.5, 40.5, 180.0);
    let mut cfg = CalibrationConfig::new(9.0);
    cfg.weight = Some("71 kg".into());
    cfg.viewpoint = Some("side".into());
    cfg.debug = true;
    let pipeline = CalibrationPipeline::new(cfg).unwrap();

    let a = pipeline.process(&photo).unwrap();
    let b = pipeline.process(&photo).unwrap();
    assert_eq!(a.image.as_raw(), b.image.as_raw());
    assert_eq!(a.debug, b.debug);
    assert!(a.debug.is_some());

    let c = pipeline
        .process_dynamic(&DynamicImage::ImageRgb8(photo.clone()))
        .unwrap();
    assert_eq!(a.image, c.image);
}

#[test]
fn blank_photo_has_no_marker() {
    let blank = RgbImage::from_pixel(320, 240, Rgb([200, 200, 200]));
    let pipeline = CalibrationPipeline::new(CalibrationConfig::new(10.0)).unwrap();
    assert_eq!(
        pipeline.process(&blank).unwrap_err(),
        CalibrationError::NoMarkerFound
    );
}

#[test]
fn bad_configuration_fails_before_any_image() {
    for size in [0.0, -3.0] {
        assert!(matches!(
            CalibrationPipeline::new(CalibrationConfig::new(size)).unwrap_err(),
            ConfigError::NonPositiveMarkerSize { .. }
        ));
    }

    let mut cfg = CalibrationConfig::new(10.0);
    cfg.color = "purple".into();
    assert_eq!(
        CalibrationPipeline::new(cfg).unwrap_err(),
        ConfigError::UnknownColor {
            name: "purple".into()
        }
    );

    let mut cfg = CalibrationConfig::new(10.0);
    cfg.target_id = Some(250);
    assert_eq!(
        CalibrationPipeline::new(cfg).unwrap_err(),
        ConfigError::TargetIdOutOfRange { id: 250, count: 250 }
    );

    let mut cfg = CalibrationConfig::new(10.0);
    cfg.detector.dictionary = "DICT_NOPE".into();
    assert!(matches!(
        CalibrationPipeline::new(cfg).unwrap_err(),
        ConfigError::UnknownDictionary { .. }
    ));
}

#[test]
fn degenerate_detection_is_reported_per_image() {
    let mut flat = square(4, 10.0, 50.0);
    flat.corners[2] = flat.corners[1];
    let pipeline =
        CalibrationPipeline::with_detector(CalibrationConfig::new(5.0), FixedMarkers(vec![flat]))
            .unwrap();
    let photo = RgbImage::new(100, 100);
    assert!(matches!(
        pipeline.process(&photo).unwrap_err(),
        CalibrationError::InvalidMarkerGeometry { .. }
    ));
}

#[test]
fn selection_policy_applies_to_several_markers() {
    let markers = vec![square(2, 10.0, 40.0), square(5, 100.0, 80.0)];
    let photo = RgbImage::from_pixel(300, 200, Rgb(WHITE));

    let largest =
        CalibrationPipeline::with_detector(CalibrationConfig::new(4.0), FixedMarkers(markers.clone()))
            .unwrap();
    let out = largest.process(&photo).unwrap();
    assert_eq!(out.selected.id, 5);
    assert_relative_eq!(out.estimate.scale.px_per_unit(), 20.0);

    let mut cfg = CalibrationConfig::new(4.0);
    cfg.selection = SelectionPolicy::Unique;
    let unique = CalibrationPipeline::with_detector(cfg, FixedMarkers(markers.clone())).unwrap();
    assert_eq!(
        unique.process(&photo).unwrap_err(),
        CalibrationError::AmbiguousMarkerSelection { ids: vec![2, 5] }
    );

    let mut cfg = CalibrationConfig::new(4.0);
    cfg.target_id = Some(2);
    let target = CalibrationPipeline::with_detector(cfg, FixedMarkers(markers.clone())).unwrap();
    assert_eq!(target.process(&photo).unwrap().selected.id, 2);

    let mut cfg = CalibrationConfig::new(4.0);
    cfg.target_id = Some(9);
    let missing = CalibrationPipeline::with_detector(cfg, FixedMarkers(markers)).unwrap();
    assert_eq!(
        missing.process(&photo).unwrap_err(),
        CalibrationError::TargetMarkerMissing {
            target_id: 9,
            detected: vec![2, 5]
        }
    );
}

#[test]
fn too_small_scale_is_too_dense() {
    let tiny = Marker::from_corners(
        1,
        [
            Point2::new(10.0, 10.0),
            Point2::new(12.0, 10.0),
            Point2::new(12.0, 12.0),
            Point2::new(10.0, 12.0),
        ],
    );
    let mut cfg = CalibrationConfig::new(100.0);
    cfg.spacing = 1.0;
    let pipeline = CalibrationPipeline::with_detector(cfg, FixedMarkers(vec![tiny])).unwrap();
    let err = pipeline.process(&RgbImage::new(50, 50)).unwrap_err();
    assert!(matches!(err, CalibrationError::GridTooDense { .. }));
}
