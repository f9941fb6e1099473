use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn calib_grid() -> Command {
    Command::cargo_bin("calib-grid").unwrap()
}

/// 1 cm at 300 dpi: 15 px cells, 120 px border, 180 px image.
fn write_marker(path: &Path) {
    calib_grid()
        .args(["marker", "--id", "0", "--size", "1", "--dpi", "300", "--output"])
        .arg(path)
        .assert()
        .success()
        .stdout(predicate::str::contains("border side: 120 px"));
}

fn write_blank(path: &Path) {
    image::RgbImage::from_pixel(160, 120, image::Rgb([180, 180, 180]))
        .save(path)
        .unwrap();
}

#[test]
fn marker_command_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.png");
    write_marker(&path);
    let img = image::open(&path).unwrap();
    assert_eq!((img.width(), img.height()), (180, 180));
}

#[test]
fn marker_id_outside_dictionary_fails() {
    let dir = tempfile::tempdir().unwrap();
    calib_grid()
        .args(["marker", "--id", "250", "--output"])
        .arg(dir.path().join("m.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("250"));
}

#[test]
fn grid_processes_batch_and_skips_failures() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = dir.path().join("in");
    let out = dir.path().join("out");
    std::fs::create_dir(&inputs).unwrap();
    write_marker(&inputs.join("m.png"));
    write_blank(&inputs.join("blank.png"));

    calib_grid()
        .args(["grid", "--calibrate-size", "1", "--spacing", "0.5", "--debug", "--out-dir"])
        .arg(&out)
        .arg(&inputs)
        .assert()
        .success()
        .stdout(predicate::str::contains("processed 1 of 2 image(s), 1 failed"))
        .stderr(predicate::str::contains("no calibration marker found"));

    assert!(out.join("m_calibrated.png").is_file());
    assert!(out.join("m_debug.png").is_file());
    assert!(!out.join("blank_calibrated.png").exists());

    let grid = image::open(out.join("m_calibrated.png")).unwrap().to_rgb8();
    assert_eq!(grid.dimensions(), (180, 180));
}

#[test]
fn same_named_inputs_get_distinct_outputs_with_input_dpi() {
    let dir = tempfile::tempdir().unwrap();
    let day1 = dir.path().join("day1");
    let day2 = dir.path().join("day2");
    let out = dir.path().join("out");
    std::fs::create_dir(&day1).unwrap();
    std::fs::create_dir(&day2).unwrap();
    write_marker(&day1.join("m.png"));
    write_marker(&day2.join("m.png"));

    calib_grid()
        .args(["grid", "--calibrate-size", "1", "--out-dir"])
        .arg(&out)
        .arg(&day1)
        .arg(&day2)
        .assert()
        .success()
        .stdout(predicate::str::contains("processed 2 of 2 image(s), 0 failed"));

    for name in ["day1_m_calibrated.png", "day2_m_calibrated.png"] {
        let path = out.join(name);
        assert!(path.is_file(), "{name} missing");
        // The marker PNG is written at 300 dpi; the grid output keeps it.
        let file = std::io::BufReader::new(std::fs::File::open(&path).unwrap());
        let reader = png::Decoder::new(file).read_info().unwrap();
        let dims = reader.info().pixel_dims.expect("pHYs chunk");
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }
    assert!(!out.join("m_calibrated.png").exists());
}

#[test]
fn strict_mode_fails_on_any_skipped_image() {
    let dir = tempfile::tempdir().unwrap();
    let blank = dir.path().join("blank.png");
    write_blank(&blank);

    calib_grid()
        .args(["grid", "--calibrate-size", "10", "--strict", "--out-dir"])
        .arg(dir.path().join("out"))
        .arg(&blank)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 image(s) failed"));
}

#[test]
fn invalid_configuration_stops_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let blank = dir.path().join("blank.png");
    write_blank(&blank);
    let out = dir.path().join("out");

    calib_grid()
        .args(["grid", "--calibrate-size", "10", "--color", "purple", "--out-dir"])
        .arg(&out)
        .arg(&blank)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown grid color"));
    assert!(!out.exists());

    calib_grid()
        .args(["grid", "--calibrate-size", "0"])
        .arg(&blank)
        .assert()
        .failure()
        .stderr(predicate::str::contains("marker size must be a positive"));

    calib_grid()
        .arg("grid")
        .arg(&blank)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--calibrate-size is required"));
}

#[test]
fn config_file_is_overridden_by_flags() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("m.png");
    write_marker(&marker);
    let cfg = dir.path().join("cfg.json");
    std::fs::write(&cfg, r#"{"calibrate_size": 2, "unit": "in"}"#).unwrap();

    calib_grid()
        .args(["verify", "--config"])
        .arg(&cfg)
        .args(["--calibrate-size", "1"])
        .arg(&marker)
        .assert()
        .success()
        .stdout(predicate::str::contains("selected:     0"))
        .stdout(predicate::str::contains("px/in"));
}

#[test]
fn verify_reports_json() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("m.png");
    write_marker(&marker);

    let output = calib_grid()
        .args(["verify", "--calibrate-size", "1", "--json"])
        .arg(&marker)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["estimate"]["marker_id"], 0);
    let px = report["estimate"]["scale"].as_f64().unwrap();
    assert!((px - 120.0).abs() < 1.2, "scale {px}");
    assert_eq!(report["unit"], "cm");
}
