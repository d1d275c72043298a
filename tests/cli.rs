use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{DynamicImage, Rgba, RgbaImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn imgbatch() -> Command {
    let mut cmd = Command::cargo_bin("imgbatch").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_png(path: &Path, width: u32, height: u32) {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 120, 240, 255])))
        .save(path)
        .unwrap();
}

fn scenario() -> TempDir {
    let input = TempDir::new().unwrap();
    write_png(&input.path().join("a.png"), 100, 100);
    fs::write(input.path().join("b.txt"), "hello").unwrap();
    fs::write(input.path().join("c.png"), b"corrupted bytes").unwrap();
    input
}

#[test]
fn batch_with_a_failure_exits_nonzero_and_prints_summary() {
    let input = scenario();
    let output = TempDir::new().unwrap();

    imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .args(["--scale", "0.5", "--format", "JPG", "--threads", "1"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Processing 2 images..."))
        .stdout(predicate::str::contains("Using 1 workers"))
        .stdout(predicate::str::contains("b.txt... SKIPPED (unsupported format)"))
        .stdout(predicate::str::contains("a.png... OK"))
        .stdout(predicate::str::contains("c.png... FAILED (failed to decode image"))
        .stdout(predicate::str::contains("Total: 3"))
        .stdout(predicate::str::contains("Success: 1"))
        .stdout(predicate::str::contains("Failed: 1"))
        .stdout(predicate::str::contains("Skipped: 1"));

    let converted = image::open(output.path().join("a.jpg")).unwrap();
    assert_eq!((converted.width(), converted.height()), (50, 50));
}

#[test]
fn clean_batch_exits_zero() {
    let input = TempDir::new().unwrap();
    write_png(&input.path().join("wide.png"), 80, 40);
    write_png(&input.path().join("tall.png"), 30, 90);
    let output = TempDir::new().unwrap();

    imgbatch()
        .arg("-i")
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .args(["--width", "40", "--height", "40", "--format", "webp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed: 0"));

    let wide = image::open(output.path().join("wide.webp")).unwrap();
    assert_eq!((wide.width(), wide.height()), (40, 20));
    let tall = image::open(output.path().join("tall.webp")).unwrap();
    assert_eq!((tall.width(), tall.height()), (13, 40));
}

#[test]
fn large_batch_prints_a_line_for_every_file() {
    let input = TempDir::new().unwrap();
    for i in 0..1500 {
        fs::write(input.path().join(format!("note{:04}.txt", i)), "x").unwrap();
    }
    let output = TempDir::new().unwrap();

    let assert = imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped: 1500"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines = stdout.lines().filter(|line| line.ends_with("SKIPPED (unsupported format)")).count();
    assert_eq!(lines, 1500);
}

#[test]
fn output_directory_is_created_with_parents() {
    let input = TempDir::new().unwrap();
    write_png(&input.path().join("photo.png"), 10, 10);
    let root = TempDir::new().unwrap();
    let output = root.path().join("nested").join("out");

    imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(&output)
        .assert()
        .success();

    assert!(output.join("photo.png").is_file());
    assert!(!output.join(".imgbatch_write_test").exists());
}

#[test]
fn json_summary() {
    let input = scenario();
    let output = TempDir::new().unwrap();

    let assert = imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .args(["--scale", "0.5", "--json"])
        .assert()
        .code(1);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["success"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["skipped"], 1);
}

#[test]
fn contradictory_resize_options_are_rejected_before_any_work() {
    let input = scenario();
    let root = TempDir::new().unwrap();
    let output = root.path().join("out");

    imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(&output)
        .args(["--scale", "0.5", "--width", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));

    assert!(!output.exists());
}

#[test]
fn invalid_option_values_are_configuration_errors() {
    let input = scenario();
    let output = TempDir::new().unwrap();

    for args in [
        vec!["--scale", "-1"],
        vec!["--width", "-20"],
        vec!["--format", "tiff"],
        vec!["--jpeg-quality", "0"],
        vec!["--quality", "101"],
        vec!["--threads", "0"],
    ] {
        imgbatch()
            .arg("--input-dir")
            .arg(input.path())
            .arg("--output-dir")
            .arg(output.path())
            .args(&args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration error"));
    }
}

#[test]
fn missing_input_directory_is_rejected() {
    let root = TempDir::new().unwrap();

    imgbatch()
        .arg("--input-dir")
        .arg(root.path().join("nope"))
        .arg("--output-dir")
        .arg(root.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("input directory does not exist"));
}

#[test]
fn directories_are_required_for_a_batch() {
    imgbatch()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--input-dir and --output-dir are required"));
}

#[test]
fn formats_subcommand_lists_canonical_extensions() {
    imgbatch()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains(".jpg"))
        .stdout(predicate::str::contains("image/webp"));
}

#[test]
fn example_config_round_trips_through_check_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imgbatch.yaml");

    imgbatch()
        .args(["example-config", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.is_file());

    imgbatch()
        .arg("check-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file is valid"));
}

#[test]
fn profile_from_config_file_is_applied() {
    let input = TempDir::new().unwrap();
    write_png(&input.path().join("big.png"), 64, 32);
    let output = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let config = config_dir.path().join("imgbatch.toml");
    fs::write(
        &config,
        "[profiles.tiny]\nformat = \"bmp\"\n\n[profiles.tiny.resize]\nwidth = 16\n",
    )
    .unwrap();

    imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--config")
        .arg(&config)
        .args(["--profile", "tiny"])
        .assert()
        .success();

    let small = image::open(output.path().join("big.bmp")).unwrap();
    assert_eq!((small.width(), small.height()), (16, 8));
}

#[test]
fn unknown_profile_is_rejected() {
    let input = scenario();
    let output = TempDir::new().unwrap();

    imgbatch()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .args(["--profile", "poster"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'poster' not found"));
}
