extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn lists_every_kernel() {
    Command::cargo_bin("mandelfield")
        .unwrap()
        .arg("kernels")
        .assert()
        .success()
        .stdout(predicate::str::contains("scalar"))
        .stdout(predicate::str::contains("avx2"))
        .stdout(predicate::str::contains("block"));
}

#[test]
fn kernels_reports_lane_mismatches_for_the_grid() {
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["kernels", "-s", "12x4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scalar   1 lanes  usable"))
        .stdout(predicate::str::contains("block    8 lanes  grid width 12 is not a multiple of 8"))
        .stdout(predicate::str::contains("usable at this size"));
}

#[test]
fn render_writes_a_pixmap() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("field.ppm");
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["render", "-s", "64x48", "-i", "50", "-k", "block", "-c", "-0.5,0"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let bytes = fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"P6"));
    // Header plus three bytes per cell.
    assert!(bytes.len() > 64 * 48 * 3);
}

#[test]
fn render_rejects_a_lane_mismatch() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("field.ppm");
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["render", "-s", "12x12", "-k", "block"])
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a multiple of 8"));
    assert!(!out.exists());
}

#[test]
fn unknown_kernel_is_a_usage_error() {
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["render", "-k", "neon", "-o", "x.ppm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown kernel"));
}

#[test]
fn headless_view_runs_and_saves_the_last_frame() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("last.ppm");
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&[
            "view", "-s", "64x48", "-i", "32", "-f", "12", "--switch-every", "4", "--zoom", "1",
        ])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read(&out).unwrap().starts_with(b"P6"));
}

#[test]
fn view_outlives_zooming_past_float_precision() {
    // Eight zoom steps a frame drive the span to zero within 40 frames.
    Command::cargo_bin("mandelfield")
        .unwrap()
        .env("RUST_LOG", "warn")
        .args(&["view", "-s", "64x48", "-i", "16", "-f", "40", "--zoom", "8"])
        .assert()
        .success()
        .stderr(predicate::str::contains("staying put"));
}

#[test]
fn view_outlives_zooming_out_to_infinity() {
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["view", "-s", "64x48", "-i", "16", "-f", "40", "--zoom", "-8"])
        .assert()
        .success();
}

#[test]
fn bench_reports_a_summary() {
    Command::cargo_bin("mandelfield")
        .unwrap()
        .args(&["bench", "-s", "16x16", "-i", "8", "-k", "scalar", "-m", "3", "-v", "1000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Time avg"));
}
