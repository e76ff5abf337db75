use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a generated three-page 300x400 PDF into a fresh temp dir. The dir
/// guard must stay alive for the returned path to remain valid.
fn fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("primer.pdf");
    fs::write(&path, marginalia_engine::test_pdf::pdf_with_pages(3, 300, 400))
        .expect("fixture PDF should be written");
    (dir, path)
}

fn write_sidecar(dir: &Path, records: &str) -> PathBuf {
    let path = dir.join("annotations.json");
    fs::write(&path, records).expect("sidecar should be written");
    path
}

const HIGHLIGHT_SIDECAR: &str = r##"[
  {
    "id": "7f2f8d3e-9f6a-4f6e-8a93-0d3f1d6b2c11",
    "kind": "highlight",
    "page": 1,
    "color": "#fef08a",
    "created_at": "2026-03-01T10:00:00Z",
    "text": "selected passage",
    "rect": { "x": 100.0, "y": 150.0, "width": 40.0, "height": 20.0 }
  }
]"##;

#[test]
fn info_emits_stable_json_contract() {
    let (_dir, pdf) = fixture();

    let output = cargo_bin_cmd!("marginalia")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut value: Value =
        serde_json::from_slice(&output).expect("stdout should contain valid json");
    value["path"] = Value::String("<FIXTURE>".to_owned());

    insta::assert_json_snapshot!("cli_info_fixture_pdf", value);
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("marginalia")
        .arg("info")
        .arg("missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("invalid.pdf");
    fs::write(&path, b"not a pdf at all").expect("fixture should be written");

    cargo_bin_cmd!("marginalia")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn import_prints_catalogue_records() {
    let (_dir, pdf) = fixture();

    let output = cargo_bin_cmd!("marginalia")
        .arg("import")
        .arg(&pdf)
        .env_remove("MARGINALIA_AI_API_KEY")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut value: Value =
        serde_json::from_slice(&output).expect("stdout should contain valid json");
    for record in value.as_array_mut().expect("records should be an array") {
        record["id"] = Value::String("<ID>".to_owned());
        record["added_at"] = Value::String("<TIMESTAMP>".to_owned());
        record["size"] = Value::String("<SIZE>".to_owned());
    }

    insta::assert_json_snapshot!("cli_import_catalogue", value);
}

#[test]
fn import_skips_files_that_cannot_be_read() {
    let (dir, pdf) = fixture();
    let garbage = dir.path().join("broken.pdf");
    fs::write(&garbage, b"not a pdf").expect("fixture should be written");

    let output = cargo_bin_cmd!("marginalia")
        .arg("import")
        .arg(&garbage)
        .arg(dir.path().join("never-existed.pdf"))
        .arg(&pdf)
        .env_remove("MARGINALIA_AI_API_KEY")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    let records = value.as_array().expect("records should be an array");
    assert_eq!(records.len(), 1, "only the readable PDF should be catalogued");
    assert_eq!(records[0]["name"], "primer");
}

#[test]
fn import_writes_covers_when_asked() {
    let (dir, pdf) = fixture();
    let covers = dir.path().join("covers");

    cargo_bin_cmd!("marginalia")
        .arg("import")
        .arg(&pdf)
        .arg("--covers")
        .arg(&covers)
        .env_remove("MARGINALIA_AI_API_KEY")
        .assert()
        .success();

    let entries: Vec<_> = fs::read_dir(&covers)
        .expect("covers dir should exist")
        .map(|entry| entry.expect("dir entry should be readable").path())
        .collect();
    assert_eq!(entries.len(), 1, "one cover per imported book");

    let cover = image::open(&entries[0]).expect("cover should be a readable image");
    assert_eq!((cover.width(), cover.height()), (600, 800));
}

#[test]
fn render_writes_png_file() {
    let (dir, pdf) = fixture();
    let output_path = dir.path().join("page.png");

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("2")
        .arg("--zoom")
        .arg("1.0")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("page.png"));

    let image = image::open(&output_path).expect("page should be a readable image");
    assert_eq!((image.width(), image.height()), (300, 400));
}

#[test]
fn render_scales_the_frame_by_zoom() {
    let (dir, pdf) = fixture();
    let output_path = dir.path().join("zoomed.png");

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("1")
        .arg("--zoom")
        .arg("2.0")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("page should be a readable image");
    assert_eq!((image.width(), image.height()), (600, 800));
}

#[test]
fn render_composites_sidecar_annotations() {
    let (dir, pdf) = fixture();
    let sidecar = write_sidecar(dir.path(), HIGHLIGHT_SIDECAR);
    let output_path = dir.path().join("annotated.png");

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("1")
        .arg("--zoom")
        .arg("1.0")
        .arg("--annotations")
        .arg(&sidecar)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("page should be a readable image").into_rgba8();
    // Inside the highlight rect: white blended with the #fef08a tint.
    assert_eq!(image.get_pixel(110, 155), &image::Rgba([254, 247, 196, 255]));
    // Just above the rect: untouched page background.
    assert_eq!(image.get_pixel(110, 130), &image::Rgba([255, 255, 255, 255]));
}

#[test]
fn render_skips_sidecar_records_with_broken_geometry() {
    let (dir, pdf) = fixture();
    let sidecar = write_sidecar(
        dir.path(),
        r##"[
          {
            "id": "7f2f8d3e-9f6a-4f6e-8a93-0d3f1d6b2c11",
            "kind": "highlight",
            "page": 1,
            "color": "#fef08a",
            "created_at": "2026-03-01T10:00:00Z",
            "text": "selected passage",
            "rect": { "x": 100.0, "y": 150.0, "width": 40.0, "height": 20.0 }
          },
          {
            "id": "9b1c6a2d-3e4f-4a5b-8c7d-6e5f4a3b2c1d",
            "kind": "draw",
            "page": 1,
            "color": "#ef4444",
            "created_at": "2026-03-01T10:01:00Z",
            "path": [{ "x": 10.0, "y": 10.0 }]
          }
        ]"##,
    );
    let output_path = dir.path().join("filtered.png");

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("1")
        .arg("--zoom")
        .arg("1.0")
        .arg("--annotations")
        .arg(&sidecar)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    // The valid highlight still lands; the one-point stroke is dropped.
    let image = image::open(&output_path).expect("page should be a readable image").into_rgba8();
    assert_eq!(image.get_pixel(110, 155), &image::Rgba([254, 247, 196, 255]));
}

#[test]
fn render_rejects_page_zero() {
    let (_dir, pdf) = fixture();

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn render_rejects_out_of_range_pages() {
    let (_dir, pdf) = fixture();

    cargo_bin_cmd!("marginalia")
        .arg("render")
        .arg(&pdf)
        .arg("--page")
        .arg("9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn export_writes_annotated_copy_next_to_the_source() {
    let (dir, pdf) = fixture();
    let sidecar = write_sidecar(dir.path(), HIGHLIGHT_SIDECAR);

    cargo_bin_cmd!("marginalia")
        .arg("export")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&sidecar)
        .assert()
        .success()
        .stdout(predicate::str::contains("primer_Annotated.pdf"));

    let annotated = dir.path().join("primer_Annotated.pdf");
    let document =
        lopdf::Document::load(&annotated).expect("annotated copy should be a readable PDF");
    // Three source pages plus the appended notes summary page.
    assert_eq!(document.get_pages().len(), 4);
}

#[test]
fn export_honors_the_output_directory() {
    let (dir, pdf) = fixture();
    let sidecar = write_sidecar(dir.path(), HIGHLIGHT_SIDECAR);
    let out = dir.path().join("exports");

    cargo_bin_cmd!("marginalia")
        .arg("export")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&sidecar)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("primer_Annotated.pdf").exists(), "annotated copy should land in --output");
}

#[test]
fn export_rejects_a_malformed_sidecar() {
    let (dir, pdf) = fixture();
    let sidecar = write_sidecar(dir.path(), "not json");

    cargo_bin_cmd!("marginalia")
        .arg("export")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&sidecar)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid annotation sidecar"));
}

#[test]
fn research_fails_cleanly_without_a_key() {
    cargo_bin_cmd!("marginalia")
        .arg("research")
        .arg("history of marginalia")
        .env_remove("MARGINALIA_AI_API_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn version_prints_the_crate_version() {
    cargo_bin_cmd!("marginalia")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
