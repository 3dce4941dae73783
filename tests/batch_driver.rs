// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests for the batch driver, using fake recognition backends so
// no model files are needed.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use scanwerk::batch::{self, FileOutcome};
use scanwerk::config::BatchConfig;
use scanwerk::corrections::CorrectionTable;
use scanwerk::error::{Result, ScanwerkError};
use scanwerk::ocr::engine::{LineBounds, OcrDocument, OcrLine, TextRecognizer};

/// Recognizer returning one canned line per image.
struct FakeRecognizer {
    text: String,
}

impl FakeRecognizer {
    fn saying(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl TextRecognizer for FakeRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<OcrDocument> {
        Ok(OcrDocument {
            width: image.width(),
            height: image.height(),
            lines: vec![OcrLine {
                text: self.text.clone(),
                bounds: LineBounds {
                    x: 2,
                    y: 2,
                    width: 20,
                    height: 8,
                },
            }],
        })
    }
}

/// Recognizer that fails on the first call and succeeds afterwards.
struct FlakyRecognizer {
    calls: Cell<u32>,
}

impl TextRecognizer for FlakyRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<OcrDocument> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == 0 {
            return Err(ScanwerkError::OcrError("inference failed".into()));
        }
        FakeRecognizer::saying("recovered").recognize(image)
    }
}

fn write_test_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([200, 200, 200]))
        .save(path)
        .unwrap();
}

/// Config pointing both directories into a temp root, with a threshold small
/// enough that tiny test images do not trip the low-resolution warning.
fn test_config(root: &Path) -> BatchConfig {
    BatchConfig {
        input_dir: root.join("images_src"),
        output_dir: root.join("output"),
        min_dimension: 30,
        scale_factor: 1.8,
    }
}

#[test]
fn outputs_are_named_after_the_input_base() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();

    write_test_image(&config.input_dir.join("b.jpg"), 40, 40);
    write_test_image(&config.input_dir.join("a.png"), 40, 40);
    fs::write(config.input_dir.join("notes.txt"), "not an image").unwrap();

    let report = batch::run_batch(
        &config,
        &FakeRecognizer::saying("hello"),
        &CorrectionTable::new(),
    )
    .unwrap();

    // Supported files only, processed in lexicographic order.
    let names: Vec<_> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, ["a.png", "b.jpg"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);

    for base in ["a", "b"] {
        assert!(config.output_dir.join(format!("{base}.txt")).is_file());
        assert!(config.output_dir.join(format!("{base}_annotated.png")).is_file());
    }
    assert!(!config.output_dir.join("notes.txt").exists());

    // No staging artefact may survive a run.
    assert!(!config.output_dir.join("debug_preprocessed.png").exists());
}

#[test]
fn corrections_are_applied_to_the_written_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();
    write_test_image(&config.input_dir.join("card.png"), 40, 40);

    let report = batch::run_batch(
        &config,
        &FakeRecognizer::saying("Elèvei TINSA"),
        &CorrectionTable::default(),
    )
    .unwrap();
    assert_eq!(report.succeeded(), 1);

    let text = fs::read_to_string(config.output_dir.join("card.txt")).unwrap();
    assert_eq!(text, "Élève INSA");
}

#[test]
fn a_failing_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();
    write_test_image(&config.input_dir.join("a.png"), 40, 40);
    write_test_image(&config.input_dir.join("b.png"), 40, 40);

    let recognizer = FlakyRecognizer {
        calls: Cell::new(0),
    };
    let report = batch::run_batch(&config, &recognizer, &CorrectionTable::new()).unwrap();

    assert_eq!(report.files.len(), 2);
    assert!(matches!(report.files[0].outcome, FileOutcome::Failed(_)));
    assert!(matches!(
        report.files[1].outcome,
        FileOutcome::Processed { .. }
    ));

    // The second file's outputs exist; the first produced none.
    assert!(config.output_dir.join("b.txt").is_file());
    assert!(config.output_dir.join("b_annotated.png").is_file());
    assert!(!config.output_dir.join("a.txt").exists());
}

#[test]
fn an_unreadable_input_is_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();

    // Zero-byte file with an image extension.
    fs::write(config.input_dir.join("bad.png"), b"").unwrap();
    write_test_image(&config.input_dir.join("good.png"), 40, 40);

    let report = batch::run_batch(
        &config,
        &FakeRecognizer::saying("fine"),
        &CorrectionTable::new(),
    )
    .unwrap();

    assert_eq!(report.files[0].file_name, "bad.png");
    assert!(matches!(report.files[0].outcome, FileOutcome::Failed(_)));
    assert_eq!(report.files[1].file_name, "good.png");
    assert!(matches!(
        report.files[1].outcome,
        FileOutcome::Processed { .. }
    ));
    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);
}

#[test]
fn low_resolution_inputs_are_flagged_but_still_processed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();

    // Below and above the 30px test threshold.
    write_test_image(&config.input_dir.join("small.png"), 20, 24);
    write_test_image(&config.input_dir.join("tall.png"), 48, 40);

    let report = batch::run_batch(
        &config,
        &FakeRecognizer::saying("ok"),
        &CorrectionTable::new(),
    )
    .unwrap();

    match &report.files[0].outcome {
        FileOutcome::Processed { low_resolution, .. } => assert!(low_resolution),
        other => panic!("expected processed outcome, got {other:?}"),
    }
    match &report.files[1].outcome {
        FileOutcome::Processed { low_resolution, .. } => assert!(!low_resolution),
        other => panic!("expected processed outcome, got {other:?}"),
    }

    // The small file still produced both outputs.
    assert!(config.output_dir.join("small.txt").is_file());
    assert!(config.output_dir.join("small_annotated.png").is_file());
}

#[test]
fn output_directory_is_created_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir(&config.input_dir).unwrap();
    write_test_image(&config.input_dir.join("page.jpeg"), 32, 32);

    assert!(!config.output_dir.exists());
    let report = batch::run_batch(
        &config,
        &FakeRecognizer::saying("ok"),
        &CorrectionTable::new(),
    )
    .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert!(config.output_dir.join("page.txt").is_file());
}
