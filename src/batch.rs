// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch driver — enumerates the input directory and runs the
// enhance → recognize → correct → persist pipeline once per image, recording
// a typed outcome per file and never letting one failure abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::config::BatchConfig;
use crate::corrections::CorrectionTable;
use crate::enhance::DocumentEnhancer;
use crate::error::{Result, ScanwerkError};
use crate::ocr::annotate::{self, PageFont};
use crate::ocr::engine::TextRecognizer;

/// Input extensions accepted by the driver, matched case-insensitively.
/// Files with any other extension are never opened.
const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Result of one batch run: one entry per enumerated input file, in
/// processing order.
#[derive(Debug)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// Number of files that produced both outputs.
    pub fn succeeded(&self) -> usize {
        self.files
            .iter()
            .filter(|file| matches!(file.outcome, FileOutcome::Processed { .. }))
            .count()
    }

    /// Number of files that were skipped after an error.
    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }
}

/// Per-file record in a [`BatchReport`].
#[derive(Debug)]
pub struct FileReport {
    /// The input's file name (no directory component).
    pub file_name: String,
    pub outcome: FileOutcome,
}

/// Typed outcome of processing one file.
#[derive(Debug)]
pub enum FileOutcome {
    Processed {
        /// Path of the written plain-text output.
        text_path: PathBuf,
        /// Path of the written annotated page image.
        image_path: PathBuf,
        /// Whether the input fell below the configured resolution threshold.
        /// Advisory only — the outputs were still produced.
        low_resolution: bool,
    },
    /// The error that stopped this file. Partial outputs, if any were written
    /// before the failure, are left in place.
    Failed(ScanwerkError),
}

/// List the image files the driver will process: regular files with a
/// supported extension, sorted lexicographically by file name.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|supported| ext.eq_ignore_ascii_case(supported))
            });
        if supported {
            files.push(path);
        }
    }
    files.sort_by_key(|path| path.file_name().map(|name| name.to_os_string()));
    Ok(files)
}

/// Process every supported image in the configured input directory.
///
/// Files are handled strictly sequentially and independently: an error in one
/// file is logged, recorded as a [`FileOutcome::Failed`], and the driver
/// moves on to the next file. Only an unreadable input directory or an
/// uncreatable output directory aborts the run as a whole.
#[instrument(skip_all, fields(
    input = %config.input_dir.display(),
    output = %config.output_dir.display(),
))]
pub fn run_batch(
    config: &BatchConfig,
    recognizer: &dyn TextRecognizer,
    corrections: &CorrectionTable,
) -> Result<BatchReport> {
    fs::create_dir_all(&config.output_dir)?;

    let font = PageFont::locate();
    let inputs = list_input_files(&config.input_dir)?;
    info!(file_count = inputs.len(), "Starting batch run");

    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, "Processing image");

        let outcome = match process_file(&path, config, recognizer, corrections, font.as_ref()) {
            Ok(outcome) => {
                info!(file = %file_name, "Results saved");
                outcome
            }
            Err(err) => {
                error!(file = %file_name, error = %err, "Processing failed; continuing with next file");
                FileOutcome::Failed(err)
            }
        };
        files.push(FileReport { file_name, outcome });
    }

    Ok(BatchReport { files })
}

/// Run the full pipeline for a single input image.
fn process_file(
    path: &Path,
    config: &BatchConfig,
    recognizer: &dyn TextRecognizer,
    corrections: &CorrectionTable,
    font: Option<&PageFont>,
) -> Result<FileOutcome> {
    let enhancer = DocumentEnhancer::open(path)?;
    let (width, height) = (enhancer.width(), enhancer.height());

    // Advisory only — small scans still go through the full pipeline.
    let low_resolution = width < config.min_dimension || height < config.min_dimension;
    if low_resolution {
        warn!(
            width,
            height,
            min = config.min_dimension,
            "Low input resolution; recognition quality may suffer"
        );
    }

    let staged = enhancer
        .enhance_document()
        .upscale(config.scale_factor)
        .into_dynamic();

    let document = recognizer.recognize(&staged)?;
    let text = corrections.apply(&document.render_text());
    let annotated = annotate::synthesize(&document, font);

    let base = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let text_path = config.output_dir.join(format!("{base}.txt"));
    fs::write(&text_path, text)?;

    let image_path = config.output_dir.join(format!("{base}_annotated.png"));
    annotated.save(&image_path).map_err(|err| {
        ScanwerkError::ImageError(format!(
            "failed to save annotated image to {}: {}",
            image_path.display(),
            err
        ))
    })?;

    Ok(FileOutcome::Processed {
        text_path,
        image_path,
        low_resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.JPG", "a.png", "c.JpEg", "notes.txt", "d.gif", "noext"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let files = list_input_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.JPG", "c.JpEg"]);
    }

    #[test]
    fn listing_missing_directory_fails() {
        let result = list_input_files(Path::new("/nonexistent/scanwerk-input"));
        assert!(matches!(result, Err(ScanwerkError::Io(_))));
    }
}
