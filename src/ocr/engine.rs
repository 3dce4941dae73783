// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR inference — wraps the `ocrs` engine (neural network models executed via
// `rten`) behind the `TextRecognizer` seam used by the batch driver.
//
// # Model Setup
//
// The engine requires two model files:
//
// - **Detection model** (`text-detection.rten`) — locates text regions in the image.
// - **Recognition model** (`text-recognition.rten`) — decodes characters from detected regions.
//
// Models can be downloaded from the ocrs-models repository, or obtained
// automatically by running the `ocrs-cli` tool once:
//
// ```sh
// cargo install ocrs-cli
// ocrs some-image.png  # downloads models to ~/.cache/ocrs/
// ```
//
// The default cache directory is `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`).

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use tracing::{debug, info, instrument};

use crate::error::{Result, ScanwerkError};

/// Default directory for cached OCR model files.
///
/// Follows the XDG Base Directory specification: `$XDG_CACHE_HOME/ocrs`,
/// falling back to `~/.cache/ocrs` when `XDG_CACHE_HOME` is unset.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        // Last resort — current directory.
        PathBuf::from("ocrs-models")
    }
}

/// Well-known filenames for the detection and recognition models.
const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Configuration for constructing an [`OcrsRecognizer`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Path to the text-detection model file (`.rten`).
    pub detection_model_path: PathBuf,
    /// Path to the text-recognition model file (`.rten`).
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    /// Returns a config pointing at the default model cache directory.
    fn default() -> Self {
        let dir = default_model_dir();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }
}

impl OcrConfig {
    /// Create a config with an explicit model directory.
    ///
    /// Expects the directory to contain `text-detection.rten` and
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Create a config pointing at two specific model files.
    pub fn from_paths(
        detection_model: impl Into<PathBuf>,
        recognition_model: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detection_model_path: detection_model.into(),
            recognition_model_path: recognition_model.into(),
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        if !self.detection_model_path.exists() {
            return Err(ScanwerkError::OcrError(format!(
                "detection model not found at {}; run `ocrs-cli` once to download models",
                self.detection_model_path.display()
            )));
        }
        if !self.recognition_model_path.exists() {
            return Err(ScanwerkError::OcrError(format!(
                "recognition model not found at {}; run `ocrs-cli` once to download models",
                self.recognition_model_path.display()
            )));
        }
        Ok(())
    }
}

/// Axis-aligned bounding box of a recognized text line, in pixels of the
/// image submitted for recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One recognized line of text with its position.
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub bounds: LineBounds,
}

/// Structured recognition result for one image.
///
/// Lines are ordered top-to-bottom, ties broken left-to-right, so iteration
/// follows natural reading order.
#[derive(Debug, Clone)]
pub struct OcrDocument {
    /// Width of the recognized image in pixels.
    pub width: u32,
    /// Height of the recognized image in pixels.
    pub height: u32,
    pub lines: Vec<OcrLine>,
}

impl OcrDocument {
    /// Flatten the result to plain text, one recognized line per row.
    pub fn render_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Seam between the batch driver and the recognition backend.
///
/// The engine receives the enhanced image as an in-memory buffer — backends
/// that need file paths must do their own staging, and backends that accept
/// buffers (like `ocrs`) skip staging entirely. Tests substitute a fake
/// implementation to drive the batch pipeline without model files.
pub trait TextRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<OcrDocument>;
}

/// Recognition backend built on the `ocrs` engine.
///
/// The engine is initialised once with pre-trained detection and recognition
/// models and is then reused, read-only, for every image in the batch.
///
/// # Performance
///
/// The `ocrs` and `rten` crates must be compiled with optimisations. Debug
/// builds will be extremely slow (10-100x slower).
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    /// Create a recognizer, loading models from the paths given in `config`.
    ///
    /// Model loading is the expensive step — keep the recognizer around and
    /// call [`recognize`](TextRecognizer::recognize) for each image.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::OcrError`] if model files are missing or corrupt.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            ScanwerkError::OcrError(format!(
                "failed to load detection model from {}: {}",
                config.detection_model_path.display(),
                err
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model =
            Model::load_file(&config.recognition_model_path).map_err(|err| {
                ScanwerkError::OcrError(format!(
                    "failed to load recognition model from {}: {}",
                    config.recognition_model_path.display(),
                    err
                ))
            })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            ScanwerkError::OcrError(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine initialised successfully");
        Ok(Self { engine })
    }

    /// Create a recognizer using the default model cache directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }

    /// Create a recognizer loading models from a specific directory.
    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(OcrConfig::from_dir(dir))
    }
}

impl TextRecognizer for OcrsRecognizer {
    /// Detect and transcribe all text in an image.
    ///
    /// Runs detection, groups the detected words into lines, and recognises
    /// each line. Empty lines are dropped; the rest are sorted into natural
    /// reading order. The input is converted to RGB8 internally if it is in a
    /// different colour space.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage) -> Result<OcrDocument> {
        info!(
            width = image.width(),
            height = image.height(),
            "Starting OCR recognition"
        );

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanwerkError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self.engine.prepare_input(source).map_err(|err| {
            ScanwerkError::OcrError(format!("OCR preprocessing failed: {}", err))
        })?;

        // Step 1: Detect word bounding boxes.
        let word_rects = self.engine.detect_words(&input).map_err(|err| {
            ScanwerkError::OcrError(format!("word detection failed: {}", err))
        })?;
        debug!(word_count = word_rects.len(), "Words detected");

        // Step 2: Group words into text lines.
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        debug!(line_count = line_rects.len(), "Text lines found");

        // Step 3: Recognise characters within each line.
        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| {
                ScanwerkError::OcrError(format!("line recognition failed: {}", err))
            })?;

        let mut lines = Vec::with_capacity(line_texts.len());
        for line in line_texts.iter().flatten() {
            let text = line.to_string();
            if text.trim().is_empty() {
                continue;
            }
            lines.push(OcrLine {
                bounds: line_bounds(line),
                text,
            });
        }
        lines.sort_by_key(|line| (line.bounds.y, line.bounds.x));

        info!(recognized_lines = lines.len(), "Recognition complete");
        Ok(OcrDocument {
            width,
            height,
            lines,
        })
    }
}

/// Axis-aligned bounds of a detected text item, from the corners of its
/// (possibly rotated) detection rectangle.
fn line_bounds(item: &impl TextItem) -> LineBounds {
    let corners = item.rotated_rect().corners();
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for corner in corners {
        min_x = min_x.min(corner.x);
        min_y = min_y.min(corner.y);
        max_x = max_x.max(corner.x);
        max_y = max_y.max(corner.y);
    }

    LineBounds {
        x: min_x.floor() as i32,
        y: min_y.floor() as i32,
        width: ((max_x - min_x).ceil() as u32).max(1),
        height: ((max_y - min_y).ceil() as u32).max(1),
    }
}
