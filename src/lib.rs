// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk — Batch OCR pipeline for scanned document images.
//
// Enhances each image for recognition (grayscale, contrast-limited adaptive
// histogram equalization, non-local-means denoising, cubic upscaling), runs a
// pretrained detection + recognition model, applies a small table of literal
// text corrections, and writes a plain-text file and an annotated page image
// per input.

pub mod batch;
pub mod config;
pub mod corrections;
pub mod enhance;
pub mod error;
pub mod ocr;

// Re-export the primary types so callers can use `scanwerk::BatchConfig` etc.
pub use batch::{run_batch, BatchReport, FileOutcome, FileReport};
pub use config::BatchConfig;
pub use corrections::CorrectionTable;
pub use enhance::DocumentEnhancer;
pub use error::{Result, ScanwerkError};
pub use ocr::engine::{OcrConfig, OcrDocument, OcrsRecognizer, TextRecognizer};
