// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Entry point. Initialises logging, loads the OCR models once, and runs the
// batch over `images_src/`, writing results to `output/`.

use scanwerk::batch::{self, FileOutcome};
use scanwerk::config::BatchConfig;
use scanwerk::corrections::CorrectionTable;
use scanwerk::ocr::engine::{OcrConfig, OcrsRecognizer};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Scanwerk starting");

    let config = BatchConfig::default();
    let corrections = CorrectionTable::default();

    let recognizer = match OcrsRecognizer::new(OcrConfig::default()) {
        Ok(recognizer) => recognizer,
        Err(err) => {
            tracing::error!(error = %err, "Failed to initialise the OCR engine");
            std::process::exit(1);
        }
    };

    match batch::run_batch(&config, &recognizer, &corrections) {
        Ok(report) => {
            for file in &report.files {
                if let FileOutcome::Failed(err) = &file.outcome {
                    tracing::warn!(file = %file.file_name, error = %err, "File was skipped");
                }
            }
            tracing::info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "Batch run complete"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "Batch run aborted");
            std::process::exit(1);
        }
    }
}
