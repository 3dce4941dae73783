// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch run configuration.

use std::path::PathBuf;

/// Immutable settings for one batch run.
///
/// The operator workflow is deliberately knob-free — no CLI flags, no
/// environment variables, no config file. The values are gathered into one
/// struct so the driver receives them explicitly and tests can redirect the
/// directories.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned for input images.
    pub input_dir: PathBuf,
    /// Directory receiving the per-image outputs (created if absent).
    pub output_dir: PathBuf,
    /// An input with either dimension below this emits a low-resolution
    /// warning. Advisory only — the file is still processed.
    pub min_dimension: u32,
    /// Magnification applied to the enhanced image before recognition.
    pub scale_factor: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("images_src"),
            output_dir: PathBuf::from("output"),
            min_dimension: 500,
            scale_factor: 1.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operator_workflow() {
        let config = BatchConfig::default();
        assert_eq!(config.input_dir, PathBuf::from("images_src"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.min_dimension, 500);
        assert!((config.scale_factor - 1.8).abs() < f32::EPSILON);
    }
}
