// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition — engine wrapper, structured results, and annotated-page
// synthesis.

pub mod annotate;
pub mod engine;

pub use annotate::PageFont;
pub use engine::{LineBounds, OcrConfig, OcrDocument, OcrLine, OcrsRecognizer, TextRecognizer};
