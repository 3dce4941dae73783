// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Literal text corrections applied to recognized output.

/// Ordered table of literal OCR-error corrections.
///
/// Each entry maps an exact error string to its replacement. [`apply`]
/// substitutes every literal occurrence of every key, in table insertion
/// order; matching is case-sensitive and not word-boundary aware. This fixes
/// exact recognition mistakes observed on a known document set — it is not a
/// spell-checker.
///
/// [`apply`]: CorrectionTable::apply
#[derive(Debug, Clone)]
pub struct CorrectionTable {
    entries: Vec<(String, String)>,
}

impl CorrectionTable {
    /// An empty table. `apply` is then the identity function.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build a table from `(error, replacement)` pairs, preserving order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(error, replacement)| (error.into(), replacement.into()))
                .collect(),
        }
    }

    /// Append one correction at the end of the table.
    pub fn push(&mut self, error: impl Into<String>, replacement: impl Into<String>) {
        self.entries.push((error.into(), replacement.into()));
    }

    /// Number of corrections in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every literal occurrence of every key, in table order.
    ///
    /// Overlapping or nested keys are resolved purely by that order: an
    /// earlier replacement can create or destroy matches for a later key.
    pub fn apply(&self, text: &str) -> String {
        let mut corrected = text.to_string();
        for (error, replacement) in &self.entries {
            corrected = corrected.replace(error.as_str(), replacement.as_str());
        }
        corrected
    }
}

impl Default for CorrectionTable {
    /// Corrections for recognition mistakes observed on a known scan set.
    fn default() -> Self {
        Self::from_pairs([
            ("Elèvei", "Élève"),
            ("TINSA", "INSA"),
            ("BACSSVTS", "BAC S SVT"),
            ("pdle", "pôle"),
            ("tournoii", "tournoi"),
        ])
    }
}
