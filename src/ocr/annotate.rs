// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotated-page synthesis — renders a recognition result as a clean page
// image with each recognized line drawn at its detected position.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, instrument, warn};

use crate::error::{Result, ScanwerkError};
use crate::ocr::engine::OcrDocument;

/// Candidate locations for the annotation font, checked in order.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/local/share/fonts/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
];

const PAGE_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Glyph sizes are clamped to this range regardless of the detected line
/// height, keeping degenerate detections legible.
const MIN_GLYPH_PX: f32 = 8.0;
const MAX_GLYPH_PX: f32 = 96.0;

/// Font used to draw recognized text onto the annotated page.
pub struct PageFont {
    font: FontVec,
}

impl PageFont {
    /// Load a TrueType/OpenType font from an explicit path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let font = FontVec::try_from_vec(data).map_err(|err| {
            ScanwerkError::FontError(format!(
                "failed to parse font {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self { font })
    }

    /// Search well-known system locations for a usable sans font.
    ///
    /// Returns `None` when no candidate is present; annotation then falls
    /// back to outline boxes.
    pub fn locate() -> Option<Self> {
        for candidate in FONT_CANDIDATES {
            let path = PathBuf::from(candidate);
            if !path.exists() {
                continue;
            }
            match Self::open(&path) {
                Ok(font) => {
                    debug!(path = %path.display(), "Annotation font loaded");
                    return Some(font);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable font candidate");
                }
            }
        }
        None
    }
}

/// Render the annotated visualization for a recognition result.
///
/// Produces a white page matching the recognized image's dimensions with each
/// line of text drawn in black at its detected position, glyphs scaled to the
/// detected line height. Without a font, each line position is marked with a
/// hollow rectangle instead.
#[instrument(skip_all, fields(lines = document.lines.len()))]
pub fn synthesize(document: &OcrDocument, font: Option<&PageFont>) -> RgbImage {
    let width = document.width.max(1);
    let height = document.height.max(1);
    let mut page = RgbImage::from_pixel(width, height, PAGE_BACKGROUND);

    if font.is_none() && !document.lines.is_empty() {
        warn!("No annotation font available; drawing line outlines only");
    }

    for line in &document.lines {
        let bounds = line.bounds;
        match font {
            Some(page_font) => {
                let scale = PxScale::from((bounds.height as f32).clamp(MIN_GLYPH_PX, MAX_GLYPH_PX));
                draw_text_mut(
                    &mut page,
                    INK,
                    bounds.x,
                    bounds.y,
                    scale,
                    &page_font.font,
                    &line.text,
                );
            }
            None => {
                let rect = Rect::at(bounds.x, bounds.y).of_size(bounds.width, bounds.height);
                draw_hollow_rect_mut(&mut page, rect, INK);
            }
        }
    }

    debug!("Annotated page synthesized");
    page
}
