// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared helpers for the interpreter integration tests.

#![allow(dead_code)]

use ballotwerk_core::config::InterpreterConfig;
use ballotwerk_core::layout::ElectionLayout;
use ballotwerk_core::types::{InterpretedSheet, PaperSize};
use ballotwerk_fixtures::{DEFAULT_PPI, blank_page, sample_fingerprint, sample_layout};
use ballotwerk_interpret::{RasterImage, SheetContext, interpret_sheet};
use image::GrayImage;

pub struct Election {
    pub layout: ElectionLayout,
    pub fingerprint: String,
}

impl Election {
    pub fn sample() -> Self {
        Self {
            layout: sample_layout(),
            fingerprint: sample_fingerprint().expect("fingerprint"),
        }
    }

    pub fn config(&self) -> InterpreterConfig {
        InterpreterConfig::new(&self.fingerprint)
    }

    /// A fingerprint that differs from the real one in its first character.
    pub fn other_fingerprint(&self) -> String {
        let first = if self.fingerprint.starts_with('f') { '0' } else { 'f' };
        format!("{first}{}", &self.fingerprint[1..])
    }

    pub fn interpret(&self, front: GrayImage, back: GrayImage) -> InterpretedSheet {
        self.interpret_with(&self.config(), front, back)
    }

    pub fn interpret_with(
        &self,
        config: &InterpreterConfig,
        front: GrayImage,
        back: GrayImage,
    ) -> InterpretedSheet {
        interpret_sheet(
            RasterImage::from_gray(front),
            RasterImage::from_gray(back),
            &self.layout,
            config,
            &SheetContext::new("test-sheet"),
        )
        .expect("no fatal error")
    }
}

pub fn blank() -> GrayImage {
    blank_page(PaperSize::Letter, DEFAULT_PPI)
}

pub fn votes(pairs: &[(&str, &[&str])]) -> ballotwerk_core::types::VotesDict {
    pairs
        .iter()
        .map(|(contest, options)| {
            (
                contest.to_string(),
                options.iter().map(|o| o.to_string()).collect(),
            )
        })
        .collect()
}
