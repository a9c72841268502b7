// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interpreter configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{BallotwerkError, Result};
use crate::types::{AdjudicationReason, MarkThresholds};

/// Minimum number of hex characters in the expected election fingerprint.
/// Machine-printed ballots carry a 20-character prefix.
pub const MIN_FINGERPRINT_HEX_LEN: usize = 20;

/// Which binarization threshold a target is scored against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// The page-wide Otsu threshold.
    #[default]
    Global,
    /// Otsu recomputed around each target, falling back to the page threshold
    /// where the neighbourhood has no contrast.
    LocalOtsu,
}

/// Per-election interpreter settings, supplied by the caller for every sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub mark_thresholds: MarkThresholds,
    /// Reasons that make a page require adjudication. Others are recorded as ignored.
    pub enabled_adjudication_reasons: BTreeSet<AdjudicationReason>,
    /// Whether the scanner is counting test ballots.
    pub test_mode: bool,
    /// Lowercase hex fingerprint of the election layout.
    pub election_fingerprint: String,
    /// When set, pages from any other precinct are rejected.
    pub expected_precinct_id: Option<String>,
    pub threshold_strategy: ThresholdStrategy,
    /// Timing marks (top row, side columns) that may be missing before a grid is rejected.
    pub max_missing_timing_marks: usize,
    /// Undecodable pages with at most this foreground ratio count as blank paper.
    pub blank_page_max_ink_ratio: f64,
    /// Half-width of the target alignment search window.
    pub alignment_search_inches: f64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            mark_thresholds: MarkThresholds::default(),
            enabled_adjudication_reasons: [
                AdjudicationReason::Overvote,
                AdjudicationReason::BlankBallot,
                AdjudicationReason::MarginalMark,
                AdjudicationReason::WriteIn,
            ]
            .into_iter()
            .collect(),
            test_mode: false,
            election_fingerprint: String::new(),
            expected_precinct_id: None,
            threshold_strategy: ThresholdStrategy::Global,
            max_missing_timing_marks: 0,
            blank_page_max_ink_ratio: 0.002,
            alignment_search_inches: 0.03,
        }
    }
}

impl InterpreterConfig {
    /// Defaults for the election with the given fingerprint.
    pub fn new(election_fingerprint: impl Into<String>) -> Self {
        Self {
            election_fingerprint: election_fingerprint.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_thresholds(mut self, thresholds: MarkThresholds) -> Self {
        self.mark_thresholds = thresholds;
        self
    }

    pub fn with_enabled_reasons(
        mut self,
        reasons: impl IntoIterator<Item = AdjudicationReason>,
    ) -> Self {
        self.enabled_adjudication_reasons = reasons.into_iter().collect();
        self
    }

    pub fn with_expected_precinct(mut self, precinct_id: impl Into<String>) -> Self {
        self.expected_precinct_id = Some(precinct_id.into());
        self
    }

    pub fn with_threshold_strategy(mut self, strategy: ThresholdStrategy) -> Self {
        self.threshold_strategy = strategy;
        self
    }

    pub fn with_max_missing_timing_marks(mut self, count: usize) -> Self {
        self.max_missing_timing_marks = count;
        self
    }

    pub fn is_enabled(&self, reason: AdjudicationReason) -> bool {
        self.enabled_adjudication_reasons.contains(&reason)
    }

    /// Reject settings that would make every scan meaningless.
    pub fn validate(&self) -> Result<()> {
        self.mark_thresholds.validate()?;

        let fingerprint = &self.election_fingerprint;
        if fingerprint.len() < MIN_FINGERPRINT_HEX_LEN
            || !fingerprint.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(BallotwerkError::InvalidConfig(format!(
                "election fingerprint must be at least {MIN_FINGERPRINT_HEX_LEN} hex characters, got {fingerprint:?}"
            )));
        }
        if !(0.0..=1.0).contains(&self.blank_page_max_ink_ratio) {
            return Err(BallotwerkError::InvalidConfig(format!(
                "blank_page_max_ink_ratio {} outside [0, 1]",
                self.blank_page_max_ink_ratio
            )));
        }
        if !(0.0..=0.25).contains(&self.alignment_search_inches) {
            return Err(BallotwerkError::InvalidConfig(format!(
                "alignment_search_inches {} outside [0, 0.25]",
                self.alignment_search_inches
            )));
        }
        Ok(())
    }
}
