// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for ballot sheet interpretation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BallotwerkError, Result};

/// Identifier of a contest in the election layout.
pub type ContestId = String;

/// Identifier of an option (candidate, yes/no choice, write-in) within a contest.
pub type OptionId = String;

/// Selected options per contest. Ordered so serialized output is stable.
pub type VotesDict = BTreeMap<ContestId, Vec<OptionId>>;

/// Supported ballot paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSize {
    Letter,
    Legal,
    /// 8.5 x 17 in.
    Custom17,
    /// 8.5 x 22 in.
    Custom22,
}

impl PaperSize {
    pub const ALL: [PaperSize; 4] = [Self::Letter, Self::Legal, Self::Custom17, Self::Custom22];

    /// Dimensions in inches (width, height), portrait.
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            Self::Letter => (8.5, 11.0),
            Self::Legal => (8.5, 14.0),
            Self::Custom17 => (8.5, 17.0),
            Self::Custom22 => (8.5, 22.0),
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = self.dimensions_in();
        w / h
    }
}

/// How the ballot was produced, which decides how its metadata is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotFormat {
    /// Summary ballot printed by a ballot-marking device, metadata and votes in a QR code.
    MachinePrinted,
    /// Hand-marked paper ballot, metadata encoded in the bottom timing-mark row.
    HandMarked,
}

/// Identity of a ballot page, recovered from the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotMetadata {
    pub ballot_style_id: String,
    pub precinct_id: String,
    /// 1-based.
    pub page_number: u32,
    pub is_test_mode: bool,
    /// Fingerprint prefix as printed on the page (lowercase hex).
    pub election_fingerprint: String,
    pub ballot_format: BallotFormat,
}

/// Axis-aligned pixel rectangle. `x`/`y` may be negative after alignment
/// offsets push a shape past the image edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of the given size centred on `(cx, cy)`.
    ///
    /// Pixel `i` covers `[i, i + 1)`, so the left edge is `round(cx - width / 2)`.
    pub fn centered_at(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        let x0 = (cx - width / 2.0).round() as i32;
        let y0 = (cy - height / 2.0).round() as i32;
        let x1 = (cx + width / 2.0).round() as i32;
        let y1 = (cy + height / 2.0).round() as i32;
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0).max(1) as u32,
            height: (y1 - y0).max(1) as u32,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Shrink by `amount` pixels on every side. Never collapses below 1x1.
    pub fn inset(&self, amount: u32) -> Self {
        let width = self.width.saturating_sub(2 * amount).max(1);
        let height = self.height.saturating_sub(2 * amount).max(1);
        let dx = ((self.width - width) / 2) as i32;
        let dy = ((self.height - height) / 2) as i32;
        Self::new(self.x + dx, self.y + dy, width, height)
    }

    /// Grow by `amount` pixels on every side.
    pub fn outset(&self, amount: u32) -> Self {
        Self::new(
            self.x - amount as i32,
            self.y - amount as i32,
            self.width + 2 * amount,
            self.height + 2 * amount,
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Expected location of one option's target (bubble).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetShape {
    /// The printed target outline.
    pub outer: PixelRect,
    /// Tolerance area inside the outline that is scored.
    pub inner: PixelRect,
}

/// Alignment correction applied to a target before scoring, in whole pixels.
///
/// Sub-pixel placement comes from interpolating the timing-mark grid; the
/// scorer then shifts the rounded outline by at most the configured search
/// radius in each axis to sit on the printed ink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredOffset {
    pub x: i32,
    pub y: i32,
}

/// Classification of a scored target. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkStatus {
    Unmarked,
    Marginal,
    Marked,
}

/// One scored option target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub contest_id: ContestId,
    pub option_id: OptionId,
    pub target: TargetShape,
    /// Fraction of the inner bounds classified as foreground, in [0, 1].
    pub score: f64,
    pub scored_offset: ScoredOffset,
    pub status: MarkStatus,
}

/// Score cut-offs for mark classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkThresholds {
    pub definite: f64,
    pub marginal: f64,
}

impl Default for MarkThresholds {
    fn default() -> Self {
        Self {
            definite: 0.20,
            marginal: 0.08,
        }
    }
}

impl MarkThresholds {
    pub fn new(definite: f64, marginal: f64) -> Result<Self> {
        let thresholds = Self { definite, marginal };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Both cut-offs must lie in [0, 1] and `marginal <= definite`.
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.definite) || !in_range(self.marginal) || self.marginal > self.definite {
            return Err(BallotwerkError::InvalidThresholds {
                marginal: self.marginal,
                definite: self.definite,
            });
        }
        Ok(())
    }

    pub fn classify(&self, score: f64) -> MarkStatus {
        if score >= self.definite {
            MarkStatus::Marked
        } else if score >= self.marginal {
            MarkStatus::Marginal
        } else {
            MarkStatus::Unmarked
        }
    }
}

/// Why a page needs a human to look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationReason {
    Overvote,
    Undervote,
    BlankBallot,
    MarginalMark,
    WriteIn,
}

impl AdjudicationReason {
    pub const ALL: [AdjudicationReason; 5] = [
        Self::Overvote,
        Self::Undervote,
        Self::BlankBallot,
        Self::MarginalMark,
        Self::WriteIn,
    ];
}

/// A single adjudication finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationReasonInfo {
    pub reason: AdjudicationReason,
    /// `None` for page-level reasons (blank ballot).
    pub contest_id: Option<ContestId>,
    pub option_ids: Vec<OptionId>,
    /// Area holding the handwritten name, for write-ins on hand-marked pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_in_area: Option<PixelRect>,
}

impl AdjudicationReasonInfo {
    pub fn for_contest(
        reason: AdjudicationReason,
        contest_id: impl Into<ContestId>,
        option_ids: Vec<OptionId>,
    ) -> Self {
        Self {
            reason,
            contest_id: Some(contest_id.into()),
            option_ids,
            write_in_area: None,
        }
    }

    pub fn blank_ballot() -> Self {
        Self {
            reason: AdjudicationReason::BlankBallot,
            contest_id: None,
            option_ids: Vec::new(),
            write_in_area: None,
        }
    }
}

/// Adjudication findings for one page, split by whether the caller enabled them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationInfo {
    pub requires_adjudication: bool,
    pub enabled_reason_infos: Vec<AdjudicationReasonInfo>,
    pub ignored_reason_infos: Vec<AdjudicationReasonInfo>,
}

impl AdjudicationInfo {
    pub fn has_enabled(&self, reason: AdjudicationReason) -> bool {
        self.enabled_reason_infos.iter().any(|info| info.reason == reason)
    }
}

/// Why a page could not be interpreted. These are expected scan-time outcomes,
/// not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnreadableReason {
    /// Image size matches no supported paper.
    UnsupportedDimensions { width: u32, height: u32 },
    /// Page matches a paper size other than the one the layout was printed on.
    PaperMismatch { expected: PaperSize, actual: PaperSize },
    /// Neither a timing-mark grid nor a QR code could be found.
    GridNotFound { detail: String },
    /// Too many timing marks are missing.
    GridIncomplete { missing: usize, tolerated: usize },
    /// QR payload or bottom-row bits could not be decoded.
    MetadataUndecodable { detail: String },
    /// Encoded bits violate the fixed layout (reserved columns, field ranges).
    MalformedMetadata { detail: String },
    ChecksumMismatch { expected: u8, actual: u8 },
    /// Page was printed for a different election.
    ElectionMismatch { expected: String, actual: String },
    InvalidTestMode { expected_test_mode: bool },
    InvalidPrecinct { expected: String, actual: String },
    UnknownBallotStyle { index: u32 },
    UnknownPrecinct { index: u32 },
    /// Front and back do not belong to the same sheet.
    MismatchedSheet { detail: String },
}

/// Result of interpreting one page. Every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageInterpretation {
    InterpretedHmpbPage {
        metadata: BallotMetadata,
        votes: VotesDict,
        marks: Vec<Mark>,
        adjudication_info: AdjudicationInfo,
    },
    InterpretedBmdPage {
        metadata: BallotMetadata,
        votes: VotesDict,
        adjudication_info: AdjudicationInfo,
    },
    BlankPage {
        /// Present when the page decoded but carried no marks.
        metadata: Option<BallotMetadata>,
        marks: Vec<Mark>,
        adjudication_info: Option<AdjudicationInfo>,
    },
    UnreadablePage {
        reason: UnreadableReason,
    },
}

impl PageInterpretation {
    pub fn metadata(&self) -> Option<&BallotMetadata> {
        match self {
            Self::InterpretedHmpbPage { metadata, .. } | Self::InterpretedBmdPage { metadata, .. } => {
                Some(metadata)
            }
            Self::BlankPage { metadata, .. } => metadata.as_ref(),
            Self::UnreadablePage { .. } => None,
        }
    }

    pub fn votes(&self) -> Option<&VotesDict> {
        match self {
            Self::InterpretedHmpbPage { votes, .. } | Self::InterpretedBmdPage { votes, .. } => {
                Some(votes)
            }
            Self::BlankPage { .. } | Self::UnreadablePage { .. } => None,
        }
    }

    pub fn marks(&self) -> &[Mark] {
        match self {
            Self::InterpretedHmpbPage { marks, .. } | Self::BlankPage { marks, .. } => marks,
            Self::InterpretedBmdPage { .. } | Self::UnreadablePage { .. } => &[],
        }
    }

    pub fn adjudication_info(&self) -> Option<&AdjudicationInfo> {
        match self {
            Self::InterpretedHmpbPage {
                adjudication_info, ..
            }
            | Self::InterpretedBmdPage {
                adjudication_info, ..
            } => Some(adjudication_info),
            Self::BlankPage {
                adjudication_info, ..
            } => adjudication_info.as_ref(),
            Self::UnreadablePage { .. } => None,
        }
    }

    pub fn page_number(&self) -> Option<u32> {
        self.metadata().map(|m| m.page_number)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::BlankPage { .. })
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::UnreadablePage { .. })
    }
}

/// Front and back of one sheet, in resolved page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub front: PageInterpretation,
    pub back: PageInterpretation,
}

/// Whether a sheet's votes can be counted automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Castability {
    CastableWithoutReview,
    CastableWithReview,
    Uncastable,
}

/// Everything the interpreter reports for one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretedSheet {
    pub sheet: Sheet,
    /// Votes from both pages merged.
    pub votes: VotesDict,
    pub castability: Castability,
}
