// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-English explanations for poll workers and adjudicators.
//
// The review queues and scanner screens that show these belong to other
// systems; this module only decides what they say.

use crate::types::{AdjudicationReason, AdjudicationReasonInfo, Castability, UnreadableReason};

/// How the message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Sheet is counted; nothing to do.
    Informational,
    /// Sheet is held for a human decision.
    ReviewRequired,
    /// Sheet is returned to the voter or operator.
    Rejected,
}

/// A human-readable message with a suggested next step.
#[derive(Debug, Clone)]
pub struct HumanMessage {
    pub message: String,
    pub suggestion: String,
    pub severity: Severity,
}

impl HumanMessage {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }
}

/// Explain why a page could not be read.
pub fn explain_unreadable(reason: &UnreadableReason) -> HumanMessage {
    use UnreadableReason::*;
    match reason {
        UnsupportedDimensions { .. } | PaperMismatch { .. } => HumanMessage::new(
            "This sheet is not a ballot size we recognise.",
            "Check the sheet is a ballot for this election and was not folded or cut.",
            Severity::Rejected,
        ),
        GridNotFound { .. } | GridIncomplete { .. } => HumanMessage::new(
            "The scanner could not line up this ballot.",
            "Make sure the ballot is not torn, folded, or covered at the edges, then scan it again.",
            Severity::Rejected,
        ),
        MetadataUndecodable { .. } | MalformedMetadata { .. } | ChecksumMismatch { .. } => {
            HumanMessage::new(
                "The ballot's identifying marks could not be read.",
                "Rescan the ballot. If it fails again, set it aside for review.",
                Severity::Rejected,
            )
        }
        ElectionMismatch { .. } => HumanMessage::new(
            "This ballot is for a different election.",
            "Return the ballot to the voter and check they were given the correct ballot.",
            Severity::Rejected,
        ),
        InvalidTestMode { expected_test_mode } => {
            if *expected_test_mode {
                HumanMessage::new(
                    "This is a live ballot but the scanner is in test mode.",
                    "Switch the scanner to live mode before scanning voted ballots.",
                    Severity::Rejected,
                )
            } else {
                HumanMessage::new(
                    "This is a test ballot but the scanner is counting live ballots.",
                    "Remove test ballots before scanning.",
                    Severity::Rejected,
                )
            }
        }
        InvalidPrecinct { expected, actual } => HumanMessage::new(
            "This ballot belongs to a different precinct.",
            format!("The scanner is set to precinct {expected}; this ballot is for {actual}."),
            Severity::Rejected,
        ),
        UnknownBallotStyle { .. } | UnknownPrecinct { .. } => HumanMessage::new(
            "This ballot's style is not part of this election.",
            "Check the election definition loaded on the scanner.",
            Severity::Rejected,
        ),
        MismatchedSheet { .. } => HumanMessage::new(
            "The two sides of this sheet do not belong together.",
            "Check that two ballots were not fed at once, then scan again.",
            Severity::Rejected,
        ),
    }
}

/// Explain an adjudication finding.
pub fn explain_adjudication(info: &AdjudicationReasonInfo) -> HumanMessage {
    let contest = info.contest_id.as_deref().unwrap_or("the ballot");
    match info.reason {
        AdjudicationReason::Overvote => HumanMessage::new(
            format!("Too many choices were marked in {contest}."),
            "Votes in this contest will not count unless the ballot is corrected.",
            Severity::ReviewRequired,
        ),
        AdjudicationReason::Undervote => HumanMessage::new(
            format!("Fewer choices than allowed were marked in {contest}."),
            "This is allowed; the voter may continue.",
            Severity::Informational,
        ),
        AdjudicationReason::BlankBallot => HumanMessage::new(
            "No votes were found on this page.",
            "Confirm the voter meant to leave it blank.",
            Severity::ReviewRequired,
        ),
        AdjudicationReason::MarginalMark => HumanMessage::new(
            format!("A mark in {contest} is too faint or small to be sure about."),
            "An adjudicator should decide whether it is a vote.",
            Severity::ReviewRequired,
        ),
        AdjudicationReason::WriteIn => HumanMessage::new(
            format!("A write-in was marked in {contest}."),
            "The handwritten name needs to be transcribed.",
            Severity::ReviewRequired,
        ),
    }
}

/// Summarise what happens to a sheet.
pub fn explain_castability(castability: Castability) -> HumanMessage {
    match castability {
        Castability::CastableWithoutReview => HumanMessage::new(
            "Ballot counted.",
            "No further action needed.",
            Severity::Informational,
        ),
        Castability::CastableWithReview => HumanMessage::new(
            "Ballot accepted and held for review.",
            "An adjudicator will resolve the flagged contests.",
            Severity::ReviewRequired,
        ),
        Castability::Uncastable => HumanMessage::new(
            "Ballot not accepted.",
            "Return the ballot to the voter or operator.",
            Severity::Rejected,
        ),
    }
}
