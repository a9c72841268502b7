// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ballot metadata decoding with per-format decoders.

pub mod bmd;
pub mod hmpb;

use ballotwerk_core::config::InterpreterConfig;
use ballotwerk_core::fingerprint::fingerprint_matches;
use ballotwerk_core::layout::ElectionLayout;
use ballotwerk_core::types::{BallotFormat, BallotMetadata, UnreadableReason};
use tracing::debug;

use crate::grid::DetectedGrid;
use crate::page::NormalizedPage;

/// What a decoder recovered from a page.
#[derive(Debug, Clone)]
pub enum DecodedPage {
    /// Hand-marked: identity from the bottom timing-mark row, targets still to score.
    HandMarked {
        metadata: BallotMetadata,
        grid: DetectedGrid,
    },
    /// Machine-printed: identity and selections both from the QR payload.
    /// One selection per option of the ballot style, in contest order.
    MachinePrinted {
        metadata: BallotMetadata,
        selections: Vec<bool>,
    },
}

/// Why a decoder produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeFailure {
    /// The page does not look like this format; the next decoder may try.
    NotThisFormat(UnreadableReason),
    /// The page is this format but cannot be used.
    Unreadable(UnreadableReason),
}

impl DecodeFailure {
    pub fn reason(&self) -> &UnreadableReason {
        match self {
            Self::NotThisFormat(reason) | Self::Unreadable(reason) => reason,
        }
    }

    /// Failures a page turned the wrong way up produces: the grid is missing
    /// or short, or the bottom row reads as nonsense.
    pub fn may_be_upside_down(&self) -> bool {
        matches!(
            self.reason(),
            UnreadableReason::GridNotFound { .. }
                | UnreadableReason::GridIncomplete { .. }
                | UnreadableReason::MalformedMetadata { .. }
        )
    }
}

/// Layout and configuration shared by the decoders.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub layout: &'a ElectionLayout,
    pub config: &'a InterpreterConfig,
}

type Decoder = fn(&NormalizedPage, &DecodeContext<'_>) -> Result<DecodedPage, DecodeFailure>;

/// Hand-marked first: grid detection is cheap to reject, QR search is not.
const DECODERS: [(BallotFormat, Decoder); 2] = [
    (BallotFormat::HandMarked, hmpb::decode),
    (BallotFormat::MachinePrinted, bmd::decode),
];

/// Run the decoders in order. When no decoder recognises the page, the first
/// decoder's reason is reported.
pub fn decode_page(
    page: &NormalizedPage,
    ctx: &DecodeContext<'_>,
) -> Result<DecodedPage, DecodeFailure> {
    let mut first_miss = None;
    for (format, decoder) in DECODERS {
        match decoder(page, ctx) {
            Ok(decoded) => return Ok(decoded),
            Err(DecodeFailure::Unreadable(reason)) => {
                return Err(DecodeFailure::Unreadable(reason));
            }
            Err(DecodeFailure::NotThisFormat(reason)) => {
                debug!(?format, ?reason, "Decoder did not recognise page");
                first_miss.get_or_insert(reason);
            }
        }
    }
    Err(DecodeFailure::NotThisFormat(first_miss.unwrap_or(
        UnreadableReason::GridNotFound {
            detail: "no decoder recognised the page".into(),
        },
    )))
}

/// Identity fields as encoded on the page, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedIdentity {
    pub ballot_style_index: u32,
    pub precinct_index: u32,
    pub page_number: u32,
    pub is_test_mode: bool,
    pub fingerprint_prefix: String,
    pub format: BallotFormat,
}

/// Resolve indices against the layout and enforce the election, test-mode and
/// precinct checks. The page number is passed through; a page the style does
/// not have is a layout fault caught by the contest mapper.
pub fn resolve_metadata(
    identity: EncodedIdentity,
    ctx: &DecodeContext<'_>,
) -> Result<BallotMetadata, UnreadableReason> {
    let expected = &ctx.config.election_fingerprint;
    if !fingerprint_matches(expected, &identity.fingerprint_prefix) {
        let shown = expected
            .get(..identity.fingerprint_prefix.len())
            .unwrap_or(expected)
            .to_string();
        return Err(UnreadableReason::ElectionMismatch {
            expected: shown,
            actual: identity.fingerprint_prefix,
        });
    }

    let style = ctx
        .layout
        .ballot_style_at(identity.ballot_style_index as usize)
        .ok_or(UnreadableReason::UnknownBallotStyle {
            index: identity.ballot_style_index,
        })?;
    let precinct = ctx
        .layout
        .precinct_at(identity.precinct_index as usize)
        .ok_or(UnreadableReason::UnknownPrecinct {
            index: identity.precinct_index,
        })?;
    if !style.precinct_ids.contains(&precinct.id) {
        return Err(UnreadableReason::MalformedMetadata {
            detail: format!(
                "ballot style {} is not used in precinct {}",
                style.id, precinct.id
            ),
        });
    }
    if identity.is_test_mode != ctx.config.test_mode {
        return Err(UnreadableReason::InvalidTestMode {
            expected_test_mode: ctx.config.test_mode,
        });
    }
    if let Some(expected) = &ctx.config.expected_precinct_id {
        if *expected != precinct.id {
            return Err(UnreadableReason::InvalidPrecinct {
                expected: expected.clone(),
                actual: precinct.id.clone(),
            });
        }
    }

    Ok(BallotMetadata {
        ballot_style_id: style.id.clone(),
        precinct_id: precinct.id.clone(),
        page_number: identity.page_number,
        is_test_mode: identity.is_test_mode,
        election_fingerprint: identity.fingerprint_prefix.to_ascii_lowercase(),
        ballot_format: identity.format,
    })
}
