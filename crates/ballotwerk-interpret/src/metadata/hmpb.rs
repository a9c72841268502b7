// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-marked page decoder: locate the timing-mark grid and read the
// bottom-row bit pattern.

use ballotwerk_core::encoding::{HmpbCodecError, HmpbMetadataBits};
use ballotwerk_core::types::{BallotFormat, UnreadableReason};
use tracing::{debug, instrument};

use super::{DecodeContext, DecodeFailure, DecodedPage, EncodedIdentity, resolve_metadata};
use crate::grid::detect_grid;
use crate::page::NormalizedPage;

#[instrument(skip_all)]
pub fn decode(page: &NormalizedPage, ctx: &DecodeContext<'_>) -> Result<DecodedPage, DecodeFailure> {
    let geometry = &ctx.layout.grid;
    if page.paper_size != geometry.paper_size {
        return Err(DecodeFailure::NotThisFormat(UnreadableReason::PaperMismatch {
            expected: geometry.paper_size,
            actual: page.paper_size,
        }));
    }

    let grid = detect_grid(page, geometry, ctx.config.max_missing_timing_marks).map_err(
        |reason| match reason {
            UnreadableReason::GridIncomplete { .. } => DecodeFailure::Unreadable(reason),
            other => DecodeFailure::NotThisFormat(other),
        },
    )?;

    let bits = HmpbMetadataBits::decode(&grid.marks.bottom_row_bits())
        .map_err(|err| DecodeFailure::Unreadable(codec_reason(err)))?;
    debug!(?bits, "Bottom row decoded");

    let metadata = resolve_metadata(
        EncodedIdentity {
            ballot_style_index: bits.ballot_style_index,
            precinct_index: bits.precinct_index,
            page_number: bits.page_number,
            is_test_mode: bits.is_test_mode,
            fingerprint_prefix: bits.fingerprint_hex(),
            format: BallotFormat::HandMarked,
        },
        ctx,
    )
    .map_err(DecodeFailure::Unreadable)?;

    Ok(DecodedPage::HandMarked { metadata, grid })
}

fn codec_reason(err: HmpbCodecError) -> UnreadableReason {
    match err {
        HmpbCodecError::ChecksumMismatch { expected, actual } => {
            UnreadableReason::ChecksumMismatch { expected, actual }
        }
        other => UnreadableReason::MalformedMetadata {
            detail: other.to_string(),
        },
    }
}
