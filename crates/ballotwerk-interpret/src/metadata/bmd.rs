// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Machine-printed page decoder: find and read the QR code.

use ballotwerk_core::encoding::BmdPayload;
use ballotwerk_core::types::{BallotFormat, UnreadableReason};
use rqrr::PreparedImage;
use tracing::{debug, instrument};

use super::{DecodeContext, DecodeFailure, DecodedPage, EncodedIdentity, resolve_metadata};
use crate::page::NormalizedPage;

/// Summary ballots are single pages.
const BMD_PAGE_NUMBER: u32 = 1;

#[instrument(skip_all)]
pub fn decode(page: &NormalizedPage, ctx: &DecodeContext<'_>) -> Result<DecodedPage, DecodeFailure> {
    let bytes = read_qr_code(page)?;
    debug!(payload_len = bytes.len(), "QR code read");

    let payload = BmdPayload::decode(&bytes).map_err(|err| {
        DecodeFailure::Unreadable(UnreadableReason::MetadataUndecodable {
            detail: err.to_string(),
        })
    })?;

    let metadata = resolve_metadata(
        EncodedIdentity {
            ballot_style_index: payload.ballot_style_index as u32,
            precinct_index: payload.precinct_index as u32,
            page_number: BMD_PAGE_NUMBER,
            is_test_mode: payload.is_test_mode,
            fingerprint_prefix: payload.fingerprint_prefix.clone(),
            format: BallotFormat::MachinePrinted,
        },
        ctx,
    )
    .map_err(DecodeFailure::Unreadable)?;

    let option_count: usize = ctx
        .layout
        .ballot_style(&metadata.ballot_style_id)
        .map(|style| {
            style
                .contest_ids
                .iter()
                .filter_map(|id| ctx.layout.contest(id))
                .map(|contest| contest.options.len())
                .sum()
        })
        .unwrap_or(0);
    let selections = payload
        .selections_for(option_count)
        .map_err(|err| {
            DecodeFailure::Unreadable(UnreadableReason::MalformedMetadata {
                detail: err.to_string(),
            })
        })?
        .to_vec();

    Ok(DecodedPage::MachinePrinted {
        metadata,
        selections,
    })
}

/// Raw bytes of the first QR code on the page that decodes.
fn read_qr_code(page: &NormalizedPage) -> Result<Vec<u8>, DecodeFailure> {
    let (width, height) = page.image.dimensions();
    let mut prepared = PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
        page.image.get_pixel(x as u32, y as u32).0[0]
    });
    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err(DecodeFailure::NotThisFormat(UnreadableReason::GridNotFound {
            detail: "no timing marks or QR code found".into(),
        }));
    }

    let mut last_error = String::new();
    for grid in &grids {
        let mut bytes = Vec::new();
        match grid.decode_to(&mut bytes) {
            Ok(_) => return Ok(bytes),
            Err(err) => last_error = format!("{err:?}"),
        }
    }
    Err(DecodeFailure::Unreadable(UnreadableReason::MetadataUndecodable {
        detail: format!("QR code found but not decodable: {last_error}"),
    }))
}
