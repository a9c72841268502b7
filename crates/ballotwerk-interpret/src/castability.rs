// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Whether a sheet's votes can be tabulated as scanned.

use ballotwerk_core::types::{Castability, PageInterpretation, Sheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    Unreadable,
    Blank,
    NeedsReview,
    Clean,
}

fn page_state(page: &PageInterpretation) -> PageState {
    match page {
        PageInterpretation::UnreadablePage { .. } => PageState::Unreadable,
        PageInterpretation::BlankPage { .. } => PageState::Blank,
        PageInterpretation::InterpretedHmpbPage {
            adjudication_info, ..
        }
        | PageInterpretation::InterpretedBmdPage {
            adjudication_info, ..
        } => {
            if adjudication_info.requires_adjudication {
                PageState::NeedsReview
            } else {
                PageState::Clean
            }
        }
    }
}

/// Unreadable on either side, or nothing but blank paper, cannot be cast.
/// Otherwise a sheet needs review when an interpreted page has an enabled
/// adjudication reason. Page order does not matter.
pub fn determine_castability(sheet: &Sheet) -> Castability {
    use PageState::*;
    match (page_state(&sheet.front), page_state(&sheet.back)) {
        (Unreadable, _) | (_, Unreadable) => Castability::Uncastable,
        (Blank, Blank) => Castability::Uncastable,
        (NeedsReview, _) | (_, NeedsReview) => Castability::CastableWithReview,
        (Clean, Clean) | (Clean, Blank) | (Blank, Clean) => Castability::CastableWithoutReview,
    }
}
