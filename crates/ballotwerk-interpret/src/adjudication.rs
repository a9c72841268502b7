// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adjudication rules for the classified options of a page.

use std::collections::BTreeSet;

use ballotwerk_core::layout::Contest;
use ballotwerk_core::types::{
    AdjudicationInfo, AdjudicationReason, AdjudicationReasonInfo, ContestId, MarkStatus,
    OptionId, PixelRect, VotesDict,
};

/// One option's classification, independent of how it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedOption {
    pub contest_id: ContestId,
    pub option_id: OptionId,
    pub status: MarkStatus,
    pub is_write_in: bool,
    /// Handwriting area beside a write-in target, when the page has one.
    pub write_in_area: Option<PixelRect>,
}

impl ClassifiedOption {
    fn is_for(&self, contest: &Contest) -> bool {
        self.contest_id == contest.id
    }
}

/// All findings for one contest, enabled or not.
pub fn adjudicate_contest(
    contest: &Contest,
    options: &[ClassifiedOption],
) -> Vec<AdjudicationReasonInfo> {
    let ids_with = |status: MarkStatus| -> Vec<OptionId> {
        options
            .iter()
            .filter(|o| o.is_for(contest) && o.status == status)
            .map(|o| o.option_id.clone())
            .collect()
    };
    let marked = ids_with(MarkStatus::Marked);
    let marginal = ids_with(MarkStatus::Marginal);
    let seats = contest.seats as usize;

    let mut infos = Vec::new();
    if marked.len() > seats {
        infos.push(AdjudicationReasonInfo::for_contest(
            AdjudicationReason::Overvote,
            &contest.id,
            marked.clone(),
        ));
    } else if marked.len() < seats {
        infos.push(AdjudicationReasonInfo::for_contest(
            AdjudicationReason::Undervote,
            &contest.id,
            marked.clone(),
        ));
    }
    if !marginal.is_empty() {
        infos.push(AdjudicationReasonInfo::for_contest(
            AdjudicationReason::MarginalMark,
            &contest.id,
            marginal,
        ));
    }
    for option in options
        .iter()
        .filter(|o| o.is_for(contest) && o.is_write_in && o.status == MarkStatus::Marked)
    {
        infos.push(AdjudicationReasonInfo {
            write_in_area: option.write_in_area,
            ..AdjudicationReasonInfo::for_contest(
                AdjudicationReason::WriteIn,
                &contest.id,
                vec![option.option_id.clone()],
            )
        });
    }
    infos
}

/// Findings for every contest on a page plus the blank-ballot check, routed
/// into enabled and ignored lists.
pub fn adjudicate_page(
    contests: &[&Contest],
    options: &[ClassifiedOption],
    enabled: &BTreeSet<AdjudicationReason>,
) -> AdjudicationInfo {
    let mut infos = Vec::new();
    if !options.iter().any(|o| o.status == MarkStatus::Marked) {
        infos.push(AdjudicationReasonInfo::blank_ballot());
    }
    for contest in contests {
        infos.extend(adjudicate_contest(contest, options));
    }

    let (enabled_reason_infos, ignored_reason_infos): (Vec<_>, Vec<_>) =
        infos.into_iter().partition(|info| enabled.contains(&info.reason));
    AdjudicationInfo {
        requires_adjudication: !enabled_reason_infos.is_empty(),
        enabled_reason_infos,
        ignored_reason_infos,
    }
}

/// Marked options per contest. Every contest on the page gets an entry, so
/// an empty list records that nothing was chosen.
pub fn collect_votes(contests: &[&Contest], options: &[ClassifiedOption]) -> VotesDict {
    contests
        .iter()
        .map(|contest| {
            let chosen = options
                .iter()
                .filter(|o| o.is_for(contest) && o.status == MarkStatus::Marked)
                .map(|o| o.option_id.clone())
                .collect();
            (contest.id.clone(), chosen)
        })
        .collect()
}
