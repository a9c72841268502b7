// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet interpreter — runs both pages through preprocessing, metadata
// decoding, scoring and adjudication, then resolves page order and
// castability for the sheet as a whole.

use std::time::Instant;

use ballotwerk_core::config::InterpreterConfig;
use ballotwerk_core::error::{BallotwerkError, Result};
use ballotwerk_core::layout::{BallotStyle, ElectionLayout};
use ballotwerk_core::types::{
    BallotFormat, BallotMetadata, InterpretedSheet, MarkStatus, PageInterpretation, Sheet,
    UnreadableReason, VotesDict,
};
use rayon::prelude::*;
use tracing::{Span, debug, info, info_span, instrument, warn};

use crate::adjudication::{ClassifiedOption, adjudicate_page, collect_votes};
use crate::castability::determine_castability;
use crate::grid::DetectedGrid;
use crate::mapper::{contests_for_page, map_page_targets, validate_layout};
use crate::metadata::{DecodeContext, DecodeFailure, DecodedPage, decode_page};
use crate::page::preprocess::normalize;
use crate::page::{NormalizedPage, RasterImage};
use crate::scoring::{ScoringParams, score_targets};

// -- Context ------------------------------------------------------------------

/// Identifies one sheet in logs. Both page workers enter the same span, so
/// every event for the sheet carries its label. The span is a root: a sheet
/// picked up by a busy pool thread never nests under another sheet.
#[derive(Debug, Clone)]
pub struct SheetContext {
    label: String,
    span: Span,
}

impl SheetContext {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let span = info_span!(parent: None, "sheet", sheet = %label);
        Self { label, span }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Both scans of one sheet, for batch interpretation.
#[derive(Debug, Clone)]
pub struct SheetImages {
    pub label: String,
    pub front: RasterImage,
    pub back: RasterImage,
}

// -- Interpreter --------------------------------------------------------------

/// Interprets sheets for one election. Holds no state between sheets, so the
/// same input always yields the same output.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'a> {
    layout: &'a ElectionLayout,
    config: &'a InterpreterConfig,
}

impl<'a> Interpreter<'a> {
    /// Validate the configuration and layout once, up front.
    pub fn new(layout: &'a ElectionLayout, config: &'a InterpreterConfig) -> Result<Self> {
        config.validate()?;
        validate_layout(layout)?;
        debug!(
            styles = layout.ballot_styles.len(),
            contests = layout.contests.len(),
            "Interpreter ready"
        );
        Ok(Self { layout, config })
    }

    /// Interpret both sides of a sheet. The two pages are processed in
    /// parallel; fatal errors on either side fail the whole sheet.
    pub fn interpret_sheet(
        &self,
        front: RasterImage,
        back: RasterImage,
        ctx: &SheetContext,
    ) -> Result<InterpretedSheet> {
        let span = ctx.span();
        let started = Instant::now();

        if front.channels() != back.channels() {
            let err = BallotwerkError::ChannelMismatch {
                expected: front.channels(),
                actual: back.channels(),
            };
            span.in_scope(|| warn!(%err, "Sheet rejected"));
            return Err(err);
        }

        // Entered per closure, never held across the join: a thread blocked in
        // it may run another sheet's page.
        let (front, back) = rayon::join(
            move || span.in_scope(|| self.interpret_page(front)),
            move || span.in_scope(|| self.interpret_page(back)),
        );

        span.in_scope(|| -> Result<InterpretedSheet> {
            let (front, back) = resolve_page_order(front?, back?);
            let (front, back) = check_same_sheet(front, back);

            let sheet = Sheet { front, back };
            let votes = merge_votes(&sheet);
            let castability = determine_castability(&sheet);

            info!(
                ?castability,
                contests = votes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sheet interpreted"
            );
            Ok(InterpretedSheet {
                sheet,
                votes,
                castability,
            })
        })
    }

    /// Interpret many sheets across the thread pool. Results are in input order.
    #[instrument(skip_all, fields(sheets = sheets.len()))]
    pub fn interpret_sheets(&self, sheets: Vec<SheetImages>) -> Vec<Result<InterpretedSheet>> {
        sheets
            .into_par_iter()
            .map(|sheet| {
                let ctx = SheetContext::new(sheet.label);
                self.interpret_sheet(sheet.front, sheet.back, &ctx)
            })
            .collect()
    }

    /// Interpret a single page. Scan problems become `UnreadablePage`; only
    /// configuration and layout faults are errors.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn interpret_page(&self, image: RasterImage) -> Result<PageInterpretation> {
        let gray = image.into_luma()?;

        debug!(stage = "preprocess", "Normalizing page");
        let page = match normalize(gray) {
            Ok(page) => page,
            Err(reason) => return Ok(unreadable(reason)),
        };

        debug!(stage = "decode", "Decoding metadata");
        let ctx = DecodeContext {
            layout: self.layout,
            config: self.config,
        };
        let (page, decoded) = self.decode_either_way(page, &ctx);
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(DecodeFailure::Unreadable(reason)) => return Ok(unreadable(reason)),
            Err(DecodeFailure::NotThisFormat(reason)) => {
                return Ok(if page.ink_ratio <= self.config.blank_page_max_ink_ratio {
                    debug!(ink_ratio = page.ink_ratio, "Page is blank paper");
                    PageInterpretation::BlankPage {
                        metadata: None,
                        marks: Vec::new(),
                        adjudication_info: None,
                    }
                } else {
                    unreadable(reason)
                });
            }
        };

        match decoded {
            DecodedPage::HandMarked { metadata, grid } => {
                self.interpret_hand_marked(&page, metadata, &grid)
            }
            DecodedPage::MachinePrinted {
                metadata,
                selections,
            } => self.interpret_machine_printed(metadata, &selections),
        }
    }

    /// Decode in the orientation preprocessing chose, then once more turned
    /// 180° if the failure looks like a page read upside down. Blank paper is
    /// not retried. When both attempts fail the first failure is kept.
    fn decode_either_way(
        &self,
        page: NormalizedPage,
        ctx: &DecodeContext<'_>,
    ) -> (NormalizedPage, std::result::Result<DecodedPage, DecodeFailure>) {
        let first = match decode_page(&page, ctx) {
            Ok(decoded) => return (page, Ok(decoded)),
            Err(failure) => failure,
        };
        let blank = page.ink_ratio <= self.config.blank_page_max_ink_ratio;
        if blank || !first.may_be_upside_down() {
            return (page, Err(first));
        }

        let turned = page.rotated();
        match decode_page(&turned, ctx) {
            Ok(decoded) => {
                warn!(
                    orientation = ?turned.orientation,
                    first_reason = ?first.reason(),
                    "Page decoded only after turning it over"
                );
                (turned, Ok(decoded))
            }
            Err(second) => {
                debug!(?second, "Turned page did not decode either");
                (page, Err(first))
            }
        }
    }

    fn interpret_hand_marked(
        &self,
        page: &NormalizedPage,
        metadata: BallotMetadata,
        grid: &DetectedGrid,
    ) -> Result<PageInterpretation> {
        let style = self.style(&metadata)?;
        debug!(stage = "score", page_number = metadata.page_number, "Scoring targets");
        let targets = map_page_targets(
            self.layout,
            style,
            metadata.page_number,
            &grid.completed,
            &grid.geometry,
        )?;
        let params = ScoringParams {
            page_threshold: page.threshold,
            strategy: self.config.threshold_strategy,
            search_radius: (self.config.alignment_search_inches * grid.geometry.pixels_per_inch)
                .round() as i32,
            thresholds: self.config.mark_thresholds,
        };
        let marks = score_targets(&page.image, &targets, &params);

        debug!(stage = "adjudicate", "Adjudicating page");
        let options: Vec<ClassifiedOption> = marks
            .iter()
            .zip(&targets)
            .map(|(mark, target)| ClassifiedOption {
                contest_id: mark.contest_id.clone(),
                option_id: mark.option_id.clone(),
                status: mark.status,
                is_write_in: target.option.is_write_in,
                write_in_area: target.write_in_area,
            })
            .collect();
        let contests = contests_for_page(self.layout, style, metadata.page_number)?;
        let adjudication_info =
            adjudicate_page(&contests, &options, &self.config.enabled_adjudication_reasons);

        if marks.iter().all(|m| m.status == MarkStatus::Unmarked) {
            return Ok(PageInterpretation::BlankPage {
                metadata: Some(metadata),
                marks,
                adjudication_info: Some(adjudication_info),
            });
        }
        Ok(PageInterpretation::InterpretedHmpbPage {
            votes: collect_votes(&contests, &options),
            metadata,
            marks,
            adjudication_info,
        })
    }

    fn interpret_machine_printed(
        &self,
        metadata: BallotMetadata,
        selections: &[bool],
    ) -> Result<PageInterpretation> {
        let style = self.style(&metadata)?;
        let contests = self.layout.style_contests(style)?;
        let options: Vec<ClassifiedOption> = contests
            .iter()
            .flat_map(|contest| contest.options.iter().map(move |option| (contest, option)))
            .zip(selections)
            .map(|((contest, option), &selected)| ClassifiedOption {
                contest_id: contest.id.clone(),
                option_id: option.id.clone(),
                status: if selected {
                    MarkStatus::Marked
                } else {
                    MarkStatus::Unmarked
                },
                is_write_in: option.is_write_in,
                write_in_area: None,
            })
            .collect();

        debug!(stage = "adjudicate", "Adjudicating page");
        let adjudication_info =
            adjudicate_page(&contests, &options, &self.config.enabled_adjudication_reasons);

        if !selections.contains(&true) {
            return Ok(PageInterpretation::BlankPage {
                metadata: Some(metadata),
                marks: Vec::new(),
                adjudication_info: Some(adjudication_info),
            });
        }
        Ok(PageInterpretation::InterpretedBmdPage {
            votes: collect_votes(&contests, &options),
            metadata,
            adjudication_info,
        })
    }

    fn style(&self, metadata: &BallotMetadata) -> Result<&'a BallotStyle> {
        self.layout
            .ballot_style(&metadata.ballot_style_id)
            .ok_or_else(|| {
                BallotwerkError::InvalidLayout(format!(
                    "unknown ballot style {}",
                    metadata.ballot_style_id
                ))
            })
    }
}

/// Interpret one sheet without keeping an [`Interpreter`] around.
pub fn interpret_sheet(
    front: RasterImage,
    back: RasterImage,
    layout: &ElectionLayout,
    config: &InterpreterConfig,
    ctx: &SheetContext,
) -> Result<InterpretedSheet> {
    Interpreter::new(layout, config)?.interpret_sheet(front, back, ctx)
}

// -- Sheet-level rules --------------------------------------------------------

fn unreadable(reason: UnreadableReason) -> PageInterpretation {
    PageInterpretation::UnreadablePage { reason }
}

/// Put the odd page in front. With both page numbers known the lower one
/// leads; with one known, its parity decides which side it belongs on.
fn resolve_page_order(
    front: PageInterpretation,
    back: PageInterpretation,
) -> (PageInterpretation, PageInterpretation) {
    let swap = match (front.page_number(), back.page_number()) {
        (Some(f), Some(b)) => f > b,
        (Some(f), None) => f % 2 == 0,
        (None, Some(b)) => b % 2 == 1,
        (None, None) => false,
    };
    if swap {
        debug!("Swapping front and back pages");
        (back, front)
    } else {
        (front, back)
    }
}

/// Both pages must be consecutive pages of the same printed ballot. If they
/// are not, neither can be trusted.
fn check_same_sheet(
    front: PageInterpretation,
    back: PageInterpretation,
) -> (PageInterpretation, PageInterpretation) {
    let (Some(f), Some(b)) = (front.metadata(), back.metadata()) else {
        return (front, back);
    };
    let Some(detail) = sheet_mismatch(f, b) else {
        return (front, back);
    };
    warn!(%detail, "Pages do not belong to the same sheet");
    let reason = UnreadableReason::MismatchedSheet { detail };
    (unreadable(reason.clone()), unreadable(reason))
}

fn sheet_mismatch(front: &BallotMetadata, back: &BallotMetadata) -> Option<String> {
    if front.ballot_format != back.ballot_format {
        return Some(format!(
            "front is {:?} but back is {:?}",
            front.ballot_format, back.ballot_format
        ));
    }
    if front.ballot_format == BallotFormat::MachinePrinted {
        return Some("both sides carry a machine-printed summary".into());
    }
    if front.ballot_style_id != back.ballot_style_id {
        return Some(format!(
            "ballot styles differ ({} and {})",
            front.ballot_style_id, back.ballot_style_id
        ));
    }
    if front.precinct_id != back.precinct_id {
        return Some(format!(
            "precincts differ ({} and {})",
            front.precinct_id, back.precinct_id
        ));
    }
    if front.is_test_mode != back.is_test_mode {
        return Some("one side is a test ballot".into());
    }
    if front.page_number % 2 != 1 || back.page_number != front.page_number + 1 {
        return Some(format!(
            "pages {} and {} are not two sides of one sheet",
            front.page_number, back.page_number
        ));
    }
    None
}

/// Votes from both interpreted pages. Contests never span pages.
fn merge_votes(sheet: &Sheet) -> VotesDict {
    let mut votes = VotesDict::new();
    for page in [&sheet.front, &sheet.back] {
        if let Some(page_votes) = page.votes() {
            votes.extend(page_votes.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotwerk_core::types::AdjudicationInfo;

    fn hmpb_page(page_number: u32, style: &str) -> PageInterpretation {
        PageInterpretation::InterpretedHmpbPage {
            metadata: BallotMetadata {
                ballot_style_id: style.into(),
                precinct_id: "p1".into(),
                page_number,
                is_test_mode: false,
                election_fingerprint: "abc".into(),
                ballot_format: BallotFormat::HandMarked,
            },
            votes: [(format!("contest-{page_number}"), vec!["yes".to_string()])]
                .into_iter()
                .collect(),
            marks: vec![],
            adjudication_info: AdjudicationInfo::default(),
        }
    }

    fn blank() -> PageInterpretation {
        PageInterpretation::BlankPage {
            metadata: None,
            marks: vec![],
            adjudication_info: None,
        }
    }

    #[test]
    fn pages_out_of_order_are_swapped() {
        let (front, back) = resolve_page_order(hmpb_page(2, "s"), hmpb_page(1, "s"));
        assert_eq!(front.page_number(), Some(1));
        assert_eq!(back.page_number(), Some(2));
    }

    /// A lone odd page belongs in front, a lone even page in back.
    #[test]
    fn single_numbered_page_is_placed_by_parity() {
        let (front, _) = resolve_page_order(blank(), hmpb_page(1, "s"));
        assert_eq!(front.page_number(), Some(1));
        let (front, back) = resolve_page_order(hmpb_page(2, "s"), blank());
        assert!(front.is_blank());
        assert_eq!(back.page_number(), Some(2));
        let (front, _) = resolve_page_order(hmpb_page(3, "s"), blank());
        assert_eq!(front.page_number(), Some(3));
    }

    #[test]
    fn pages_from_different_styles_are_mismatched() {
        let (front, back) = check_same_sheet(hmpb_page(1, "s1"), hmpb_page(2, "s2"));
        assert!(front.is_unreadable() && back.is_unreadable());
        assert!(matches!(
            front,
            PageInterpretation::UnreadablePage {
                reason: UnreadableReason::MismatchedSheet { .. }
            }
        ));
    }

    #[test]
    fn non_adjacent_pages_are_mismatched() {
        let (front, _) = check_same_sheet(hmpb_page(1, "s"), hmpb_page(3, "s"));
        assert!(front.is_unreadable());
        let (front, back) = check_same_sheet(hmpb_page(3, "s"), hmpb_page(4, "s"));
        assert!(!front.is_unreadable() && !back.is_unreadable());
    }

    /// Sheet spans start a new trace even when created inside another span.
    #[test]
    fn sheet_span_is_a_root() {
        use tracing_subscriber::registry::{LookupSpan, Registry};

        tracing::subscriber::with_default(Registry::default(), || {
            let batch = info_span!("batch");
            let _entered = batch.enter();
            let ctx = SheetContext::new("sheet-7");
            let nested = info_span!("nested");
            let sheet_id = ctx.span().id().expect("sheet span enabled");
            let nested_id = nested.id().expect("nested span enabled");

            tracing::dispatcher::get_default(|dispatch| {
                let registry = dispatch.downcast_ref::<Registry>().expect("registry");
                let sheet = registry.span(&sheet_id).expect("sheet span");
                assert_eq!(sheet.name(), "sheet");
                assert!(sheet.parent().is_none());
                let nested = registry.span(&nested_id).expect("nested span");
                assert_eq!(nested.parent().map(|p| p.name()), Some("batch"));
            });
        });
    }

    #[test]
    fn votes_merge_across_pages() {
        let sheet = Sheet {
            front: hmpb_page(1, "s"),
            back: hmpb_page(2, "s"),
        };
        let votes = merge_votes(&sheet);
        assert_eq!(votes.len(), 2);
        assert_eq!(votes["contest-2"], vec!["yes".to_string()]);
    }
}
