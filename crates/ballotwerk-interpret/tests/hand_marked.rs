// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end interpretation of rendered hand-marked sheets.

mod common;

use ballotwerk_core::config::ThresholdStrategy;
use ballotwerk_core::types::{
    AdjudicationReason, BallotFormat, Castability, MarkStatus, PageInterpretation,
};
use ballotwerk_fixtures::{Fill, HmpbPage, Side, upside_down};
use common::{Election, blank, votes};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

fn page_one(election: &Election) -> HmpbPage<'_> {
    HmpbPage::new(&election.layout, &election.fingerprint, "style-1", "precinct-1", 1)
}

fn page_two(election: &Election) -> HmpbPage<'_> {
    HmpbPage::new(&election.layout, &election.fingerprint, "style-1", "precinct-1", 2)
}

fn render(page: HmpbPage<'_>) -> GrayImage {
    page.render().expect("render page")
}

/// Single-page style-2 ballot voted for alice and yes.
fn alice_and_yes(election: &Election) -> HmpbPage<'_> {
    HmpbPage::new(&election.layout, &election.fingerprint, "style-2", "precinct-2", 1)
        .fill("mayor", "alice")
        .fill("measure-1", "yes")
}

fn assert_reads_alice_and_yes(election: &Election, front: GrayImage) {
    let result = election.interpret(front, blank());
    assert!(
        matches!(result.sheet.front, PageInterpretation::InterpretedHmpbPage { .. }),
        "{:?}",
        result.sheet.front
    );
    assert_eq!(result.votes, votes(&[("mayor", &["alice"]), ("measure-1", &["yes"])]));
    assert_eq!(result.castability, Castability::CastableWithoutReview);
}

/// Black out whole rows, as a scanner does along an edge it shadows.
fn shadow_rows(mut image: GrayImage, rows: std::ops::Range<u32>) -> GrayImage {
    let width = image.width();
    for y in rows {
        for x in 0..width {
            image.put_pixel(x, y, Luma([0]));
        }
    }
    image
}

/// A fully voted two-page ballot is read exactly and needs no review.
#[test]
fn two_page_ballot_reads_known_votes() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice").fill("council", "carol").fill("council", "dave"));
    let back = render(page_two(&election).fill("measure-1", "yes").fill("treasurer", "grace"));

    let result = election.interpret(front, back);

    assert_eq!(
        result.votes,
        votes(&[
            ("council", &["carol", "dave"]),
            ("mayor", &["alice"]),
            ("measure-1", &["yes"]),
            ("treasurer", &["grace"]),
        ])
    );
    assert_eq!(result.castability, Castability::CastableWithoutReview);
    let metadata = result.sheet.front.metadata().expect("front metadata");
    assert_eq!(metadata.ballot_style_id, "style-1");
    assert_eq!(metadata.precinct_id, "precinct-1");
    assert_eq!(metadata.ballot_format, BallotFormat::HandMarked);
    assert_eq!(result.sheet.back.page_number(), Some(2));
    assert_eq!(result.sheet.front.marks().len(), 6);
}

/// Contests with no selection still appear, with an empty vote list.
#[test]
fn unvoted_contests_have_empty_votes() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "bob"));
    let back = render(page_two(&election).fill("measure-1", "no"));

    let result = election.interpret(front, back);

    assert_eq!(
        result.votes,
        votes(&[
            ("council", &[]),
            ("mayor", &["bob"]),
            ("measure-1", &["no"]),
            ("treasurer", &[]),
        ])
    );
    // Undervotes are recorded but not enabled by default.
    let info = result.sheet.front.adjudication_info().expect("info");
    assert!(!info.requires_adjudication);
    assert!(info.ignored_reason_infos.iter().any(|i| i.reason == AdjudicationReason::Undervote));
    assert_eq!(result.castability, Castability::CastableWithoutReview);
}

#[test]
fn reversed_pages_are_reordered() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice"));
    let back = render(page_two(&election).fill("measure-1", "yes"));

    let result = election.interpret(back, front);

    assert_eq!(result.sheet.front.page_number(), Some(1));
    assert_eq!(result.sheet.back.page_number(), Some(2));
    assert_eq!(result.votes["mayor"], vec!["alice".to_string()]);
}

/// A sheet fed upside down reads exactly like the upright scan.
#[test]
fn upside_down_scan_matches_upright() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice").fill("council", "erin"));
    let back = render(page_two(&election).fill("treasurer", "frank"));

    let upright = election.interpret(front.clone(), back.clone());
    let flipped = election.interpret(upside_down(&front), upside_down(&back));

    assert_eq!(upright, flipped);
}

/// Interpreting the same images twice gives byte-identical output.
#[test]
fn interpretation_is_idempotent() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("council", "carol"));
    let back = render(page_two(&election));

    let first = serde_json::to_string(&election.interpret(front.clone(), back.clone())).expect("json");
    let second = serde_json::to_string(&election.interpret(front, back)).expect("json");

    assert_eq!(first, second);
}

#[test]
fn overvote_requires_review() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice").fill("mayor", "bob"));
    let back = render(page_two(&election).fill("measure-1", "yes"));

    let result = election.interpret(front, back);

    let info = result.sheet.front.adjudication_info().expect("info");
    assert!(info.has_enabled(AdjudicationReason::Overvote));
    let overvote = info
        .enabled_reason_infos
        .iter()
        .find(|i| i.reason == AdjudicationReason::Overvote)
        .expect("overvote");
    assert_eq!(overvote.contest_id.as_deref(), Some("mayor"));
    assert_eq!(overvote.option_ids, vec!["alice".to_string(), "bob".to_string()]);
    assert_eq!(result.castability, Castability::CastableWithReview);
}

#[test]
fn marginal_mark_is_flagged_not_counted() {
    let election = Election::sample();
    let front = render(
        HmpbPage::new(&election.layout, &election.fingerprint, "style-2", "precinct-2", 1)
            .fill_with("mayor", "alice", Fill::Partial(0.15))
            .fill("measure-1", "yes"),
    );

    let result = election.interpret(front, blank());

    let alice = result
        .sheet
        .front
        .marks()
        .iter()
        .find(|m| m.option_id == "alice")
        .expect("alice mark");
    assert_eq!(alice.status, MarkStatus::Marginal, "score {}", alice.score);
    assert!(result.votes["mayor"].is_empty());
    assert_eq!(result.votes["measure-1"], vec!["yes".to_string()]);
    assert!(result
        .sheet
        .front
        .adjudication_info()
        .expect("info")
        .has_enabled(AdjudicationReason::MarginalMark));
    assert_eq!(result.castability, Castability::CastableWithReview);
}

#[test]
fn write_in_reports_handwriting_area() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "mayor-write-in"));
    let back = render(page_two(&election).fill("measure-1", "no"));

    let result = election.interpret(front, back);

    let info = result.sheet.front.adjudication_info().expect("info");
    let write_in = info
        .enabled_reason_infos
        .iter()
        .find(|i| i.reason == AdjudicationReason::WriteIn)
        .expect("write-in");
    let area = write_in.write_in_area.expect("area");
    let target = result
        .sheet
        .front
        .marks()
        .iter()
        .find(|m| m.option_id == "mayor-write-in")
        .expect("mark")
        .target;
    assert_eq!(area.x, target.outer.right());
    assert!(area.width > 100, "{area:?}");
    assert_eq!(result.castability, Castability::CastableWithReview);
}

/// A single-page style with blank paper behind it is a complete ballot.
#[test]
fn single_sided_ballot_with_blank_back() {
    let election = Election::sample();
    let front = render(
        HmpbPage::new(&election.layout, &election.fingerprint, "style-2", "precinct-2", 1)
            .fill("mayor", "bob")
            .fill("measure-1", "no"),
    );

    let result = election.interpret(blank(), front);

    assert!(matches!(result.sheet.front, PageInterpretation::InterpretedHmpbPage { .. }));
    assert!(matches!(
        result.sheet.back,
        PageInterpretation::BlankPage { metadata: None, .. }
    ));
    assert_eq!(result.votes, votes(&[("mayor", &["bob"]), ("measure-1", &["no"])]));
    assert_eq!(result.castability, Castability::CastableWithoutReview);
}

#[test]
fn unmarked_ballot_is_blank_and_uncastable() {
    let election = Election::sample();
    let result = election.interpret(render(page_one(&election)), render(page_two(&election)));

    for page in [&result.sheet.front, &result.sheet.back] {
        let PageInterpretation::BlankPage {
            metadata,
            adjudication_info,
            ..
        } = page
        else {
            panic!("expected blank page, got {page:?}");
        };
        assert!(metadata.is_some());
        assert!(adjudication_info
            .as_ref()
            .expect("info")
            .has_enabled(AdjudicationReason::BlankBallot));
    }
    assert!(result.votes.is_empty());
    assert_eq!(result.castability, Castability::Uncastable);
}

#[test]
fn local_threshold_reads_the_same_votes() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice").fill("council", "dave"));
    let back = render(page_two(&election).fill("measure-1", "yes"));
    let config = election
        .config()
        .with_threshold_strategy(ThresholdStrategy::LocalOtsu);

    let global = election.interpret(front.clone(), back.clone());
    let local = election.interpret_with(&config, front, back);

    assert_eq!(global.votes, local.votes);
}

#[test]
fn missing_timing_mark_is_tolerated_only_when_configured() {
    let election = Election::sample();
    let front = render(page_one(&election).fill("mayor", "alice").omit_mark(Side::Left, 10));
    let back = render(page_two(&election).fill("measure-1", "yes"));

    let strict = election.interpret(front.clone(), back.clone());
    assert!(strict.sheet.front.is_unreadable(), "{:?}", strict.sheet.front);
    assert_eq!(strict.castability, Castability::Uncastable);

    let config = election.config().with_max_missing_timing_marks(1);
    let tolerant = election.interpret_with(&config, front, back);
    assert_eq!(tolerant.votes["mayor"], vec!["alice".to_string()]);
    assert_eq!(tolerant.castability, Castability::CastableWithoutReview);
}

// -- Edge shadow --------------------------------------------------------------

/// A dark band along the bottom edge outweighs the top timing marks, but the
/// page still reads upright.
#[test]
fn trailing_edge_shadow_keeps_upright_page() {
    let election = Election::sample();
    let page = render(alice_and_yes(&election));
    let height = page.height();

    assert_reads_alice_and_yes(&election, shadow_rows(page.clone(), 0..3));
    assert_reads_alice_and_yes(&election, shadow_rows(page, height - 3..height));
}

/// The same band on the leading edge of an upside-down scan.
#[test]
fn leading_edge_shadow_on_upside_down_scan() {
    let election = Election::sample();
    let page = upside_down(&render(alice_and_yes(&election)));

    assert_reads_alice_and_yes(&election, shadow_rows(page, 0..3));
}

// -- Scan geometry ------------------------------------------------------------

#[test]
fn higher_resolutions_read_the_same_votes() {
    let election = Election::sample();
    for ppi in [150.0, 200.0] {
        let page = render(alice_and_yes(&election).ppi(ppi));
        assert_eq!(page.width(), (8.5 * ppi) as u32);
        assert_reads_alice_and_yes(&election, page);
    }
}

/// Paper that slipped in the feed comes out a little taller than it is.
#[test]
fn vertical_stretch_is_tolerated() {
    let election = Election::sample();
    let page = render(alice_and_yes(&election));
    let (width, height) = page.dimensions();
    let stretched = imageops::resize(&page, width, height * 102 / 100, FilterType::Nearest);

    assert_reads_alice_and_yes(&election, stretched);
}

#[test]
fn skewed_scans_are_tolerated() {
    let election = Election::sample();
    let page = render(alice_and_yes(&election));
    for degrees in [0.5f32, 1.0] {
        let skewed =
            rotate_about_center(&page, degrees.to_radians(), Interpolation::Bilinear, Luma([255]));
        assert_reads_alice_and_yes(&election, skewed);
    }
}

#[test]
fn feed_offset_is_tolerated() {
    let election = Election::sample();
    let page = render(alice_and_yes(&election));
    let mut shifted = GrayImage::from_pixel(page.width(), page.height(), Luma([255]));
    imageops::overlay(&mut shifted, &page, 5, 5);

    assert_reads_alice_and_yes(&election, shifted);
}
