// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contest mapping: which contests a page holds, and where each option's
// target sits on the scanned image.

use ballotwerk_core::error::{BallotwerkError, Result};
use ballotwerk_core::layout::{BallotStyle, Contest, ContestOption, ElectionLayout};
use ballotwerk_core::types::{PixelRect, TargetShape};

use crate::grid::{CompletedGrid, Geometry};

/// One option's target, located on the page.
#[derive(Debug, Clone)]
pub struct MappedTarget<'a> {
    pub contest: &'a Contest,
    pub option: &'a ContestOption,
    pub shape: TargetShape,
    pub write_in_area: Option<PixelRect>,
}

/// Contests printed on `page_number` (1-based) of a style.
///
/// Pages hold consecutive contests; each page's target count is a running
/// total over the style's contest list. A page number the style does not
/// have, an empty page, or a page break inside a contest is a layout fault.
pub fn contests_for_page<'a>(
    layout: &'a ElectionLayout,
    style: &BallotStyle,
    page_number: u32,
) -> Result<Vec<&'a Contest>> {
    let per_page = style.options_per_page();
    let page_index = (page_number as usize)
        .checked_sub(1)
        .filter(|&i| i < per_page.len())
        .ok_or_else(|| {
            BallotwerkError::InvalidLayout(format!(
                "ballot style {} has no page {page_number} (pages 1..={})",
                style.id,
                per_page.len()
            ))
        })?;
    let start: usize = per_page[..page_index].iter().sum();
    let end = start + per_page[page_index];

    let mut contests = Vec::new();
    let mut offset = 0;
    for contest in layout.style_contests(style)? {
        let next = offset + contest.options.len();
        let straddles = (offset < start && start < next) || (offset < end && end < next);
        if straddles {
            return Err(BallotwerkError::InvalidLayout(format!(
                "ballot style {} breaks contest {} across pages",
                style.id, contest.id
            )));
        }
        if offset >= start && next <= end {
            contests.push(contest);
        }
        offset = next;
    }

    if contests.is_empty() {
        return Err(BallotwerkError::InvalidLayout(format!(
            "page {page_number} of ballot style {} has no contests",
            style.id
        )));
    }
    Ok(contests)
}

/// Structural layout checks plus a contest mapping of every page.
pub fn validate_layout(layout: &ElectionLayout) -> Result<()> {
    layout.validate()?;
    for style in &layout.ballot_styles {
        for page_number in 1..=style.page_count() as u32 {
            contests_for_page(layout, style, page_number)?;
        }
    }
    Ok(())
}

/// Every target on the page, in contest/option order, with pixel bounds from
/// the detected grid.
pub fn map_page_targets<'a>(
    layout: &'a ElectionLayout,
    style: &'a BallotStyle,
    page_number: u32,
    grid: &CompletedGrid,
    geometry: &Geometry,
) -> Result<Vec<MappedTarget<'a>>> {
    let contests = contests_for_page(layout, style, page_number)?;
    let positions = &style.pages[page_number as usize - 1].targets;
    let options = contests.iter().copied().flat_map(|contest: &'a Contest| {
        contest.options.iter().map(move |option| (contest, option))
    });

    let ppi = geometry.pixels_per_inch;
    let printed = &layout.grid;
    let width = (printed.target_width_in * ppi).round();
    let height = (printed.target_height_in * ppi).round();
    let border = (printed.target_border_in * ppi).round() as u32;

    Ok(options
        .zip(positions)
        .map(|((contest, option), position)| {
            let center = grid.point(position.column, position.row);
            let outer = PixelRect::centered_at(center.x, center.y, width, height);
            let shape = TargetShape {
                outer,
                inner: outer.inset(border + 1),
            };
            let write_in_area = option.is_write_in.then(|| {
                let far = grid.point(position.column + printed.write_in_area_columns, position.row);
                let area_height = geometry.row_spacing_px.round();
                PixelRect::new(
                    outer.right(),
                    (center.y - area_height / 2.0).round() as i32,
                    (far.x.round() as i32 - outer.right()).max(1) as u32,
                    area_height as u32,
                )
            });
            MappedTarget {
                contest,
                option,
                shape,
                write_in_area,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotwerk_core::layout::{GridGeometry, GridPosition, PageLayout, Precinct};
    use ballotwerk_core::types::PaperSize;

    fn contest(id: &str, options: usize) -> Contest {
        Contest {
            id: id.into(),
            title: id.into(),
            seats: 1,
            options: (0..options)
                .map(|i| ContestOption {
                    id: format!("{id}-{i}"),
                    label: format!("Option {i}"),
                    is_write_in: false,
                })
                .collect(),
        }
    }

    fn targets(count: usize) -> PageLayout {
        PageLayout {
            targets: (0..count)
                .map(|i| GridPosition {
                    column: 3.0,
                    row: 5.0 + i as f64,
                })
                .collect(),
        }
    }

    fn layout(page_sizes: &[usize]) -> ElectionLayout {
        ElectionLayout {
            title: "Mapper".into(),
            grid: GridGeometry::for_paper(PaperSize::Letter),
            contests: vec![contest("a", 2), contest("b", 3), contest("c", 2)],
            precincts: vec![Precinct {
                id: "p".into(),
                name: "P".into(),
            }],
            ballot_styles: vec![BallotStyle {
                id: "s".into(),
                precinct_ids: vec!["p".into()],
                contest_ids: vec!["a".into(), "b".into(), "c".into()],
                pages: page_sizes.iter().map(|&n| targets(n)).collect(),
            }],
        }
    }

    fn ids(contests: &[&Contest]) -> Vec<String> {
        contests.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn running_total_assigns_contests_to_pages() {
        let layout = layout(&[5, 2]);
        let style = &layout.ballot_styles[0];
        assert_eq!(ids(&contests_for_page(&layout, style, 1).expect("page 1")), ["a", "b"]);
        assert_eq!(ids(&contests_for_page(&layout, style, 2).expect("page 2")), ["c"]);
        assert!(validate_layout(&layout).is_ok());
    }

    #[test]
    fn page_beyond_style_is_fatal() {
        let layout = layout(&[7]);
        let style = &layout.ballot_styles[0];
        assert!(matches!(
            contests_for_page(&layout, style, 2),
            Err(BallotwerkError::InvalidLayout(_))
        ));
        assert!(contests_for_page(&layout, style, 0).is_err());
    }

    #[test]
    fn page_break_inside_contest_is_fatal() {
        let layout = layout(&[3, 4]);
        let err = validate_layout(&layout).unwrap_err().to_string();
        assert!(err.contains("contest b"), "{err}");
    }

    #[test]
    fn empty_page_is_fatal() {
        let layout = layout(&[7, 0]);
        assert!(validate_layout(&layout).is_err());
    }
}
