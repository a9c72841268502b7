// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Election layout descriptor, supplied by the election-definition provider.
// The interpreter only reads it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::encoding::hmpb::MIN_COLUMNS;
use crate::error::{BallotwerkError, Result};
use crate::types::{ContestId, OptionId, PaperSize};

/// Hand-marked ballots encode the page number in three bits.
pub const MAX_PAGES_PER_STYLE: usize = 8;

/// Printed geometry shared by every hand-marked page of an election.
///
/// All lengths are in inches. Timing marks are centred on a regular grid whose
/// corner marks sit `mark_inset_in` from each page edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub paper_size: PaperSize,
    /// Timing marks across the top row.
    pub columns: u32,
    /// Timing marks down each side column.
    pub rows: u32,
    pub timing_mark_width_in: f64,
    pub timing_mark_height_in: f64,
    /// Distance from the page edge to the centre of a corner mark.
    pub mark_inset_in: f64,
    pub target_width_in: f64,
    pub target_height_in: f64,
    /// Thickness of the printed target outline.
    pub target_border_in: f64,
    /// Width of the handwriting area to the right of a write-in target, in grid columns.
    pub write_in_area_columns: f64,
}

impl GridGeometry {
    /// Standard geometry for the given paper.
    pub fn for_paper(paper_size: PaperSize) -> Self {
        let rows = match paper_size {
            PaperSize::Letter => 41,
            PaperSize::Legal => 53,
            PaperSize::Custom17 => 64,
            PaperSize::Custom22 => 83,
        };
        Self {
            paper_size,
            columns: 34,
            rows,
            timing_mark_width_in: 0.1875,
            timing_mark_height_in: 0.0625,
            mark_inset_in: 0.25,
            target_width_in: 0.2,
            target_height_in: 0.14,
            target_border_in: 0.02,
            write_in_area_columns: 5.0,
        }
    }

    pub fn column_spacing_in(&self) -> f64 {
        let (width, _) = self.paper_size.dimensions_in();
        (width - 2.0 * self.mark_inset_in) / (self.columns - 1) as f64
    }

    pub fn row_spacing_in(&self) -> f64 {
        let (_, height) = self.paper_size.dimensions_in();
        (height - 2.0 * self.mark_inset_in) / (self.rows - 1) as f64
    }

    /// Nominal position of a grid point on an undistorted page, in inches.
    pub fn point_in(&self, column: f64, row: f64) -> (f64, f64) {
        (
            self.mark_inset_in + column * self.column_spacing_in(),
            self.mark_inset_in + row * self.row_spacing_in(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if (self.columns as usize) < MIN_COLUMNS || self.rows < 3 {
            return Err(BallotwerkError::InvalidLayout(format!(
                "grid of {}x{} timing marks is too small (need at least {MIN_COLUMNS} columns and 3 rows)",
                self.columns, self.rows
            )));
        }
        let lengths = [
            self.timing_mark_width_in,
            self.timing_mark_height_in,
            self.mark_inset_in,
            self.target_width_in,
            self.target_height_in,
            self.target_border_in,
        ];
        if lengths.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(BallotwerkError::InvalidLayout(
                "grid geometry lengths must be positive".into(),
            ));
        }
        if self.timing_mark_width_in >= self.column_spacing_in()
            || self.timing_mark_height_in >= self.row_spacing_in()
        {
            return Err(BallotwerkError::InvalidLayout(
                "timing marks overlap their neighbours".into(),
            ));
        }
        if self.target_border_in * 2.0 >= self.target_height_in.min(self.target_width_in) {
            return Err(BallotwerkError::InvalidLayout(
                "target outline leaves no inner area".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestOption {
    pub id: OptionId,
    pub label: String,
    #[serde(default)]
    pub is_write_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub title: String,
    /// How many options a voter may select.
    pub seats: u32,
    pub options: Vec<ContestOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precinct {
    pub id: String,
    pub name: String,
}

/// Target position in timing-mark grid units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPosition {
    pub column: f64,
    pub row: f64,
}

/// Targets printed on one page, in contest/option order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub targets: Vec<GridPosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub id: String,
    pub precinct_ids: Vec<String>,
    /// Contests in ballot order, spanning all pages.
    pub contest_ids: Vec<ContestId>,
    pub pages: Vec<PageLayout>,
}

impl BallotStyle {
    /// Number of option targets on each page; the running-total input of the
    /// contest mapper.
    pub fn options_per_page(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.targets.len()).collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Everything the interpreter needs to know about an election's ballots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionLayout {
    pub title: String,
    pub grid: GridGeometry,
    pub contests: Vec<Contest>,
    pub precincts: Vec<Precinct>,
    pub ballot_styles: Vec<BallotStyle>,
}

impl ElectionLayout {
    pub fn contest(&self, id: &str) -> Option<&Contest> {
        self.contests.iter().find(|c| c.id == id)
    }

    pub fn ballot_style(&self, id: &str) -> Option<&BallotStyle> {
        self.ballot_styles.iter().find(|s| s.id == id)
    }

    pub fn ballot_style_at(&self, index: usize) -> Option<&BallotStyle> {
        self.ballot_styles.get(index)
    }

    pub fn ballot_style_index(&self, id: &str) -> Option<usize> {
        self.ballot_styles.iter().position(|s| s.id == id)
    }

    pub fn precinct_at(&self, index: usize) -> Option<&Precinct> {
        self.precincts.get(index)
    }

    pub fn precinct_index(&self, id: &str) -> Option<usize> {
        self.precincts.iter().position(|p| p.id == id)
    }

    /// The style's contests, resolved, in ballot order.
    pub fn style_contests(&self, style: &BallotStyle) -> Result<Vec<&Contest>> {
        style
            .contest_ids
            .iter()
            .map(|id| {
                self.contest(id).ok_or_else(|| {
                    BallotwerkError::InvalidLayout(format!(
                        "ballot style {} references unknown contest {id}",
                        style.id
                    ))
                })
            })
            .collect()
    }

    /// Total option targets across all of the style's contests.
    pub fn option_count(&self, style: &BallotStyle) -> Result<usize> {
        Ok(self
            .style_contests(style)?
            .iter()
            .map(|c| c.options.len())
            .sum())
    }

    /// Structural checks that do not depend on any scan.
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;

        if self.ballot_styles.is_empty() {
            return Err(BallotwerkError::InvalidLayout("no ballot styles".into()));
        }
        ensure_unique("contest", self.contests.iter().map(|c| c.id.as_str()))?;
        ensure_unique("precinct", self.precincts.iter().map(|p| p.id.as_str()))?;
        ensure_unique("ballot style", self.ballot_styles.iter().map(|s| s.id.as_str()))?;

        for contest in &self.contests {
            if contest.seats == 0 || contest.options.is_empty() {
                return Err(BallotwerkError::InvalidLayout(format!(
                    "contest {} needs at least one seat and one option",
                    contest.id
                )));
            }
            ensure_unique(
                &format!("option in contest {}", contest.id),
                contest.options.iter().map(|o| o.id.as_str()),
            )?;
        }

        let max_column = (self.grid.columns - 1) as f64;
        let max_row = (self.grid.rows - 1) as f64;
        for style in &self.ballot_styles {
            for precinct_id in &style.precinct_ids {
                if self.precinct_index(precinct_id).is_none() {
                    return Err(BallotwerkError::InvalidLayout(format!(
                        "ballot style {} references unknown precinct {precinct_id}",
                        style.id
                    )));
                }
            }
            if style.pages.is_empty() || style.pages.len() > MAX_PAGES_PER_STYLE {
                return Err(BallotwerkError::InvalidLayout(format!(
                    "ballot style {} has {} pages (allowed 1..={MAX_PAGES_PER_STYLE})",
                    style.id,
                    style.pages.len()
                )));
            }
            let options = self.option_count(style)?;
            let targets: usize = style.options_per_page().iter().sum();
            if options != targets {
                return Err(BallotwerkError::InvalidLayout(format!(
                    "ballot style {} has {options} options but {targets} targets",
                    style.id
                )));
            }
            for target in style.pages.iter().flat_map(|p| &p.targets) {
                if !(0.0..=max_column).contains(&target.column) || !(0.0..=max_row).contains(&target.row)
                {
                    return Err(BallotwerkError::InvalidLayout(format!(
                        "ballot style {} has a target at ({}, {}) outside the {}x{} grid",
                        style.id, target.column, target.row, self.grid.columns, self.grid.rows
                    )));
                }
            }
        }
        Ok(())
    }
}

fn ensure_unique<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(BallotwerkError::InvalidLayout(format!("duplicate {what} id {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> ContestOption {
        ContestOption {
            id: id.into(),
            label: id.to_uppercase(),
            is_write_in: false,
        }
    }

    fn layout() -> ElectionLayout {
        ElectionLayout {
            title: "Test Election".into(),
            grid: GridGeometry::for_paper(PaperSize::Letter),
            contests: vec![Contest {
                id: "mayor".into(),
                title: "Mayor".into(),
                seats: 1,
                options: vec![option("alice"), option("bob")],
            }],
            precincts: vec![Precinct {
                id: "p1".into(),
                name: "Precinct 1".into(),
            }],
            ballot_styles: vec![BallotStyle {
                id: "s1".into(),
                precinct_ids: vec!["p1".into()],
                contest_ids: vec!["mayor".into()],
                pages: vec![PageLayout {
                    targets: vec![
                        GridPosition { column: 5.0, row: 5.0 },
                        GridPosition { column: 5.0, row: 6.0 },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn letter_geometry_spacing() {
        let grid = GridGeometry::for_paper(PaperSize::Letter);
        assert!((grid.column_spacing_in() - 8.0 / 33.0).abs() < 1e-12);
        assert!((grid.row_spacing_in() - 0.2625).abs() < 1e-12);
        assert_eq!(grid.point_in(0.0, 0.0), (0.25, 0.25));
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn valid_layout_passes() {
        assert!(layout().validate().is_ok());
    }

    #[test]
    fn target_count_must_match_options() {
        let mut layout = layout();
        layout.ballot_styles[0].pages[0].targets.pop();
        assert!(matches!(layout.validate(), Err(BallotwerkError::InvalidLayout(_))));
    }

    #[test]
    fn unknown_contest_is_rejected() {
        let mut layout = layout();
        layout.ballot_styles[0].contest_ids.push("sheriff".into());
        let err = layout.validate().unwrap_err().to_string();
        assert!(err.contains("sheriff"), "{err}");
    }

    #[test]
    fn target_outside_grid_is_rejected() {
        let mut layout = layout();
        layout.ballot_styles[0].pages[0].targets[1].row = 99.0;
        assert!(layout.validate().is_err());
    }
}
