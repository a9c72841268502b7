// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ballotwerk-fixtures — A sample election layout and renderers that print its
// ballots to clean synthetic scans: hand-marked pages with timing marks and
// filled targets, machine-printed summaries with a QR code, and blank paper.

use ballotwerk_core::encoding::{BmdPayload, HmpbMetadataBits};
use ballotwerk_core::error::{BallotwerkError, Result};
use ballotwerk_core::fingerprint::election_fingerprint;
use ballotwerk_core::layout::{
    BallotStyle, Contest, ContestOption, ElectionLayout, GridGeometry, GridPosition, PageLayout,
    Precinct,
};
use ballotwerk_core::types::{PaperSize, PixelRect, VotesDict};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use qrcode::{Color, QrCode};

/// Resolution of rendered pages unless overridden.
pub const DEFAULT_PPI: f64 = 100.0;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

// -- Sample election ----------------------------------------------------------

fn option(id: &str, label: &str) -> ContestOption {
    ContestOption {
        id: id.into(),
        label: label.into(),
        is_write_in: false,
    }
}

fn write_in(id: &str) -> ContestOption {
    ContestOption {
        id: id.into(),
        label: "Write-in".into(),
        is_write_in: true,
    }
}

fn column_of_targets(column: f64, first_row: f64, count: usize) -> Vec<GridPosition> {
    (0..count)
        .map(|i| GridPosition {
            column,
            row: first_row + i as f64,
        })
        .collect()
}

/// A small letter-size election.
///
/// - `style-1` (precincts 1 and 2): mayor and council on page 1, measure and
///   treasurer on page 2.
/// - `style-2` (precinct 2): mayor and measure on a single page.
pub fn sample_layout() -> ElectionLayout {
    let contests = vec![
        Contest {
            id: "mayor".into(),
            title: "Mayor".into(),
            seats: 1,
            options: vec![option("alice", "Alice Adams"), option("bob", "Bob Baker"), write_in("mayor-write-in")],
        },
        Contest {
            id: "council".into(),
            title: "City Council".into(),
            seats: 2,
            options: vec![
                option("carol", "Carol Chen"),
                option("dave", "Dave Diaz"),
                option("erin", "Erin Evans"),
            ],
        },
        Contest {
            id: "measure-1".into(),
            title: "Measure 1".into(),
            seats: 1,
            options: vec![option("yes", "Yes"), option("no", "No")],
        },
        Contest {
            id: "treasurer".into(),
            title: "Treasurer".into(),
            seats: 1,
            options: vec![option("frank", "Frank Fox"), option("grace", "Grace Green")],
        },
    ];

    let page = |groups: Vec<Vec<GridPosition>>| PageLayout {
        targets: groups.into_iter().flatten().collect(),
    };

    ElectionLayout {
        title: "Sample General Election".into(),
        grid: GridGeometry::for_paper(PaperSize::Letter),
        contests,
        precincts: vec![
            Precinct {
                id: "precinct-1".into(),
                name: "North".into(),
            },
            Precinct {
                id: "precinct-2".into(),
                name: "South".into(),
            },
        ],
        ballot_styles: vec![
            BallotStyle {
                id: "style-1".into(),
                precinct_ids: vec!["precinct-1".into(), "precinct-2".into()],
                contest_ids: vec![
                    "mayor".into(),
                    "council".into(),
                    "measure-1".into(),
                    "treasurer".into(),
                ],
                pages: vec![
                    page(vec![column_of_targets(2.0, 6.0, 3), column_of_targets(2.0, 12.0, 3)]),
                    page(vec![column_of_targets(2.0, 6.0, 2), column_of_targets(18.0, 6.0, 2)]),
                ],
            },
            BallotStyle {
                id: "style-2".into(),
                precinct_ids: vec!["precinct-2".into()],
                contest_ids: vec!["mayor".into(), "measure-1".into()],
                pages: vec![page(vec![
                    column_of_targets(2.0, 6.0, 3),
                    column_of_targets(18.0, 6.0, 2),
                ])],
            },
        ],
    }
}

/// The sample layout's fingerprint.
pub fn sample_fingerprint() -> Result<String> {
    election_fingerprint(&sample_layout())
}

// -- Drawing ------------------------------------------------------------------

pub fn page_size_px(paper: PaperSize, ppi: f64) -> (u32, u32) {
    let (w, h) = paper.dimensions_in();
    ((w * ppi).round() as u32, (h * ppi).round() as u32)
}

/// White paper.
pub fn blank_page(paper: PaperSize, ppi: f64) -> GrayImage {
    let (w, h) = page_size_px(paper, ppi);
    GrayImage::from_pixel(w, h, PAPER)
}

fn fill_rect(image: &mut GrayImage, rect: PixelRect, color: Luma<u8>) {
    if rect.width > 0 && rect.height > 0 {
        draw_filled_rect_mut(
            image,
            Rect::at(rect.x, rect.y).of_size(rect.width, rect.height),
            color,
        );
    }
}

/// Rectangle of a size in inches centred on a grid point.
fn rect_at(ppi: f64, (x, y): (f64, f64), width_in: f64, height_in: f64) -> PixelRect {
    PixelRect::centered_at(x * ppi, y * ppi, (width_in * ppi).round(), (height_in * ppi).round())
}

/// How a voter filled a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Full,
    /// The left part of the area inside the outline, as a fraction of its width.
    Partial(f64),
}

/// Which border column a timing mark belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

// -- Hand-marked pages --------------------------------------------------------

/// Builder for one rendered hand-marked page.
#[derive(Debug, Clone)]
pub struct HmpbPage<'a> {
    layout: &'a ElectionLayout,
    fingerprint: String,
    style_id: String,
    precinct_id: String,
    page_number: u32,
    test_mode: bool,
    ppi: f64,
    fills: Vec<(String, String, Fill)>,
    omitted_marks: Vec<(Side, u32)>,
    flipped_bits: Vec<usize>,
}

impl<'a> HmpbPage<'a> {
    pub fn new(
        layout: &'a ElectionLayout,
        fingerprint: &str,
        style_id: &str,
        precinct_id: &str,
        page_number: u32,
    ) -> Self {
        Self {
            layout,
            fingerprint: fingerprint.into(),
            style_id: style_id.into(),
            precinct_id: precinct_id.into(),
            page_number,
            test_mode: false,
            ppi: DEFAULT_PPI,
            fills: Vec::new(),
            omitted_marks: Vec::new(),
            flipped_bits: Vec::new(),
        }
    }

    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn ppi(mut self, ppi: f64) -> Self {
        self.ppi = ppi;
        self
    }

    pub fn fill(self, contest_id: &str, option_id: &str) -> Self {
        self.fill_with(contest_id, option_id, Fill::Full)
    }

    pub fn fill_with(mut self, contest_id: &str, option_id: &str, fill: Fill) -> Self {
        self.fills.push((contest_id.into(), option_id.into(), fill));
        self
    }

    /// Leave out one side-column timing mark, as if torn or smudged away.
    pub fn omit_mark(mut self, side: Side, row: u32) -> Self {
        self.omitted_marks.push((side, row));
        self
    }

    /// Toggle one bottom-row mark after encoding, corrupting the metadata.
    pub fn flip_bottom_bit(mut self, column: usize) -> Self {
        self.flipped_bits.push(column);
        self
    }

    pub fn render(&self) -> Result<GrayImage> {
        let grid = &self.layout.grid;
        let style = self.style()?;
        let mut image = blank_page(grid.paper_size, self.ppi);

        // Timing marks.
        let mark = |image: &mut GrayImage, column: f64, row: f64| {
            let rect = rect_at(
                self.ppi,
                grid.point_in(column, row),
                grid.timing_mark_width_in,
                grid.timing_mark_height_in,
            );
            fill_rect(image, rect, INK);
        };
        let last_column = grid.columns - 1;
        let last_row = grid.rows - 1;
        for column in 0..grid.columns {
            mark(&mut image, column as f64, 0.0);
        }
        for row in 0..grid.rows {
            if !self.omitted_marks.contains(&(Side::Left, row)) {
                mark(&mut image, 0.0, row as f64);
            }
            if !self.omitted_marks.contains(&(Side::Right, row)) {
                mark(&mut image, last_column as f64, row as f64);
            }
        }
        let mut bits = self.metadata_bits()?;
        for &column in &self.flipped_bits {
            if let Some(bit) = bits.get_mut(column) {
                *bit = !*bit;
            }
        }
        for (column, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            mark(&mut image, column as f64, last_row as f64);
        }

        // Targets.
        let border = (grid.target_border_in * self.ppi).round() as u32;
        for (contest, option, position) in self.page_targets(style)? {
            let outer = rect_at(
                self.ppi,
                grid.point_in(position.column, position.row),
                grid.target_width_in,
                grid.target_height_in,
            );
            fill_rect(&mut image, outer, INK);
            fill_rect(&mut image, outer.inset(border), PAPER);

            let fill = self
                .fills
                .iter()
                .find(|(c, o, _)| *c == contest.id && *o == option.id)
                .map(|(_, _, fill)| *fill);
            match fill {
                Some(Fill::Full) => fill_rect(&mut image, outer, INK),
                Some(Fill::Partial(fraction)) => {
                    let inner = outer.inset(border + 1);
                    let width = (inner.width as f64 * fraction).round() as u32;
                    fill_rect(&mut image, PixelRect::new(inner.x, inner.y, width, inner.height), INK);
                }
                None => {}
            }
        }
        Ok(image)
    }

    fn style(&self) -> Result<&'a BallotStyle> {
        self.layout
            .ballot_style(&self.style_id)
            .ok_or_else(|| BallotwerkError::InvalidLayout(format!("no ballot style {}", self.style_id)))
    }

    fn metadata_bits(&self) -> Result<Vec<bool>> {
        let index = |what: &str, found: Option<usize>| {
            found
                .map(|i| i as u32)
                .ok_or_else(|| BallotwerkError::InvalidLayout(format!("unknown {what}")))
        };
        let fingerprint_prefix = HmpbMetadataBits::fingerprint_prefix_of(&self.fingerprint)
            .ok_or_else(|| BallotwerkError::Encoding("fingerprint is not hex".into()))?;
        let bits = HmpbMetadataBits {
            page_number: self.page_number,
            is_test_mode: self.test_mode,
            ballot_style_index: index("ballot style", self.layout.ballot_style_index(&self.style_id))?,
            precinct_index: index("precinct", self.layout.precinct_index(&self.precinct_id))?,
            fingerprint_prefix,
        };
        bits.encode(self.layout.grid.columns as usize)
            .map_err(|err| BallotwerkError::Encoding(err.to_string()))
    }

    /// Options printed on this page with their grid positions.
    fn page_targets(
        &self,
        style: &'a BallotStyle,
    ) -> Result<Vec<(&'a Contest, &'a ContestOption, GridPosition)>> {
        let page_index = (self.page_number as usize)
            .checked_sub(1)
            .filter(|&i| i < style.pages.len())
            .ok_or_else(|| BallotwerkError::InvalidLayout(format!("no page {}", self.page_number)))?;
        let skip: usize = style.options_per_page()[..page_index].iter().sum();
        let positions = &style.pages[page_index].targets;
        Ok(self
            .layout
            .style_contests(style)?
            .into_iter()
            .flat_map(|contest| contest.options.iter().map(move |option| (contest, option)))
            .skip(skip)
            .zip(positions.iter().copied())
            .map(|((contest, option), position)| (contest, option, position))
            .collect())
    }
}

// -- Machine-printed summaries ------------------------------------------------

/// Builder for one rendered machine-printed summary page.
#[derive(Debug, Clone)]
pub struct BmdPage<'a> {
    layout: &'a ElectionLayout,
    fingerprint: String,
    style_id: String,
    precinct_id: String,
    test_mode: bool,
    ppi: f64,
    votes: VotesDict,
}

impl<'a> BmdPage<'a> {
    pub fn new(layout: &'a ElectionLayout, fingerprint: &str, style_id: &str, precinct_id: &str) -> Self {
        Self {
            layout,
            fingerprint: fingerprint.into(),
            style_id: style_id.into(),
            precinct_id: precinct_id.into(),
            test_mode: false,
            ppi: DEFAULT_PPI,
            votes: VotesDict::new(),
        }
    }

    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn vote(mut self, contest_id: &str, option_id: &str) -> Self {
        self.votes
            .entry(contest_id.into())
            .or_default()
            .push(option_id.into());
        self
    }

    /// The payload the QR code carries.
    pub fn payload(&self) -> Result<BmdPayload> {
        let unknown = |what: &str| BallotwerkError::InvalidLayout(format!("unknown {what}"));
        let style = self
            .layout
            .ballot_style(&self.style_id)
            .ok_or_else(|| unknown("ballot style"))?;
        let selections = self
            .layout
            .style_contests(style)?
            .into_iter()
            .flat_map(|contest| {
                contest.options.iter().map(move |option| {
                    self.votes
                        .get(&contest.id)
                        .is_some_and(|chosen| chosen.contains(&option.id))
                })
            })
            .collect();
        let fingerprint_prefix = self
            .fingerprint
            .get(..2 * ballotwerk_core::encoding::bmd::FINGERPRINT_BYTES)
            .ok_or_else(|| BallotwerkError::Encoding("fingerprint too short".into()))?
            .to_ascii_lowercase();
        Ok(BmdPayload {
            fingerprint_prefix,
            precinct_index: self
                .layout
                .precinct_index(&self.precinct_id)
                .ok_or_else(|| unknown("precinct"))? as u16,
            ballot_style_index: self
                .layout
                .ballot_style_index(&self.style_id)
                .ok_or_else(|| unknown("ballot style"))? as u16,
            is_test_mode: self.test_mode,
            selections,
        })
    }

    pub fn render(&self) -> Result<GrayImage> {
        let bytes = self
            .payload()?
            .encode()
            .map_err(|err| BallotwerkError::Encoding(err.to_string()))?;
        let code = QrCode::new(&bytes).map_err(|err| BallotwerkError::Encoding(err.to_string()))?;

        let mut image = blank_page(self.layout.grid.paper_size, self.ppi);
        let module = ((0.04 * self.ppi).round() as i32).max(1);
        let origin_x = (0.25 * self.ppi).round() as i32;
        let origin_y = (0.2 * self.ppi).round() as i32;
        let width = code.width();
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color == Color::Dark {
                let (col, row) = ((i % width) as i32, (i / width) as i32);
                fill_rect(
                    &mut image,
                    PixelRect::new(origin_x + col * module, origin_y + row * module, module as u32, module as u32),
                    INK,
                );
            }
        }

        // One printed line per selection, standing in for the summary text.
        let line_height = ((0.06 * self.ppi).round() as u32).max(1);
        let selected = self.votes.values().map(Vec::len).sum::<usize>();
        for line in 0..selected {
            let y = ((3.0 + 0.3 * line as f64) * self.ppi).round() as i32;
            fill_rect(
                &mut image,
                PixelRect::new(self.ppi.round() as i32, y, (4.0 * self.ppi).round() as u32, line_height),
                INK,
            );
        }
        Ok(image)
    }
}

/// Turn a page upside down, as a scanner does when a sheet is fed reversed.
pub fn upside_down(image: &GrayImage) -> GrayImage {
    image::imageops::rotate180(image)
}
