// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Timing-mark detection — connected components of the binarized page,
// filtered to mark-shaped shapes and assigned to border positions.

use ballotwerk_core::layout::GridGeometry;
use ballotwerk_core::types::UnreadableReason;
use image::{GrayImage, Luma};
use imageproc::rect::Rect;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, info, instrument};

use super::{CompletedGrid, Geometry, Point, TimingMarkGrid};
use crate::page::NormalizedPage;

/// Fraction of a candidate's bounding box that must be ink.
const MIN_SOLIDITY: f64 = 0.7;

/// Border zones reach this many grid spacings past the corner-mark centres.
const ZONE_SPACING_FRACTION: f64 = 0.6;

/// Allowed relative error between measured and nominal mark spacing.
const MAX_SPACING_ERROR: f64 = 0.15;

/// A mark further than this (in grid steps) from an integer position is noise.
const MAX_INDEX_ERROR: f64 = 0.3;

/// A located grid: the marks, the completed coordinate system, and scale.
#[derive(Debug, Clone)]
pub struct DetectedGrid {
    pub marks: TimingMarkGrid,
    pub completed: CompletedGrid,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    rect: Rect,
    center: Point,
}

/// Whether a component's bounding box is roughly timing-mark sized: a quarter
/// to one and a half mark widths wide, two thirds to one and a half mark
/// heights tall. Narrow marks are allowed because printers bleed and scanners
/// crop unevenly.
pub fn rect_could_be_timing_mark(grid: &GridGeometry, ppi: f64, rect: &Rect) -> bool {
    let width = grid.timing_mark_width_in * ppi;
    let height = grid.timing_mark_height_in * ppi;
    let min_width = (width / 4.0).floor() as u32;
    let max_width = (width * 3.0 / 2.0).ceil() as u32;
    let min_height = (height * 2.0 / 3.0).floor() as u32;
    let max_height = (height * 3.0 / 2.0).ceil() as u32;
    (min_width..=max_width).contains(&rect.width())
        && (min_height..=max_height).contains(&rect.height())
}

/// Find the timing-mark grid of a hand-marked page.
#[instrument(skip_all, fields(columns = grid.columns, rows = grid.rows))]
pub fn detect_grid(
    page: &NormalizedPage,
    grid: &GridGeometry,
    max_missing: usize,
) -> Result<DetectedGrid, UnreadableReason> {
    let candidates = find_candidates(page, grid);
    debug!(candidates = candidates.len(), "Timing mark candidates found");

    let ppi = page.nominal_ppi;
    let (width, height) = page.image.dimensions();
    let column_spacing = grid.column_spacing_in() * ppi;
    let row_spacing = grid.row_spacing_in() * ppi;
    let inset = grid.mark_inset_in * ppi;
    let zone_x = inset + ZONE_SPACING_FRACTION * column_spacing;
    let zone_y = inset + ZONE_SPACING_FRACTION * row_spacing;

    let in_top = |c: &Candidate| c.center.y < zone_y;
    let in_bottom = |c: &Candidate| c.center.y > height as f64 - zone_y;
    let in_left = |c: &Candidate| c.center.x < zone_x;
    let in_right = |c: &Candidate| c.center.x > width as f64 - zone_x;

    let top: Vec<Candidate> = candidates.iter().copied().filter(in_top).collect();
    let bottom: Vec<Candidate> = candidates.iter().copied().filter(in_bottom).collect();
    let left: Vec<Candidate> = candidates.iter().copied().filter(in_left).collect();
    let right: Vec<Candidate> = candidates.iter().copied().filter(in_right).collect();

    let (w, h) = (width as f64, height as f64);
    let top_left = find_corner(&top, in_left, Point::new(0.0, 0.0), "top-left")?;
    let top_right = find_corner(&top, in_right, Point::new(w, 0.0), "top-right")?;
    let bottom_left = find_corner(&bottom, in_left, Point::new(0.0, h), "bottom-left")?;
    let bottom_right = find_corner(&bottom, in_right, Point::new(w, h), "bottom-right")?;

    let columns = grid.columns as usize;
    let rows = grid.rows as usize;
    let lines = [
        ("top row", top_left, top_right, columns, column_spacing),
        ("bottom row", bottom_left, bottom_right, columns, column_spacing),
        ("left column", top_left, bottom_left, rows, row_spacing),
        ("right column", top_right, bottom_right, rows, row_spacing),
    ];
    for (name, start, end, count, nominal) in lines {
        let measured = start.center.distance(end.center) / (count - 1) as f64;
        if ((measured - nominal) / nominal).abs() > MAX_SPACING_ERROR {
            return Err(UnreadableReason::GridNotFound {
                detail: format!(
                    "{name} spacing {measured:.1}px differs from expected {nominal:.1}px"
                ),
            });
        }
    }

    let marks = TimingMarkGrid {
        top_row: assign_line(&top, top_left, top_right, columns, row_spacing),
        bottom_row: assign_line(&bottom, bottom_left, bottom_right, columns, row_spacing),
        left_column: assign_line(&left, top_left, bottom_left, rows, column_spacing),
        right_column: assign_line(&right, top_right, bottom_right, rows, column_spacing),
    };

    let missing = marks.missing_count();
    if missing > max_missing {
        return Err(UnreadableReason::GridIncomplete {
            missing,
            tolerated: max_missing,
        });
    }

    let completed = CompletedGrid::from_marks(&marks, grid.columns).ok_or_else(|| {
        UnreadableReason::GridNotFound {
            detail: "side columns lack corner marks".into(),
        }
    })?;

    let measured_column_spacing = top_left.center.distance(top_right.center) / (columns - 1) as f64;
    let measured_row_spacing = top_left.center.distance(bottom_left.center) / (rows - 1) as f64;
    let pixels_per_inch = (measured_column_spacing / grid.column_spacing_in()
        + measured_row_spacing / grid.row_spacing_in())
        / 2.0;
    let geometry = Geometry {
        pixels_per_inch,
        columns: grid.columns,
        rows: grid.rows,
        column_spacing_px: measured_column_spacing,
        row_spacing_px: measured_row_spacing,
    };

    info!(pixels_per_inch, missing, "Timing mark grid found");
    Ok(DetectedGrid {
        marks,
        completed,
        geometry,
    })
}

// -- Candidates ---------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ComponentStats {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: u64,
}

fn find_candidates(page: &NormalizedPage, grid: &GridGeometry) -> Vec<Candidate> {
    let binary = GrayImage::from_fn(page.image.width(), page.image.height(), |x, y| {
        if page.is_foreground(page.image.get_pixel(x, y).0[0]) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut stats: Vec<Option<ComponentStats>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if label >= stats.len() {
            stats.resize(label + 1, None);
        }
        let entry = stats[label].get_or_insert(ComponentStats {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixels: 0,
        });
        entry.min_x = entry.min_x.min(x);
        entry.min_y = entry.min_y.min(y);
        entry.max_x = entry.max_x.max(x);
        entry.max_y = entry.max_y.max(y);
        entry.pixels += 1;
    }

    stats
        .into_iter()
        .flatten()
        .filter_map(|s| {
            let rect = Rect::at(s.min_x as i32, s.min_y as i32)
                .of_size(s.max_x - s.min_x + 1, s.max_y - s.min_y + 1);
            let solidity = s.pixels as f64 / (rect.width() as f64 * rect.height() as f64);
            (solidity >= MIN_SOLIDITY && rect_could_be_timing_mark(grid, page.nominal_ppi, &rect))
                .then(|| Candidate {
                    rect,
                    center: Point::of_rect(&rect),
                })
        })
        .collect()
}

/// The candidate in both border zones nearest the page corner.
fn find_corner(
    zone: &[Candidate],
    also_in: impl Fn(&Candidate) -> bool,
    page_corner: Point,
    name: &str,
) -> Result<Candidate, UnreadableReason> {
    zone.iter()
        .filter(|c| also_in(*c))
        .min_by(|a, b| {
            a.center
                .distance(page_corner)
                .total_cmp(&b.center.distance(page_corner))
        })
        .copied()
        .ok_or_else(|| UnreadableReason::GridNotFound {
            detail: format!("no {name} corner timing mark"),
        })
}

/// Place candidates at integer positions along the line from `start` to `end`.
/// Where two candidates claim a position the one nearer the exact spot wins.
fn assign_line(
    candidates: &[Candidate],
    start: Candidate,
    end: Candidate,
    count: usize,
    perpendicular_spacing: f64,
) -> Vec<Option<Rect>> {
    let dx = end.center.x - start.center.x;
    let dy = end.center.y - start.center.y;
    let length = dx.hypot(dy);
    let mut slots: Vec<Option<(Rect, f64)>> = vec![None; count];
    if length == 0.0 {
        return vec![None; count];
    }

    for candidate in candidates {
        let rx = candidate.center.x - start.center.x;
        let ry = candidate.center.y - start.center.y;
        let along = (rx * dx + ry * dy) / (length * length) * (count - 1) as f64;
        let across = (rx * dy - ry * dx).abs() / length;
        if across > perpendicular_spacing / 2.0 {
            continue;
        }
        let index = along.round();
        let error = (along - index).abs();
        if index < 0.0 || index > (count - 1) as f64 || error > MAX_INDEX_ERROR {
            continue;
        }
        let slot = &mut slots[index as usize];
        if slot.is_none_or(|(_, best)| error < best) {
            *slot = Some((candidate.rect, error));
        }
    }

    slots.into_iter().map(|slot| slot.map(|(rect, _)| rect)).collect()
}
