// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Timing-mark grid — the detected border marks of a hand-marked page and the
// interpolated coordinate system derived from them.

pub mod detect;

pub use detect::{DetectedGrid, detect_grid, rect_could_be_timing_mark};

use imageproc::rect::Rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn of_rect(rect: &Rect) -> Self {
        Self::new(
            rect.left() as f64 + rect.width() as f64 / 2.0,
            rect.top() as f64 + rect.height() as f64 / 2.0,
        )
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Marks found along each border, indexed by grid position. `None` is a mark
/// that was not found (or, on the bottom row, a zero bit).
#[derive(Debug, Clone, PartialEq)]
pub struct TimingMarkGrid {
    pub top_row: Vec<Option<Rect>>,
    pub bottom_row: Vec<Option<Rect>>,
    pub left_column: Vec<Option<Rect>>,
    pub right_column: Vec<Option<Rect>>,
}

impl TimingMarkGrid {
    /// Missing marks on the borders that are always fully printed. The bottom
    /// row carries data and is not counted.
    pub fn missing_count(&self) -> usize {
        [&self.top_row, &self.left_column, &self.right_column]
            .into_iter()
            .flat_map(|line| line.iter())
            .filter(|mark| mark.is_none())
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }

    /// Presence of each bottom-row mark, left to right.
    pub fn bottom_row_bits(&self) -> Vec<bool> {
        self.bottom_row.iter().map(Option::is_some).collect()
    }
}

/// Measured scale of a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub pixels_per_inch: f64,
    pub columns: u32,
    pub rows: u32,
    pub column_spacing_px: f64,
    pub row_spacing_px: f64,
}

/// Mark centres down both side columns, with gaps filled by interpolation.
/// Every grid point is found by interpolating across its row, which absorbs
/// skew and uneven paper feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGrid {
    left: Vec<Point>,
    right: Vec<Point>,
    columns: u32,
}

impl CompletedGrid {
    /// `None` unless both ends of both side columns were found.
    pub fn from_marks(marks: &TimingMarkGrid, columns: u32) -> Option<Self> {
        Some(Self {
            left: complete_line(&marks.left_column)?,
            right: complete_line(&marks.right_column)?,
            columns,
        })
    }

    /// Pixel position of a (possibly fractional) grid coordinate.
    pub fn point(&self, column: f64, row: f64) -> Point {
        let last_row = self.left.len().saturating_sub(1);
        let row = row.clamp(0.0, last_row as f64);
        let r0 = row.floor() as usize;
        let r1 = (r0 + 1).min(last_row);
        let f = row - r0 as f64;
        let left = self.left[r0].lerp(self.left[r1], f);
        let right = self.right[r0].lerp(self.right[r1], f);
        left.lerp(right, column / (self.columns - 1) as f64)
    }
}

fn complete_line(marks: &[Option<Rect>]) -> Option<Vec<Point>> {
    let present: Vec<(usize, Point)> = marks
        .iter()
        .enumerate()
        .filter_map(|(i, mark)| mark.as_ref().map(|r| (i, Point::of_rect(r))))
        .collect();
    let (&(first, _), &(last, _)) = (present.first()?, present.last()?);
    if first != 0 || last != marks.len() - 1 {
        return None;
    }
    let mut points = Vec::with_capacity(marks.len());
    for pair in present.windows(2) {
        let ((i0, p0), (i1, p1)) = (pair[0], pair[1]);
        for i in i0..i1 {
            points.push(p0.lerp(p1, (i - i0) as f64 / (i1 - i0) as f64));
        }
    }
    points.push(present[present.len() - 1].1);
    Some(points)
}
