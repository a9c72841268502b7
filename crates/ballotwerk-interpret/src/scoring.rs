// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mark scoring — align each target to its printed outline, then measure how
// much of the area inside the outline is ink.

use ballotwerk_core::config::ThresholdStrategy;
use ballotwerk_core::types::{Mark, MarkStatus, MarkThresholds, PixelRect, ScoredOffset, TargetShape};
use image::GrayImage;
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::mapper::MappedTarget;
use crate::page::preprocess::{clip, count_foreground, otsu_threshold, region_histogram};

/// Extra margin around the search window included in a local threshold.
const LOCAL_THRESHOLD_MARGIN: u32 = 2;

/// Everything scoring needs besides the targets.
#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    /// Page-wide Otsu threshold; foreground is `luma <= threshold`.
    pub page_threshold: u8,
    pub strategy: ThresholdStrategy,
    /// Alignment search half-width in pixels.
    pub search_radius: i32,
    pub thresholds: MarkThresholds,
}

/// Score and classify every target. Output order matches input order.
#[instrument(skip_all, fields(targets = targets.len()))]
pub fn score_targets(image: &GrayImage, targets: &[MappedTarget<'_>], params: &ScoringParams) -> Vec<Mark> {
    let marks: Vec<Mark> = targets
        .par_iter()
        .map(|target| {
            let (score, scored_offset) = score_target(image, &target.shape, params);
            Mark {
                contest_id: target.contest.id.clone(),
                option_id: target.option.id.clone(),
                target: target.shape,
                score,
                scored_offset,
                status: params.thresholds.classify(score),
            }
        })
        .collect();
    debug!(
        marked = marks.iter().filter(|m| m.status == MarkStatus::Marked).count(),
        "Targets scored"
    );
    marks
}

/// Foreground fraction of the aligned inner bounds, and the alignment used.
pub fn score_target(image: &GrayImage, shape: &TargetShape, params: &ScoringParams) -> (f64, ScoredOffset) {
    let threshold = target_threshold(image, shape, params);
    let offset = best_offset(image, shape.outer, threshold, params.search_radius);
    let inner = shape.inner.translate(offset.x, offset.y);
    (foreground_ratio(image, inner, threshold), offset)
}

fn target_threshold(image: &GrayImage, shape: &TargetShape, params: &ScoringParams) -> u8 {
    match params.strategy {
        ThresholdStrategy::Global => params.page_threshold,
        ThresholdStrategy::LocalOtsu => {
            let margin = params.search_radius.max(0) as u32 + LOCAL_THRESHOLD_MARGIN;
            let region = shape.outer.outset(margin);
            otsu_threshold(&region_histogram(image, region)).unwrap_or(params.page_threshold)
        }
    }
}

/// The whole-pixel offset within `radius` whose one-pixel ring best covers
/// the printed outline. Ties go to the offset nearest the nominal position,
/// then to the first in row-major order.
fn best_offset(image: &GrayImage, outer: PixelRect, threshold: u8, radius: i32) -> ScoredOffset {
    let mut best = (0u64, ScoredOffset::default());
    let mut best_distance = i32::MAX;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let ink = ring_ink(image, outer.translate(dx, dy), threshold);
            let distance = dx.abs() + dy.abs();
            if ink > best.0 || (ink == best.0 && distance < best_distance) {
                best = (ink, ScoredOffset { x: dx, y: dy });
                best_distance = distance;
            }
        }
    }
    best.1
}

/// Foreground pixels on the one-pixel border of `rect`.
fn ring_ink(image: &GrayImage, rect: PixelRect, threshold: u8) -> u64 {
    let side = rect.height.saturating_sub(2);
    let edges = [
        PixelRect::new(rect.x, rect.y, rect.width, 1),
        PixelRect::new(rect.x, rect.bottom() - 1, rect.width, 1),
        PixelRect::new(rect.x, rect.y + 1, 1, side),
        PixelRect::new(rect.right() - 1, rect.y + 1, 1, side),
    ];
    edges
        .into_iter()
        .filter(|edge| edge.height > 0)
        .map(|edge| count_foreground(image, edge, threshold))
        .sum()
}

/// Fraction of the in-image part of `rect` that is foreground; 0 when the
/// rectangle lies entirely off the page.
pub fn foreground_ratio(image: &GrayImage, rect: PixelRect, threshold: u8) -> f64 {
    let Some((x0, y0, x1, y1)) = clip(image, rect) else {
        return 0.0;
    };
    let area = (x1 - x0) as f64 * (y1 - y0) as f64;
    count_foreground(image, rect, threshold) as f64 / area
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn params(strategy: ThresholdStrategy) -> ScoringParams {
        ScoringParams {
            page_threshold: 127,
            strategy,
            search_radius: 3,
            thresholds: MarkThresholds::default(),
        }
    }

    fn fill(image: &mut GrayImage, rect: PixelRect, luma: u8) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                image.put_pixel(x as u32, y as u32, Luma([luma]));
            }
        }
    }

    /// Outline of `outer`, two pixels thick.
    fn draw_target(image: &mut GrayImage, outer: PixelRect) {
        fill(image, outer, 0);
        fill(image, outer.inset(2), 255);
    }

    fn shape_at(x: i32, y: i32) -> TargetShape {
        let outer = PixelRect::new(x, y, 20, 14);
        TargetShape {
            outer,
            inner: outer.inset(3),
        }
    }

    #[test]
    fn empty_target_scores_zero() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        let shape = shape_at(40, 40);
        draw_target(&mut image, shape.outer);
        let (score, offset) = score_target(&image, &shape, &params(ThresholdStrategy::Global));
        assert_eq!(score, 0.0);
        assert_eq!(offset, ScoredOffset::default());
    }

    /// A target printed two pixels right and one down of its nominal position
    /// is found and scored in place.
    #[test]
    fn alignment_search_follows_the_outline() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        let nominal = shape_at(40, 40);
        let printed = nominal.outer.translate(2, 1);
        draw_target(&mut image, printed);
        fill(&mut image, printed.inset(3), 0);

        let (score, offset) = score_target(&image, &nominal, &params(ThresholdStrategy::Global));
        assert_eq!(offset, ScoredOffset { x: 2, y: 1 });
        assert_eq!(score, 1.0);
    }

    /// Offsets are whole pixels and never leave the search radius, even when
    /// the outline sits further away.
    #[test]
    fn alignment_search_stops_at_the_radius() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        let nominal = shape_at(40, 40);
        draw_target(&mut image, nominal.outer.translate(5, 0));

        let (_, offset) = score_target(&image, &nominal, &params(ThresholdStrategy::Global));
        assert_eq!(offset, ScoredOffset { x: 3, y: 0 });
    }

    #[test]
    fn half_filled_target_scores_half() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        let shape = shape_at(40, 40);
        draw_target(&mut image, shape.outer);
        let inner = shape.inner;
        fill(&mut image, PixelRect::new(inner.x, inner.y, inner.width / 2, inner.height), 0);
        let (score, _) = score_target(&image, &shape, &params(ThresholdStrategy::Global));
        assert!((score - 0.5).abs() < 1e-9, "{score}");
    }

    /// A faint target darker than its surroundings but lighter than the page
    /// threshold is still read with a local threshold.
    #[test]
    fn local_threshold_sees_faint_marks() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        let shape = shape_at(40, 40);
        fill(&mut image, shape.outer, 90);
        fill(&mut image, shape.outer.inset(2), 255);
        fill(&mut image, shape.inner, 90);
        let faint = ScoringParams {
            page_threshold: 30,
            ..params(ThresholdStrategy::Global)
        };
        let (global, _) = score_target(&image, &shape, &faint);
        let local = ScoringParams {
            strategy: ThresholdStrategy::LocalOtsu,
            ..faint
        };
        let (local, _) = score_target(&image, &shape, &local);
        assert_eq!(global, 0.0);
        assert_eq!(local, 1.0);
        assert_eq!(MarkThresholds::default().classify(local), MarkStatus::Marked);
    }

    #[test]
    fn off_page_targets_score_zero() {
        let image = GrayImage::from_pixel(50, 50, Luma([0]));
        assert_eq!(foreground_ratio(&image, PixelRect::new(60, 60, 10, 10), 127), 0.0);
        assert_eq!(foreground_ratio(&image, PixelRect::new(45, 45, 10, 10), 127), 1.0);
    }
}
