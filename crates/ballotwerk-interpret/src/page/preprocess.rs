// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preprocessing — paper-size matching, Otsu threshold selection, and
// 180° orientation correction. Each step takes an owned buffer and hands
// back a new one; nothing is mutated in place.

use ballotwerk_core::types::{PaperSize, PixelRect, UnreadableReason};
use image::GrayImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Width/height ratio tolerance when matching a scan to a paper size.
pub const ASPECT_TOLERANCE: f64 = 0.03;

/// Scans narrower than this cannot resolve timing marks.
pub const MIN_PAGE_WIDTH_PX: u32 = 300;

/// Height of the top and bottom strips compared for orientation.
pub const ORIENTATION_STRIP_INCHES: f64 = 0.4;

/// Threshold used when the histogram has no usable contrast.
pub const FALLBACK_THRESHOLD: u8 = 127;

/// Minimum distance between the two Otsu class means.
const MIN_OTSU_CONTRAST: f64 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Upright,
    /// The scan was upside down and has been rotated back.
    Rotated180,
}

/// A page ready for grid detection: upright, with its binarization threshold.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub image: GrayImage,
    /// Pixels at or below this luma are foreground (ink).
    pub threshold: u8,
    pub paper_size: PaperSize,
    pub orientation: Orientation,
    /// Resolution implied by the image width and the paper width.
    pub nominal_ppi: f64,
    /// Fraction of the page that is foreground.
    pub ink_ratio: f64,
}

impl NormalizedPage {
    pub fn is_foreground(&self, luma: u8) -> bool {
        luma <= self.threshold
    }

    /// The same page turned 180°. Used when the strip comparison picked the
    /// wrong edge and the grid only reads the other way up.
    pub fn rotated(&self) -> Self {
        let orientation = match self.orientation {
            Orientation::Upright => Orientation::Rotated180,
            Orientation::Rotated180 => Orientation::Upright,
        };
        Self {
            image: imageops::rotate180(&self.image),
            threshold: self.threshold,
            paper_size: self.paper_size,
            orientation,
            nominal_ppi: self.nominal_ppi,
            ink_ratio: self.ink_ratio,
        }
    }
}

// -- Pipeline -----------------------------------------------------------------

/// Match the paper, pick a threshold, and turn the page upright.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn normalize(gray: GrayImage) -> Result<NormalizedPage, UnreadableReason> {
    let (width, height) = gray.dimensions();
    let paper_size = match_paper_size(width, height).ok_or(UnreadableReason::UnsupportedDimensions {
        width,
        height,
    })?;

    let histogram = histogram(&gray);
    let threshold = otsu_threshold(&histogram).unwrap_or(FALLBACK_THRESHOLD);
    let nominal_ppi = width as f64 / paper_size.dimensions_in().0;
    let foreground: u64 = histogram[..=threshold as usize].iter().sum();
    let ink_ratio = foreground as f64 / (width as f64 * height as f64);

    let strip_px = ((ORIENTATION_STRIP_INCHES * nominal_ppi).round() as u32).clamp(1, height / 4);
    let orientation = detect_orientation(&gray, threshold, strip_px);
    let image = match orientation {
        Orientation::Upright => gray,
        Orientation::Rotated180 => imageops::rotate180(&gray),
    };

    info!(
        ?paper_size,
        threshold,
        ?orientation,
        ink_ratio,
        "Page normalized"
    );

    Ok(NormalizedPage {
        image,
        threshold,
        paper_size,
        orientation,
        nominal_ppi,
        ink_ratio,
    })
}

/// The supported paper whose aspect ratio is within tolerance of the image.
pub fn match_paper_size(width: u32, height: u32) -> Option<PaperSize> {
    if width < MIN_PAGE_WIDTH_PX || height == 0 {
        return None;
    }
    let ratio = width as f64 / height as f64;
    PaperSize::ALL
        .into_iter()
        .map(|paper| (paper, (ratio - paper.aspect_ratio()).abs() / paper.aspect_ratio()))
        .filter(|(_, error)| *error <= ASPECT_TOLERANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(paper, _)| paper)
}

/// Compare ink in the top and bottom strips. The top edge of a ballot carries
/// the complete timing-mark row (or the QR code), so a heavier bottom strip
/// means the page was fed upside down. This is only a first guess: scanner
/// shadow along an edge can outweigh the marks, and the interpreter retries
/// the other way up when the grid does not decode.
fn detect_orientation(gray: &GrayImage, threshold: u8, strip_px: u32) -> Orientation {
    let (width, height) = gray.dimensions();
    let top = count_foreground(gray, PixelRect::new(0, 0, width, strip_px), threshold);
    let bottom = count_foreground(
        gray,
        PixelRect::new(0, (height - strip_px) as i32, width, strip_px),
        threshold,
    );
    debug!(top, bottom, strip_px, "Orientation strips compared");
    if bottom > top {
        Orientation::Rotated180
    } else {
        Orientation::Upright
    }
}

// -- Pixel statistics ---------------------------------------------------------

pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

/// Histogram of the part of `rect` that lies inside the image.
pub fn region_histogram(gray: &GrayImage, rect: PixelRect) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    if let Some((x0, y0, x1, y1)) = clip(gray, rect) {
        for y in y0..y1 {
            for x in x0..x1 {
                histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
            }
        }
    }
    histogram
}

/// Foreground pixels of `rect` that lie inside the image.
pub fn count_foreground(gray: &GrayImage, rect: PixelRect, threshold: u8) -> u64 {
    let Some((x0, y0, x1, y1)) = clip(gray, rect) else {
        return 0;
    };
    let mut count = 0;
    for y in y0..y1 {
        for x in x0..x1 {
            if gray.get_pixel(x, y).0[0] <= threshold {
                count += 1;
            }
        }
    }
    count
}

/// Intersection of `rect` with the image bounds, as half-open pixel ranges.
pub fn clip(gray: &GrayImage, rect: PixelRect) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.right().min(gray.width() as i32);
    let y1 = rect.bottom().min(gray.height() as i32);
    (x0 < x1 && y0 < y1).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Otsu's threshold: maximise the between-class variance of the dark class
/// `[0..=t]` and the light class `(t..=255]`.
///
/// A run of equally good thresholds resolves to its midpoint, so a two-level
/// image splits halfway between the levels. Returns `None` when the class
/// means are too close for the split to mean anything (blank paper).
pub fn otsu_threshold(histogram: &[u64; 256]) -> Option<u8> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0u64;
    let mut best_variance = 0.0;
    let mut best_run: Option<(usize, usize)> = None;
    let mut best_contrast = 0.0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;
        let variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        match best_run {
            Some((first, last)) if variance == best_variance && last + 1 == t => {
                best_run = Some((first, t));
            }
            _ if variance > best_variance => {
                best_variance = variance;
                best_run = Some((t, t));
                best_contrast = mean_foreground - mean_background;
            }
            _ => {}
        }
    }

    let (first, last) = best_run?;
    (best_contrast >= MIN_OTSU_CONTRAST).then_some(((first + last) / 2) as u8)
}
