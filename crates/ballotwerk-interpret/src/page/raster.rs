// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw page images as delivered by the scanner driver.

use ballotwerk_core::error::{BallotwerkError, Result};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use tracing::{debug, instrument};

/// An owned, immutable page buffer with 1 (luma), 3 (RGB) or 4 (RGBA) channels.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl RasterImage {
    // -- Construction ---------------------------------------------------------

    /// Wrap a raw interleaved buffer. The buffer length must match the
    /// dimensions exactly.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(BallotwerkError::InvalidRaster(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(BallotwerkError::InvalidRaster(format!(
                "{width}x{height}x{channels} image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Take ownership of a decoded image, keeping luma and RGB buffers as-is.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (channels, pixels) = match image {
            DynamicImage::ImageLuma8(gray) => (1, gray.into_raw()),
            DynamicImage::ImageRgb8(rgb) => (3, rgb.into_raw()),
            other => (4, other.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageLuma8(image))
    }

    /// Decode an encoded image (PNG, JPEG, TIFF, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data).map_err(|err| {
            BallotwerkError::ImageError(format!("failed to decode page image: {err}"))
        })?;
        debug!(width = image.width(), height = image.height(), "Page image decoded");
        Ok(Self::from_dynamic(image))
    }

    /// Load a page image from disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            BallotwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self::from_dynamic(image))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    // -- Conversion -----------------------------------------------------------

    /// Consume the buffer and return its luma channel.
    pub fn into_luma(self) -> Result<GrayImage> {
        let invalid = || BallotwerkError::InvalidRaster("buffer does not match dimensions".into());
        let (w, h) = (self.width, self.height);
        match self.channels {
            1 => GrayImage::from_raw(w, h, self.pixels).ok_or_else(invalid),
            3 => RgbImage::from_raw(w, h, self.pixels)
                .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
                .ok_or_else(invalid),
            4 => RgbaImage::from_raw(w, h, self.pixels)
                .map(|rgba| DynamicImage::ImageRgba8(rgba).to_luma8())
                .ok_or_else(invalid),
            other => Err(BallotwerkError::InvalidRaster(format!(
                "unsupported channel count {other}"
            ))),
        }
    }
}
