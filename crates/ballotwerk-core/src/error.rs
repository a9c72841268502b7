// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified fatal error type for Ballotwerk.
//
// Only configuration and programmer errors live here. Anything that can go
// wrong with a particular scan is reported as an `UnreadableReason` inside the
// page interpretation instead.

use thiserror::Error;

/// Top-level error type for all Ballotwerk operations.
#[derive(Debug, Error)]
pub enum BallotwerkError {
    // -- Configuration --
    #[error("invalid election layout: {0}")]
    InvalidLayout(String),

    #[error("invalid mark thresholds: marginal {marginal} must not exceed definite {definite}")]
    InvalidThresholds { marginal: f64, definite: f64 },

    #[error("invalid interpreter configuration: {0}")]
    InvalidConfig(String),

    // -- Image input --
    #[error("page channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: u8, actual: u8 },

    #[error("invalid raster image: {0}")]
    InvalidRaster(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Codecs --
    #[error("metadata encoding failed: {0}")]
    Encoding(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BallotwerkError>;
