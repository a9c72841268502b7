// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ballotwerk — Core types, layouts, codecs and error definitions shared across
// all crates.

pub mod config;
pub mod encoding;
pub mod error;
pub mod fingerprint;
pub mod human_errors;
pub mod layout;
pub mod types;

pub use config::{InterpreterConfig, ThresholdStrategy};
pub use error::{BallotwerkError, Result};
pub use layout::{BallotStyle, Contest, ContestOption, ElectionLayout, GridGeometry, GridPosition};
pub use types::*;
