// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codecs for the metadata printed on hand-marked pages and carried in
// machine-printed QR codes.

pub mod bmd;
pub mod hmpb;

pub use bmd::{BmdCodecError, BmdPayload};
pub use hmpb::{HmpbCodecError, HmpbMetadataBits};
