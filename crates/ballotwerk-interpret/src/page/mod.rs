// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw page buffers and page preprocessing.

pub mod preprocess;
pub mod raster;

pub use preprocess::{NormalizedPage, Orientation};
pub use raster::RasterImage;
