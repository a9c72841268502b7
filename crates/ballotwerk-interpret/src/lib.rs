// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ballotwerk-interpret — Turns the two scanned images of a ballot sheet into
// per-page interpretations, votes, and a castability decision.

pub mod adjudication;
pub mod castability;
pub mod grid;
pub mod mapper;
pub mod metadata;
pub mod page;
pub mod scoring;

mod interpreter;

pub use castability::determine_castability;
pub use interpreter::{Interpreter, SheetContext, SheetImages, interpret_sheet};
pub use mapper::validate_layout;
pub use page::{NormalizedPage, Orientation, RasterImage};
