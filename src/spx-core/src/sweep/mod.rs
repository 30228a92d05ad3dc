// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod plan;
pub mod stitcher;

pub use plan::{SweepMode, SweepPlan, SweepStep};
pub use stitcher::PanoramaStitcher;
