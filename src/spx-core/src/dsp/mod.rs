// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod agc;
pub mod config;
pub mod dc;
pub mod downsample;
pub mod pipeline;
pub mod window;

pub use agc::SoftAgc;
pub use config::{AveragingMode, DspConfig, DspError, Overlap, WindowKind};
pub use pipeline::{SpectrumData, SpectrumPipeline};

/// Linear power below this value is clamped before taking the log.
pub const POWER_EPSILON: f64 = 1e-20;

/// dBFS value written for bins that carry no data (unscanned panorama bins,
/// cleared peak hold). Below any realistic converter floor.
pub const SENTINEL_DBFS: f32 = -200.0;

#[must_use]
pub fn linear_to_dbfs(power: f64) -> f64 {
    10.0 * power.max(POWER_EPSILON).log10()
}

#[must_use]
pub fn dbfs_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}
