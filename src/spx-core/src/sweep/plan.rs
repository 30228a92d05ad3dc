// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sweep step planning.
//!
//! Steps tile `[freq_start, freq_end]` with their usable bandwidth: the first
//! center sits at `freq_start + usable_bw/2` and each step advances by
//! `usable_bw`, so the usable portions abut without gaps. `usable_fraction`
//! excludes the anti-alias filter roll-off at the capture edges.

use serde::{Deserialize, Serialize};

use crate::session::response::SessionError;

/// Survey runs one pass and stops; band-monitor repeats until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    Survey,
    BandMonitor,
}

impl SweepMode {
    #[must_use]
    pub fn wire_id(&self) -> u8 {
        match self {
            Self::Survey => 0,
            Self::BandMonitor => 1,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "survey" => Some(Self::Survey),
            "band_monitor" | "band-monitor" | "monitor" => Some(Self::BandMonitor),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::BandMonitor)
    }
}

/// One retune step of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    pub index: usize,
    pub center_freq: f64,
    /// Low edge of the usable span.
    pub freq_lo: f64,
    /// High edge of the usable span.
    pub freq_hi: f64,
}

/// Complete plan for one sweep pass.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub freq_start: f64,
    pub freq_end: f64,
    pub sample_rate: f64,
    pub fft_size: usize,
    pub usable_fraction: f64,
    pub usable_bw: f64,
    /// Bins trimmed from each capture edge (filter roll-off).
    pub trim_bins: usize,
    /// Bins retained per step after trimming.
    pub usable_bins: usize,
    pub steps: Vec<SweepStep>,
}

impl SweepPlan {
    pub fn new(
        freq_start: f64,
        freq_end: f64,
        sample_rate: f64,
        usable_fraction: f64,
        fft_size: usize,
    ) -> Result<Self, SessionError> {
        if !(freq_start.is_finite() && freq_end.is_finite()) || freq_start >= freq_end {
            return Err(SessionError::invalid_config(format!(
                "sweep range invalid: start {} must be below end {}",
                freq_start, freq_end
            )));
        }
        if sample_rate <= 0.0 {
            return Err(SessionError::invalid_config(format!(
                "sweep sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if !(usable_fraction > 0.0 && usable_fraction <= 1.0) {
            return Err(SessionError::invalid_config(format!(
                "usable_fraction {} must be in (0, 1]",
                usable_fraction
            )));
        }
        if fft_size == 0 {
            return Err(SessionError::invalid_config("fft_size must be positive"));
        }

        let usable_bw = sample_rate * usable_fraction;
        let trim_bins = (fft_size as f64 * (1.0 - usable_fraction) / 2.0).floor() as usize;
        let usable_bins = fft_size - 2 * trim_bins;

        let mut steps = Vec::new();
        let mut center = freq_start + usable_bw / 2.0;
        while center - usable_bw / 2.0 < freq_end {
            let index = steps.len();
            steps.push(SweepStep {
                index,
                center_freq: center,
                freq_lo: center - usable_bw / 2.0,
                freq_hi: center + usable_bw / 2.0,
            });
            center += usable_bw;
        }
        if steps.is_empty() {
            steps.push(SweepStep {
                index: 0,
                center_freq: (freq_start + freq_end) / 2.0,
                freq_lo: freq_start,
                freq_hi: freq_end,
            });
        }

        Ok(Self {
            freq_start,
            freq_end,
            sample_rate,
            fft_size,
            usable_fraction,
            usable_bw,
            trim_bins,
            usable_bins,
            steps,
        })
    }

    #[must_use]
    pub fn total_segments(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn bin_width(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }

    /// Crossfade margin in bins at each interior segment edge. Never exceeds
    /// the trimmed guard region, which is where the margin samples come from.
    #[must_use]
    pub fn overlap_margin(&self) -> usize {
        (self.usable_bins / 8).min(32).min(self.trim_bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_determinism_100_to_130_mhz() {
        // 10 MS/s at usable_fraction 0.8 -> 8 MHz usable steps.
        let plan = SweepPlan::new(100e6, 130e6, 10e6, 0.8, 2048).unwrap();
        assert!((plan.usable_bw - 8e6).abs() < 1e-3);
        let centers: Vec<f64> = plan.steps.iter().map(|s| s.center_freq).collect();
        assert_eq!(centers, vec![104e6, 112e6, 120e6, 128e6]);
        assert_eq!(plan.total_segments(), 4);
        // Last segment covers up to 132 MHz.
        assert!((plan.steps[3].freq_hi - 132e6).abs() < 1e-3);
        // Step indices are exactly 0..total.
        for (i, s) in plan.steps.iter().enumerate() {
            assert_eq!(s.index, i);
            assert!(s.freq_lo < s.freq_hi);
        }
    }

    #[test]
    fn steps_tile_without_gaps() {
        let plan = SweepPlan::new(400e6, 470e6, 20e6, 0.75, 4096).unwrap();
        assert!((plan.steps[0].freq_lo - 400e6).abs() < 1e-3);
        for pair in plan.steps.windows(2) {
            assert!((pair[0].freq_hi - pair[1].freq_lo).abs() < 1e-3);
        }
        // The union reaches at least freq_end.
        assert!(plan.steps.last().unwrap().freq_hi >= 470e6);
    }

    #[test]
    fn usable_bins_symmetric_and_sufficient() {
        let plan = SweepPlan::new(100e6, 110e6, 10e6, 0.8, 2048).unwrap();
        // trim = floor(2048 * 0.1) = 204, usable = 2048 - 408 = 1640.
        assert_eq!(plan.trim_bins, 204);
        assert_eq!(plan.usable_bins, 1640);
        assert!(plan.usable_bins >= (2048.0f64 * 0.8).ceil() as usize);
        assert_eq!(plan.trim_bins * 2 + plan.usable_bins, 2048);
    }

    #[test]
    fn narrow_range_yields_single_step() {
        let plan = SweepPlan::new(100e6, 100.5e6, 10e6, 0.8, 1024).unwrap();
        assert_eq!(plan.total_segments(), 1);
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(SweepPlan::new(130e6, 100e6, 10e6, 0.8, 2048).is_err());
        assert!(SweepPlan::new(100e6, 100e6, 10e6, 0.8, 2048).is_err());
    }

    #[test]
    fn rejects_bad_fraction_and_rate() {
        assert!(SweepPlan::new(100e6, 130e6, 0.0, 0.8, 2048).is_err());
        assert!(SweepPlan::new(100e6, 130e6, 10e6, 0.0, 2048).is_err());
        assert!(SweepPlan::new(100e6, 130e6, 10e6, 1.5, 2048).is_err());
    }

    #[test]
    fn margin_fits_inside_guard_band() {
        let plan = SweepPlan::new(100e6, 130e6, 10e6, 0.8, 2048).unwrap();
        assert!(plan.overlap_margin() <= plan.trim_bins);
        assert!(plan.overlap_margin() > 0);
        // Fraction 1.0 leaves no guard band, so no margin either.
        let tight = SweepPlan::new(100e6, 130e6, 10e6, 1.0, 2048).unwrap();
        assert_eq!(tight.overlap_margin(), 0);
    }
}
