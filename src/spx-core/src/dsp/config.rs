// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Typed DSP configuration.
//!
//! Free-form command fields are translated into these tagged unions at the
//! protocol boundary; the pipeline itself never sees untyped strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_FFT_SIZE: usize = 256;
pub const MAX_FFT_SIZE: usize = 8192;

/// FFT window function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Rectangular,
    Hanning,
    Blackman,
    BlackmanHarris,
    FlatTop,
    Kaiser6,
    Kaiser10,
    Kaiser14,
}

impl WindowKind {
    /// Stable wire name, matching the command surface.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rectangular => "rectangular",
            Self::Hanning => "hanning",
            Self::Blackman => "blackman",
            Self::BlackmanHarris => "blackman_harris",
            Self::FlatTop => "flat_top",
            Self::Kaiser6 => "kaiser_6",
            Self::Kaiser10 => "kaiser_10",
            Self::Kaiser14 => "kaiser_14",
        }
    }

    /// Parse a wire name. Accepts dash and underscore separators.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rectangular" | "none" => Some(Self::Rectangular),
            "hanning" | "hann" => Some(Self::Hanning),
            "blackman" => Some(Self::Blackman),
            "blackman_harris" | "blackmanharris" => Some(Self::BlackmanHarris),
            "flat_top" | "flattop" => Some(Self::FlatTop),
            "kaiser_6" | "kaiser6" => Some(Self::Kaiser6),
            "kaiser_10" | "kaiser10" => Some(Self::Kaiser10),
            "kaiser_14" | "kaiser14" => Some(Self::Kaiser14),
            _ => None,
        }
    }

    pub fn all() -> &'static [WindowKind] {
        &[
            Self::Rectangular,
            Self::Hanning,
            Self::Blackman,
            Self::BlackmanHarris,
            Self::FlatTop,
            Self::Kaiser6,
            Self::Kaiser10,
            Self::Kaiser14,
        ]
    }
}

/// Frame overlap between consecutive FFTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlap {
    None,
    Half,
}

impl Overlap {
    /// Hop length in samples for a given FFT size.
    #[must_use]
    pub fn hop(&self, fft_size: usize) -> usize {
        match self {
            Self::None => fft_size,
            Self::Half => fft_size / 2,
        }
    }
}

/// Spectral averaging mode. All averaging runs in linear power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AveragingMode {
    None,
    /// Block average: sum `count` frames, emit the mean, reset.
    Linear { count: usize },
    /// `p <- alpha * x + (1 - alpha) * p`, seeded with the first frame.
    Exponential { alpha: f64 },
}

/// Immutable pipeline configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DspConfig {
    pub fft_size: usize,
    pub window: WindowKind,
    pub overlap: Overlap,
    pub averaging: AveragingMode,
    pub dc_removal: bool,
    pub peak_hold: bool,
    /// Peak decay per frame in dB; 0 holds forever.
    pub peak_hold_decay_db: f64,
    /// Display bin count after peak-preserving downsampling.
    pub output_bins: usize,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            window: WindowKind::BlackmanHarris,
            overlap: Overlap::Half,
            averaging: AveragingMode::Exponential { alpha: 0.3 },
            dc_removal: true,
            peak_hold: false,
            peak_hold_decay_db: 0.0,
            output_bins: 2048,
        }
    }
}

impl DspConfig {
    pub fn validate(&self) -> Result<(), DspError> {
        if !self.fft_size.is_power_of_two()
            || self.fft_size < MIN_FFT_SIZE
            || self.fft_size > MAX_FFT_SIZE
        {
            return Err(DspError::InvalidFftSize(self.fft_size));
        }
        if self.output_bins == 0 || self.output_bins > self.fft_size {
            return Err(DspError::InvalidOutputBins {
                output_bins: self.output_bins,
                fft_size: self.fft_size,
            });
        }
        match self.averaging {
            AveragingMode::Linear { count } if count == 0 => {
                Err(DspError::InvalidAveragingCount(count))
            }
            AveragingMode::Exponential { alpha } if !(alpha > 0.0 && alpha <= 1.0) => {
                Err(DspError::InvalidAlpha(alpha))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DspError {
    #[error("fft_size {0} must be a power of two in 256..=8192")]
    InvalidFftSize(usize),
    #[error("output_bins {output_bins} must be in 1..=fft_size ({fft_size})")]
    InvalidOutputBins { output_bins: usize, fft_size: usize },
    #[error("averaging count {0} must be positive")]
    InvalidAveragingCount(usize),
    #[error("averaging alpha {0} must be in (0, 1]")]
    InvalidAlpha(f64),
    #[error("unknown window kind: {0}")]
    UnknownWindow(String),
    #[error("unknown averaging mode: {0}")]
    UnknownAveraging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_names_round_trip() {
        for &w in WindowKind::all() {
            assert_eq!(WindowKind::parse(w.name()), Some(w), "{:?}", w);
        }
    }

    #[test]
    fn window_parse_aliases() {
        assert_eq!(WindowKind::parse("HANN"), Some(WindowKind::Hanning));
        assert_eq!(
            WindowKind::parse("blackman-harris"),
            Some(WindowKind::BlackmanHarris)
        );
        assert_eq!(WindowKind::parse("flattop"), Some(WindowKind::FlatTop));
        assert_eq!(WindowKind::parse("bogus"), None);
    }

    #[test]
    fn validate_rejects_bad_sizes() {
        let mut cfg = DspConfig::default();
        cfg.fft_size = 1000;
        assert!(matches!(cfg.validate(), Err(DspError::InvalidFftSize(_))));

        let mut cfg = DspConfig::default();
        cfg.fft_size = 128; // power of two but below the floor
        assert!(cfg.validate().is_err());

        let mut cfg = DspConfig::default();
        cfg.output_bins = cfg.fft_size + 1;
        assert!(matches!(
            cfg.validate(),
            Err(DspError::InvalidOutputBins { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_alpha() {
        let mut cfg = DspConfig::default();
        cfg.averaging = AveragingMode::Exponential { alpha: 0.0 };
        assert!(matches!(cfg.validate(), Err(DspError::InvalidAlpha(_))));
        cfg.averaging = AveragingMode::Exponential { alpha: 1.0 };
        assert!(cfg.validate().is_ok());
        cfg.averaging = AveragingMode::Exponential { alpha: 1.5 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overlap_hop() {
        assert_eq!(Overlap::None.hop(2048), 2048);
        assert_eq!(Overlap::Half.hop(2048), 1024);
    }
}
