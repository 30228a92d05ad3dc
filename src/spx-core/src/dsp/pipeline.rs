// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectrum pipeline: IQ samples in, display-ready dBFS frames out.
//!
//! Stage order per frame:
//! 1. DC removal (IIR high-pass, I and Q independently)
//! 2. Frame extraction (hop = fft_size, or fft_size/2 at 50% overlap)
//! 3. Windowing
//! 4. Forward FFT, shifted so the lowest frequency lands at index 0
//! 5. Magnitude squared (linear power)
//! 6. Averaging in linear power (none / linear block / exponential)
//! 7. Peak-preserving downsample to output_bins (linear power)
//! 8. dBFS conversion: 10*log10(p) - 10*log10(N^2 * window_power_gain)
//! 9. Peak hold (element-wise max over dBFS output bins)
//! 10. Stats: noise floor (25th percentile), peak bin

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::config::{AveragingMode, DspConfig, DspError};
use super::dc::DcBlocker;
use super::downsample::peak_downsample;
use super::window::Window;
use super::{linear_to_dbfs, SENTINEL_DBFS};

/// One finalized output frame.
#[derive(Debug, Clone)]
pub struct SpectrumData {
    /// dBFS per output bin, lowest frequency first.
    pub bins: Vec<f32>,
    /// Peak-hold companion trace, present when peak hold is enabled.
    pub peak_hold: Option<Vec<f32>>,
    /// Value at the 25th-percentile index of the sorted bin vector.
    pub noise_floor: f32,
    pub peak_power: f32,
    pub peak_bin: usize,
    /// Peak position normalized to [-0.5, 0.5) of the displayed span.
    pub peak_freq_offset: f32,
}

pub struct SpectrumPipeline {
    cfg: DspConfig,
    window: Window,
    fft: Arc<dyn Fft<f32>>,
    fft_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Samples awaiting frame extraction.
    acc: Vec<Complex<f32>>,
    dc: Option<DcBlocker>,
    /// 10*log10(N^2 * window_power_gain), subtracted once per output frame.
    dbfs_offset: f64,
    // Averaging state (linear power, f64 for accumulation accuracy).
    avg_sum: Vec<f64>,
    avg_frames: usize,
    ema: Option<Vec<f64>>,
    // Peak hold over dBFS output bins.
    peak_hold: Option<Vec<f32>>,
}

impl SpectrumPipeline {
    pub fn new(cfg: DspConfig) -> Result<Self, DspError> {
        cfg.validate()?;
        let window = Window::new(cfg.window, cfg.fft_size);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(cfg.fft_size);
        let scratch_len = fft.get_inplace_scratch_len();
        let dbfs_offset =
            10.0 * ((cfg.fft_size as f64) * (cfg.fft_size as f64) * window.power_gain()).log10();
        let dc = cfg.dc_removal.then(DcBlocker::default);
        Ok(Self {
            fft_buf: vec![Complex::new(0.0, 0.0); cfg.fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            acc: Vec::with_capacity(cfg.fft_size * 2),
            dc,
            dbfs_offset,
            avg_sum: Vec::new(),
            avg_frames: 0,
            ema: None,
            peak_hold: None,
            cfg,
            window,
            fft,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DspConfig {
        &self.cfg
    }

    /// Feed a block of IQ samples; returns every output frame it completes.
    ///
    /// A block may complete zero frames (accumulating, or mid linear-average)
    /// or several (block larger than the hop).
    pub fn process_block(&mut self, samples: &[Complex<f32>]) -> Vec<SpectrumData> {
        let mut filtered;
        let input: &[Complex<f32>] = if let Some(dc) = self.dc.as_mut() {
            filtered = samples.to_vec();
            dc.process(&mut filtered);
            &filtered
        } else {
            samples
        };
        self.acc.extend_from_slice(input);

        let fft_size = self.cfg.fft_size;
        let hop = self.cfg.overlap.hop(fft_size);
        let mut out = Vec::new();
        while self.acc.len() >= fft_size {
            self.fft_buf.copy_from_slice(&self.acc[..fft_size]);
            self.acc.drain(..hop);
            if let Some(frame) = self.process_frame() {
                out.push(frame);
            }
        }
        out
    }

    /// Window + FFT + shift + magnitude-squared on `fft_buf`, then hand the
    /// linear power vector to the averaging/finalize path.
    fn process_frame(&mut self) -> Option<SpectrumData> {
        let n = self.cfg.fft_size;
        for (s, &w) in self.fft_buf.iter_mut().zip(self.window.coeffs()) {
            s.re *= w;
            s.im *= w;
        }
        self.fft.process_with_scratch(&mut self.fft_buf, &mut self.scratch);

        // FFT shift: negative frequencies first, so index 0 is the low edge.
        let half = n / 2;
        let mut power = vec![0.0f64; n];
        for (i, p) in power.iter_mut().enumerate() {
            let src = (i + half) % n;
            let c = self.fft_buf[src];
            *p = (c.re as f64) * (c.re as f64) + (c.im as f64) * (c.im as f64);
        }
        self.finish_power(power)
    }

    /// Averaging, downsampling, dBFS conversion, peak hold, and stats.
    ///
    /// Split out from the FFT so spectral post-processing is testable against
    /// synthetic power vectors.
    pub fn finish_power(&mut self, power: Vec<f64>) -> Option<SpectrumData> {
        let averaged: Vec<f64> = match self.cfg.averaging {
            AveragingMode::None => power,
            AveragingMode::Linear { count } => {
                if self.avg_sum.len() != power.len() {
                    self.avg_sum = vec![0.0; power.len()];
                    self.avg_frames = 0;
                }
                for (acc, p) in self.avg_sum.iter_mut().zip(&power) {
                    *acc += p;
                }
                self.avg_frames += 1;
                if self.avg_frames < count {
                    return None;
                }
                let inv = 1.0 / count as f64;
                let mean = self.avg_sum.iter().map(|&s| s * inv).collect();
                self.avg_sum.iter_mut().for_each(|s| *s = 0.0);
                self.avg_frames = 0;
                mean
            }
            AveragingMode::Exponential { alpha } => match self.ema.as_mut() {
                None => {
                    self.ema = Some(power.clone());
                    power
                }
                Some(state) => {
                    if state.len() != power.len() {
                        *state = power.clone();
                    } else {
                        for (s, &x) in state.iter_mut().zip(&power) {
                            *s = alpha * x + (1.0 - alpha) * *s;
                        }
                    }
                    state.clone()
                }
            },
        };

        let displayed = peak_downsample(&averaged, self.cfg.output_bins);
        let bins: Vec<f32> = displayed
            .iter()
            .map(|&p| (linear_to_dbfs(p) - self.dbfs_offset) as f32)
            .collect();

        let peak_hold = if self.cfg.peak_hold {
            let decay = self.cfg.peak_hold_decay_db as f32;
            let state = self.peak_hold.get_or_insert_with(|| bins.clone());
            if state.len() != bins.len() {
                *state = bins.clone();
            } else {
                for (held, &cur) in state.iter_mut().zip(&bins) {
                    if decay > 0.0 {
                        *held -= decay;
                    }
                    if cur > *held {
                        *held = cur;
                    }
                }
            }
            Some(state.clone())
        } else {
            None
        };

        let (peak_bin, peak_power) = bins
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            });
        let num_bins = bins.len();
        let peak_freq_offset = if num_bins > 0 {
            (peak_bin as f32 - num_bins as f32 / 2.0) / num_bins as f32
        } else {
            0.0
        };

        let noise_floor = percentile_25(&bins);

        Some(SpectrumData {
            bins,
            peak_hold,
            noise_floor,
            peak_power,
            peak_bin,
            peak_freq_offset,
        })
    }

    /// Discard all accumulated state: sample backlog, averaging, peak hold,
    /// DC filter memory. Used on reconfiguration and mode changes.
    pub fn reset(&mut self) {
        self.acc.clear();
        self.avg_sum.clear();
        self.avg_frames = 0;
        self.ema = None;
        self.peak_hold = None;
        if let Some(dc) = self.dc.as_mut() {
            dc.reset();
        }
    }

    pub fn reset_peak_hold(&mut self) {
        self.peak_hold = None;
    }

    /// Current peak-hold trace, sentinel-filled when empty.
    #[must_use]
    pub fn peak_hold_or_sentinel(&self) -> Vec<f32> {
        self.peak_hold
            .clone()
            .unwrap_or_else(|| vec![SENTINEL_DBFS; self.cfg.output_bins])
    }

    /// Change the window without touching size-dependent state.
    pub fn set_window(&mut self, kind: super::config::WindowKind) {
        if kind == self.cfg.window {
            return;
        }
        self.cfg.window = kind;
        self.window = Window::new(kind, self.cfg.fft_size);
        self.dbfs_offset = 10.0
            * ((self.cfg.fft_size as f64) * (self.cfg.fft_size as f64) * self.window.power_gain())
                .log10();
    }

    /// Change averaging; accumulated averaging state is discarded.
    pub fn set_averaging(&mut self, mode: AveragingMode) -> Result<(), DspError> {
        let mut cfg = self.cfg.clone();
        cfg.averaging = mode;
        cfg.validate()?;
        self.cfg.averaging = mode;
        self.avg_sum.clear();
        self.avg_frames = 0;
        self.ema = None;
        Ok(())
    }

    pub fn set_dc_removal(&mut self, enabled: bool) {
        self.cfg.dc_removal = enabled;
        self.dc = enabled.then(DcBlocker::default);
    }

    pub fn set_peak_hold(&mut self, enabled: bool) {
        self.cfg.peak_hold = enabled;
        if !enabled {
            self.peak_hold = None;
        }
    }

    pub fn set_peak_hold_decay(&mut self, decay_db: f64) {
        self.cfg.peak_hold_decay_db = decay_db.max(0.0);
    }

    pub fn set_output_bins(&mut self, output_bins: usize) -> Result<(), DspError> {
        let mut cfg = self.cfg.clone();
        cfg.output_bins = output_bins;
        cfg.validate()?;
        self.cfg.output_bins = output_bins;
        self.peak_hold = None;
        Ok(())
    }
}

/// Value at the 25th-percentile index of the sorted bin vector.
#[must_use]
pub fn percentile_25(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return SENTINEL_DBFS;
    }
    let mut sorted = bins.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 4]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::config::{Overlap, WindowKind};
    use crate::dsp::dbfs_to_linear;

    fn cfg(fft: usize) -> DspConfig {
        DspConfig {
            fft_size: fft,
            window: WindowKind::Rectangular,
            overlap: Overlap::None,
            averaging: AveragingMode::None,
            dc_removal: false,
            peak_hold: false,
            peak_hold_decay_db: 0.0,
            output_bins: fft,
        }
    }

    #[test]
    fn full_scale_dc_reads_zero_dbfs() {
        let mut p = SpectrumPipeline::new(cfg(256)).unwrap();
        let block = vec![Complex::new(1.0f32, 0.0); 256];
        let frames = p.process_block(&block);
        assert_eq!(frames.len(), 1);
        let f = &frames[0];
        // DC lands at the shifted center bin.
        assert_eq!(f.peak_bin, 128);
        assert!(f.peak_power.abs() < 1e-3, "peak = {} dBFS", f.peak_power);
    }

    #[test]
    fn full_scale_tone_reads_zero_dbfs_with_hann() {
        let n = 512;
        let mut c = cfg(n);
        c.window = WindowKind::Hanning;
        let mut p = SpectrumPipeline::new(c).unwrap();
        // Complex exponential at +8 bins: e^{j 2π 8 i / N}.
        let block: Vec<Complex<f32>> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * 8.0 * i as f64 / n as f64;
                Complex::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();
        let frames = p.process_block(&block);
        let f = &frames[0];
        assert_eq!(f.peak_bin, n / 2 + 8);
        // Coherent gain correction keeps the tone near 0 dBFS for any window.
        assert!(f.peak_power.abs() < 0.1, "peak = {} dBFS", f.peak_power);
    }

    #[test]
    fn overlap_half_doubles_frame_rate() {
        let mut c = cfg(256);
        c.overlap = Overlap::Half;
        let mut p = SpectrumPipeline::new(c).unwrap();
        let block = vec![Complex::new(0.5f32, 0.0); 1024];
        let frames = p.process_block(&block);
        // 1024 samples, hop 128: frames at offsets 0,128,...,768.
        assert_eq!(frames.len(), 7);
    }

    #[test]
    fn sawtooth_power_scenario() {
        // Inject per-bin linear powers 1..=n directly into the post-FFT path.
        let n = 64;
        let mut p = SpectrumPipeline::new(cfg(n)).unwrap();
        let power: Vec<f64> = (1..=n).map(|k| k as f64).collect();
        let f = p.finish_power(power).unwrap();
        let correction = p.dbfs_offset;
        for (k, &db) in f.bins.iter().enumerate() {
            let expect = 10.0 * ((k + 1) as f64).log10() - correction;
            assert!(
                (db as f64 - expect).abs() < 1e-5,
                "bin {}: {} vs {}",
                k,
                db,
                expect
            );
        }
        assert_eq!(f.peak_bin, n - 1);
        assert!((f.noise_floor - f.bins[n / 4]).abs() < 1e-9);
    }

    #[test]
    fn linear_averaging_matches_analytic_mean() {
        let n = 32;
        let mut c = cfg(n);
        c.averaging = AveragingMode::Linear { count: 4 };
        let mut p = SpectrumPipeline::new(c).unwrap();
        // Four frames of constant power 1,2,3,4 -> mean 2.5.
        for frame in 1..=4u32 {
            let power = vec![frame as f64; n];
            let out = p.finish_power(power);
            if frame < 4 {
                assert!(out.is_none(), "premature emit at frame {}", frame);
            } else {
                let f = out.unwrap();
                let expect = 10.0 * 2.5f64.log10() - p.dbfs_offset;
                for &db in &f.bins {
                    assert!((db as f64 - expect).abs() < 1e-6);
                }
            }
        }
        // The accumulator reset: the next cycle starts fresh.
        assert!(p.finish_power(vec![1.0; n]).is_none());
    }

    #[test]
    fn exponential_averaging_seeds_and_converges() {
        let n = 16;
        let mut c = cfg(n);
        c.averaging = AveragingMode::Exponential { alpha: 0.5 };
        let mut p = SpectrumPipeline::new(c).unwrap();

        let first = p.finish_power(vec![4.0; n]).unwrap();
        let seed_db = 10.0 * 4.0f64.log10() - p.dbfs_offset;
        assert!((first.bins[0] as f64 - seed_db).abs() < 1e-6);

        // p = 0.5*1 + 0.5*4 = 2.5 after one update toward 1.0.
        let second = p.finish_power(vec![1.0; n]).unwrap();
        let expect = 10.0 * 2.5f64.log10() - p.dbfs_offset;
        assert!((second.bins[0] as f64 - expect).abs() < 1e-6);
    }

    #[test]
    fn averaging_is_linear_not_db() {
        // Mean of 1 and 100 in linear power is 50.5 (~17 dB), while a dB-domain
        // mean would land at 10 dB. Guard the linear-domain invariant.
        let n = 8;
        let mut c = cfg(n);
        c.averaging = AveragingMode::Linear { count: 2 };
        let mut p = SpectrumPipeline::new(c).unwrap();
        assert!(p.finish_power(vec![1.0; n]).is_none());
        let f = p.finish_power(vec![100.0; n]).unwrap();
        let expect = 10.0 * 50.5f64.log10() - p.dbfs_offset;
        assert!((f.bins[0] as f64 - expect).abs() < 1e-6);
    }

    #[test]
    fn peak_hold_is_idempotent_and_resettable() {
        let n = 16;
        let mut c = cfg(n);
        c.peak_hold = true;
        let mut p = SpectrumPipeline::new(c).unwrap();

        let mut power = vec![1.0f64; n];
        power[3] = 1000.0;
        let first = p.finish_power(power.clone()).unwrap();
        let held_once = first.peak_hold.clone().unwrap();

        // Same frame again: the trace must not change.
        let second = p.finish_power(power).unwrap();
        assert_eq!(second.peak_hold.as_ref().unwrap(), &held_once);

        // A quieter frame leaves held peaks in place.
        let third = p.finish_power(vec![0.5; n]).unwrap();
        assert_eq!(third.peak_hold.as_ref().unwrap(), &held_once);

        p.reset_peak_hold();
        assert!(p
            .peak_hold_or_sentinel()
            .iter()
            .all(|&v| v == SENTINEL_DBFS));
    }

    #[test]
    fn downsample_keeps_narrowband_peak() {
        let n = 1024;
        let mut c = cfg(n);
        c.output_bins = 256;
        let mut p = SpectrumPipeline::new(c).unwrap();
        let mut power = vec![dbfs_to_linear(-90.0); n];
        power[700] = dbfs_to_linear(-10.0);
        let f = p.finish_power(power).unwrap();
        assert_eq!(f.bins.len(), 256);
        let corr = p.dbfs_offset;
        assert!((f.peak_power as f64 - (-10.0 - corr)).abs() < 1e-3);
    }

    #[test]
    fn bins_are_finite() {
        let n = 64;
        let mut p = SpectrumPipeline::new(cfg(n)).unwrap();
        let f = p.finish_power(vec![0.0; n]).unwrap();
        assert!(f.bins.iter().all(|b| b.is_finite()));
    }

    #[test]
    fn reset_discards_averaging_state() {
        let n = 8;
        let mut c = cfg(n);
        c.averaging = AveragingMode::Linear { count: 3 };
        let mut p = SpectrumPipeline::new(c).unwrap();
        assert!(p.finish_power(vec![1.0; n]).is_none());
        assert!(p.finish_power(vec![1.0; n]).is_none());
        p.reset();
        // Counter restarted: two more frames are not enough to emit.
        assert!(p.finish_power(vec![1.0; n]).is_none());
        assert!(p.finish_power(vec![1.0; n]).is_none());
        assert!(p.finish_power(vec![1.0; n]).is_some());
    }

    #[test]
    fn percentile_of_sorted_vector() {
        let bins: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(percentile_25(&bins), 25.0);
    }

    #[test]
    fn rejects_invalid_config() {
        let mut c = cfg(300);
        c.fft_size = 300;
        assert!(SpectrumPipeline::new(c).is_err());
    }
}
