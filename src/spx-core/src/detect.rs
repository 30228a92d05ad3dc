// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Persistent-signal detector.
//!
//! Runs on each finalized spectrum frame. Contiguous bin runs above a
//! noise-floor-relative threshold become candidates; candidates associate to
//! tracked signals by nearest center frequency within a tolerance. Signals
//! missing for `miss_count` consecutive frames expire with a lost event.
//! All thresholding and smoothing happens in linear power.

use std::collections::HashMap;

use serde::Serialize;

use crate::dsp::dbfs_to_linear;
use crate::radio::freq::BinMapping;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Detection threshold above the noise floor, dB.
    pub threshold_db: f64,
    /// Runs narrower than this many bins are discarded.
    pub min_width_bins: usize,
    /// Runs separated by at most this many bins are merged.
    pub merge_gap_bins: usize,
    /// Moving-average smoothing window (bins); 0 or 1 disables smoothing.
    pub smooth_bins: usize,
    /// Consecutive missed frames before a tracked signal expires.
    pub miss_count: u32,
    /// Floor for the association tolerance, Hz.
    pub freq_tol_min_hz: f64,
    /// Tracking capacity; excess candidates are ignored.
    pub max_tracked: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_db: 12.0,
            min_width_bins: 3,
            merge_gap_bins: 2,
            smooth_bins: 3,
            miss_count: 5,
            freq_tol_min_hz: 1_000.0,
            max_tracked: 64,
        }
    }
}

/// A signal currently being tracked.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedSignal {
    pub signal_id: u64,
    pub center_freq: f64,
    pub peak_freq: f64,
    pub bandwidth: f64,
    pub peak_power: f32,
    pub bin_start: usize,
    pub bin_end: usize,
    pub first_seen: f64,
    pub last_seen: f64,
    pub hit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalEventKind {
    SignalNew,
    SignalUpdate,
    SignalLost,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalEvent {
    pub event: SignalEventKind,
    #[serde(flatten)]
    pub signal: TrackedSignal,
}

struct Candidate {
    bin_start: usize,
    bin_end: usize,
    peak_bin: usize,
    peak_linear: f64,
    center_freq: f64,
    peak_freq: f64,
    bandwidth: f64,
}

pub struct SignalDetector {
    cfg: DetectorConfig,
    tracked: HashMap<u64, TrackedSignal>,
    misses: HashMap<u64, u32>,
    next_id: u64,
    total_detections: u64,
}

impl SignalDetector {
    #[must_use]
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            cfg,
            tracked: HashMap::new(),
            misses: HashMap::new(),
            next_id: 1,
            total_detections: 0,
        }
    }

    pub fn config_mut(&mut self) -> &mut DetectorConfig {
        &mut self.cfg
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    #[must_use]
    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    #[must_use]
    pub fn tracked_signals(&self) -> Vec<TrackedSignal> {
        let mut v: Vec<TrackedSignal> = self.tracked.values().cloned().collect();
        v.sort_by_key(|s| s.signal_id);
        v
    }

    /// Drop all tracked signals, emitting a lost event for each.
    pub fn clear(&mut self, now: f64) -> Vec<SignalEvent> {
        let mut events: Vec<SignalEvent> = self
            .tracked
            .drain()
            .map(|(_, mut sig)| {
                sig.last_seen = now;
                SignalEvent {
                    event: SignalEventKind::SignalLost,
                    signal: sig,
                }
            })
            .collect();
        events.sort_by_key(|e| e.signal.signal_id);
        self.misses.clear();
        events
    }

    /// Run one detection pass over a dBFS frame.
    ///
    /// `now` is the frame timestamp in seconds; callers supply it so tests
    /// stay deterministic.
    pub fn process(
        &mut self,
        bins_dbfs: &[f32],
        noise_floor_dbfs: f32,
        center_freq: f64,
        sample_rate: f64,
        now: f64,
    ) -> Vec<SignalEvent> {
        if bins_dbfs.is_empty() {
            return Vec::new();
        }
        let map = BinMapping::new(center_freq, sample_rate, bins_dbfs.len());
        let candidates = self.extract_candidates(bins_dbfs, noise_floor_dbfs, &map);
        self.associate(candidates, now)
    }

    fn extract_candidates(
        &self,
        bins_dbfs: &[f32],
        noise_floor_dbfs: f32,
        map: &BinMapping,
    ) -> Vec<Candidate> {
        let linear: Vec<f64> = bins_dbfs.iter().map(|&db| dbfs_to_linear(db as f64)).collect();
        let smoothed = moving_average(&linear, self.cfg.smooth_bins);
        let threshold = dbfs_to_linear(noise_floor_dbfs as f64) * dbfs_to_linear(self.cfg.threshold_db);

        let runs = merge_runs(
            find_runs(&smoothed, threshold),
            self.cfg.merge_gap_bins,
        );

        runs.into_iter()
            .filter(|&(s, e)| e - s >= self.cfg.min_width_bins)
            .map(|(start, end)| {
                let (peak_off, &peak_linear) = smoothed[start..end]
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .expect("non-empty run");
                let peak_bin = start + peak_off;
                Candidate {
                    bin_start: start,
                    bin_end: end,
                    peak_bin,
                    peak_linear,
                    center_freq: map.freq_at((start + end - 1) as f64 / 2.0),
                    peak_freq: map.freq_at(peak_bin as f64),
                    bandwidth: (end - start) as f64 * map.bin_width(),
                }
            })
            .collect()
    }

    fn associate(&mut self, candidates: Vec<Candidate>, now: f64) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        let mut matched: Vec<u64> = Vec::new();

        for cand in candidates {
            let tol = (cand.bandwidth * 0.5).max(self.cfg.freq_tol_min_hz);
            let best = self
                .tracked
                .values()
                .filter(|sig| !matched.contains(&sig.signal_id))
                .map(|sig| (sig.signal_id, (sig.center_freq - cand.center_freq).abs()))
                .filter(|&(_, dist)| dist <= tol)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            if let Some((id, _)) = best {
                let sig = self.tracked.get_mut(&id).expect("tracked id");
                sig.center_freq = cand.center_freq;
                sig.peak_freq = cand.peak_freq;
                sig.bandwidth = cand.bandwidth;
                sig.peak_power = crate::dsp::linear_to_dbfs(cand.peak_linear) as f32;
                sig.bin_start = cand.bin_start;
                sig.bin_end = cand.bin_end;
                sig.last_seen = now;
                sig.hit_count += 1;
                matched.push(id);
                self.misses.insert(id, 0);
                events.push(SignalEvent {
                    event: SignalEventKind::SignalUpdate,
                    signal: sig.clone(),
                });
            } else {
                if self.tracked.len() >= self.cfg.max_tracked {
                    continue;
                }
                let sig = TrackedSignal {
                    signal_id: self.next_id,
                    center_freq: cand.center_freq,
                    peak_freq: cand.peak_freq,
                    bandwidth: cand.bandwidth,
                    peak_power: crate::dsp::linear_to_dbfs(cand.peak_linear) as f32,
                    bin_start: cand.bin_start,
                    bin_end: cand.bin_end,
                    first_seen: now,
                    last_seen: now,
                    hit_count: 1,
                    classification: None,
                };
                self.next_id += 1;
                self.total_detections += 1;
                matched.push(sig.signal_id);
                self.misses.insert(sig.signal_id, 0);
                events.push(SignalEvent {
                    event: SignalEventKind::SignalNew,
                    signal: sig.clone(),
                });
                self.tracked.insert(sig.signal_id, sig);
            }
        }

        // Count a miss for everything that found no candidate this frame.
        let mut expired = Vec::new();
        for (&id, sig) in &self.tracked {
            if matched.contains(&id) {
                continue;
            }
            let miss = self.misses.entry(id).or_insert(0);
            *miss += 1;
            if *miss >= self.cfg.miss_count {
                expired.push(sig.signal_id);
            }
        }
        expired.sort_unstable();
        for id in expired {
            if let Some(sig) = self.tracked.remove(&id) {
                self.misses.remove(&id);
                events.push(SignalEvent {
                    event: SignalEventKind::SignalLost,
                    signal: sig,
                });
            }
        }

        events
    }
}

/// Centered box-filter moving average in linear power.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let half = window / 2;
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let sum: f64 = values[lo..hi].iter().sum();
        out.push(sum / (hi - lo) as f64);
    }
    out
}

/// Contiguous runs strictly above `threshold`, as half-open `(start, end)`.
fn find_runs(values: &[f64], threshold: f64) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v > threshold {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            runs.push((s, i));
        }
    }
    if let Some(s) = start {
        runs.push((s, values.len()));
    }
    runs
}

fn merge_runs(runs: Vec<(usize, usize)>, gap: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
    for (s, e) in runs {
        match merged.last_mut() {
            Some(prev) if s.saturating_sub(prev.1) <= gap => prev.1 = e,
            _ => merged.push((s, e)),
        }
    }
    merged
}
