// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Internal commands handled by the session coordinator.
//!
//! The protocol layer translates free-form client JSON into these typed
//! variants before they reach the coordinator; validation of ranges happens
//! there as well, so handlers can assume well-formed values.

use crate::dsp::config::{AveragingMode, WindowKind};
use crate::sweep::plan::SweepMode;

/// Partial DSP update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DspUpdate {
    pub window: Option<WindowKind>,
    pub averaging: Option<AveragingMode>,
    pub dc_removal: Option<bool>,
    pub peak_hold: Option<bool>,
    pub peak_hold_decay_db: Option<f64>,
    pub output_bins: Option<usize>,
    pub reset_peak_hold: bool,
}

/// Partial AGC update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgcUpdate {
    pub enabled: Option<bool>,
    pub target_dbfs: Option<f64>,
    pub hysteresis_db: Option<f64>,
    pub step_db: Option<f64>,
    pub min_interval_secs: Option<f64>,
}

/// Parameters for starting a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepParams {
    pub mode: SweepMode,
    pub freq_start: f64,
    pub freq_end: f64,
    pub sample_rate: f64,
    pub averages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Stop,
    SetFrequency(f64),
    SetGain(f64),
    SetBandwidth(f64),
    SetSampleRate(f64),
    SetFftSize(usize),
    SetDsp(DspUpdate),
    SetAgc(AgcUpdate),
    SweepStart(SweepParams),
    SweepStop,
    DetectionEnable(bool),
    DetectionSetThreshold(f64),
    RecIqStart,
    RecIqStop,
    RecSpectrumStart,
    RecSpectrumStop,
    RecList,
    RecDelete { filename: String },
    PlaybackStart { filename: String },
    PlaybackPause,
    PlaybackResume,
    PlaybackStop,
    PlaybackSpeed(f64),
    PlaybackLoop(bool),
    PlaybackSeek(f64),
    GetStatus,
    CheckDevice,
}
