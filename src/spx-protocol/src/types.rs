// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transport DTOs for the JSON text protocol.
//!
//! Commands arrive as text frames on the same WebSocket that carries binary
//! spectrum data. Free-form fields (window names, averaging modes) stay
//! strings here; `codec` translates them into the typed core unions.

use serde::{Deserialize, Serialize};

use spx_core::detect::SignalEvent;
use spx_core::recording::RecordingDescriptor;
use spx_core::session::state::{DeviceProbe, StatusSnapshot};

/// Command received from network clients (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    Start,
    Stop,
    SetFrequency { value: f64 },
    SetGain { value: f64 },
    SetBandwidth { value: f64 },
    SetSampleRate { value: f64 },
    SetFftSize { value: usize },
    SetDsp { params: DspParamsDto },
    SetAgc(AgcParamsDto),
    SweepStart(SweepStartDto),
    SweepStop,
    DetectionEnable { enabled: bool },
    DetectionSet { params: DetectionParamsDto },
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
    PlaybackSpeed { value: f64 },
    PlaybackLoop { enabled: bool },
    PlaybackSeek { value: f64 },
    GetStatus,
    CheckDevice,
}

/// Free-form DSP parameter bag from `set_dsp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DspParamsDto {
    pub window_kind: Option<String>,
    pub averaging_mode: Option<String>,
    pub averaging_count: Option<usize>,
    pub averaging_alpha: Option<f64>,
    pub dc_removal: Option<bool>,
    pub peak_hold: Option<bool>,
    pub peak_hold_decay: Option<f64>,
    pub peak_hold_reset: Option<bool>,
    pub output_bins: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgcParamsDto {
    pub enabled: Option<bool>,
    pub target_dbfs: Option<f64>,
    pub hysteresis: Option<f64>,
    pub gain_step: Option<f64>,
    pub min_interval: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepStartDto {
    pub mode: String,
    pub freq_start: f64,
    pub freq_end: f64,
    pub sample_rate: f64,
    #[serde(default = "default_averages")]
    pub averages: usize,
}

fn default_averages() -> usize {
    4
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParamsDto {
    pub threshold_db: Option<f64>,
}

/// Text frame sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { data: Box<StatusSnapshot> },
    SignalEvent { data: SignalEvent },
    Recordings { data: Vec<RecordingDescriptor> },
    Device { data: DeviceProbe },
    Error { message: String },
}

impl ServerMessage {
    /// Serialize for a WebSocket text frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"type\":\"error\",\"message\":\"encode failure: {}\"}}", e)
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
