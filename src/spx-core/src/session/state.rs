// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Authoritative session state and the read-only snapshot shared with
//! clients. The coordinator is the single writer; everyone else sees
//! snapshots.

use serde::Serialize;

use crate::dsp::config::DspConfig;
use crate::sweep::plan::SweepMode;

/// Operating mode of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Idle,
    Live,
    SweepRunning,
    Playback,
}

/// Device tuning currently in force.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeviceParams {
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub gain: f64,
}

/// Result of a device probe.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProbe {
    pub device_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStatus {
    pub sweep_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_mode: Option<SweepMode>,
    pub sweep_id: u32,
    pub sweep_step: usize,
    pub sweep_total_steps: usize,
    pub sweep_progress: f64,
    pub sweep_last_duration_ms: f64,
    pub sweeps_completed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecorderStatus {
    pub iq_recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iq_filename: Option<String>,
    pub iq_bytes_written: u64,
    pub spectrum_recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrum_filename: Option<String>,
    pub spectrum_frames_written: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaybackStatus {
    pub playing: bool,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub speed: f64,
    pub looping: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectorStatus {
    pub detection_enabled: bool,
    pub threshold_db: f64,
    pub tracked_signals: usize,
    pub total_detections: u64,
}

/// Read-only projection of session state shared with clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub mode: SessionMode,
    pub streaming: bool,
    pub device_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_error: Option<String>,
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub gain: f64,
    pub agc_enabled: bool,
    pub fft_size: usize,
    pub window: String,
    pub averaging_mode: String,
    pub dc_removal: bool,
    pub peak_hold: bool,
    pub output_bins: usize,
    pub dropped_blocks: u64,
    pub frames_emitted: u64,
    pub clients: usize,
    pub sweep: SweepStatus,
    pub recorder: RecorderStatus,
    pub playback: PlaybackStatus,
    pub detector: DetectorStatus,
}

/// Mutable session state owned by the coordinator task.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: SessionMode,
    pub device: DeviceParams,
    pub device_connected: bool,
    pub device_error: Option<String>,
    pub dsp: DspConfig,
    pub agc_enabled: bool,
    pub dropped_blocks: u64,
    pub frames_emitted: u64,
    pub clients: usize,
    pub sweep: SweepStatus,
    pub recorder: RecorderStatus,
    pub playback: PlaybackStatus,
    pub detector: DetectorStatus,
}

impl SessionState {
    #[must_use]
    pub fn new(device: DeviceParams, dsp: DspConfig) -> Self {
        Self {
            mode: SessionMode::Idle,
            device,
            device_connected: true,
            device_error: None,
            dsp,
            agc_enabled: false,
            dropped_blocks: 0,
            frames_emitted: 0,
            clients: 0,
            sweep: SweepStatus::default(),
            recorder: RecorderStatus::default(),
            playback: PlaybackStatus::default(),
            detector: DetectorStatus::default(),
        }
    }

    /// Produce the client-facing snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.mode,
            streaming: matches!(self.mode, SessionMode::Live | SessionMode::Playback),
            device_connected: self.device_connected,
            device_error: self.device_error.clone(),
            center_freq: self.device.center_freq,
            sample_rate: self.device.sample_rate,
            bandwidth: self.device.bandwidth,
            gain: self.device.gain,
            agc_enabled: self.agc_enabled,
            fft_size: self.dsp.fft_size,
            window: self.dsp.window.name().to_string(),
            averaging_mode: averaging_name(&self.dsp.averaging),
            dc_removal: self.dsp.dc_removal,
            peak_hold: self.dsp.peak_hold,
            output_bins: self.dsp.output_bins,
            dropped_blocks: self.dropped_blocks,
            frames_emitted: self.frames_emitted,
            clients: self.clients,
            sweep: self.sweep.clone(),
            recorder: self.recorder.clone(),
            playback: self.playback.clone(),
            detector: self.detector.clone(),
        }
    }
}

fn averaging_name(mode: &crate::dsp::config::AveragingMode) -> String {
    use crate::dsp::config::AveragingMode;
    match mode {
        AveragingMode::None => "none".to_string(),
        AveragingMode::Linear { .. } => "linear".to_string(),
        AveragingMode::Exponential { .. } => "exponential".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(
            DeviceParams {
                center_freq: 100e6,
                sample_rate: 2e6,
                bandwidth: 2e6,
                gain: 40.0,
            },
            DspConfig::default(),
        )
    }

    #[test]
    fn snapshot_reflects_mode() {
        let mut s = state();
        assert!(!s.snapshot().streaming);
        s.mode = SessionMode::Live;
        assert!(s.snapshot().streaming);
        s.mode = SessionMode::SweepRunning;
        assert!(!s.snapshot().streaming);
        s.mode = SessionMode::Playback;
        assert!(s.snapshot().streaming);
    }

    #[test]
    fn snapshot_serializes() {
        let snap = state().snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["mode"], "idle");
        assert_eq!(json["fft_size"], 2048);
        assert_eq!(json["window"], "blackman_harris");
        assert_eq!(json["averaging_mode"], "exponential");
        // device_error is omitted when None.
        assert!(json.get("device_error").is_none());
    }
}
