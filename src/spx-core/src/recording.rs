// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Recording descriptors shared by the recorders and the status surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingKind {
    Iq,
    Spectrum,
}

/// Sidecar metadata written next to every recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingDescriptor {
    pub kind: RecordingKind,
    pub filename: String,
    pub sample_rate: f64,
    pub center_freq: f64,
    pub bandwidth: f64,
    pub gain: f64,
    pub fft_size: usize,
    #[serde(default)]
    pub window: Option<String>,
    /// Unix seconds.
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub total_bytes: u64,
    /// IQ recordings: complex samples written. Spectrum recordings: frames.
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_round_trips_as_json() {
        let desc = RecordingDescriptor {
            kind: RecordingKind::Iq,
            filename: "iq_20250101_000000_100.000MHz".into(),
            sample_rate: 2e6,
            center_freq: 100e6,
            bandwidth: 2e6,
            gain: 40.0,
            fft_size: 2048,
            window: Some("blackman_harris".into()),
            start_time: 1735689600.0,
            end_time: 1735689660.0,
            total_bytes: 960_000_000,
            total_records: 120_000_000,
            duration_seconds: 60.0,
        };
        let json = serde_json::to_string_pretty(&desc).unwrap();
        let back: RecordingDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, RecordingKind::Iq);
        assert_eq!(back.filename, desc.filename);
        assert_eq!(back.total_bytes, desc.total_bytes);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{
            "kind": "spectrum",
            "filename": "spec_x",
            "sample_rate": 2e6,
            "center_freq": 1e8,
            "bandwidth": 2e6,
            "gain": 30.0,
            "fft_size": 1024,
            "start_time": 0.0
        }"#;
        let desc: RecordingDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.kind, RecordingKind::Spectrum);
        assert_eq!(desc.total_bytes, 0);
        assert_eq!(desc.window, None);
    }
}
