// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for spx-server.
//!
//! Supports loading configuration from TOML files with the following search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./spx-server.toml` (current directory)
//! 3. `~/.config/spx-rs/server.toml` (XDG config)
//! 4. `/etc/spx-rs/server.toml` (system-wide)

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub listen: ListenConfig,
    pub device: DeviceConfig,
    pub dsp: DspSection,
    pub stream: StreamConfig,
    pub sweep: SweepConfig,
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// WebSocket listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            port: 5000,
        }
    }
}

/// SDR source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Source backend name (e.g. "synthetic")
    pub source: String,
    /// Backend-specific args string
    pub args: String,
    pub center_freq_hz: f64,
    pub sample_rate: f64,
    pub bandwidth_hz: f64,
    pub gain_db: f64,
    pub min_freq_hz: f64,
    pub max_freq_hz: f64,
    pub min_gain_db: f64,
    pub max_gain_db: f64,
    pub min_sample_rate: f64,
    pub max_sample_rate: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            args: String::new(),
            center_freq_hz: 100e6,
            sample_rate: 2e6,
            bandwidth_hz: 2e6,
            gain_db: 40.0,
            min_freq_hz: 47e6,
            max_freq_hz: 6e9,
            min_gain_db: 0.0,
            max_gain_db: 60.0,
            min_sample_rate: 1e6,
            max_sample_rate: 61.44e6,
        }
    }
}

/// DSP pipeline defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DspSection {
    pub fft_size: usize,
    pub window: String,
    /// "none", "linear", "exponential"
    pub averaging_mode: String,
    pub averaging_count: usize,
    pub averaging_alpha: f64,
    pub dc_removal: bool,
    /// 0.0 or 0.5
    pub overlap: f64,
    pub output_bins: usize,
}

impl Default for DspSection {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            window: "blackman_harris".to_string(),
            averaging_mode: "exponential".to_string(),
            averaging_count: 8,
            averaging_alpha: 0.3,
            dc_removal: true,
            overlap: 0.5,
            output_bins: 2048,
        }
    }
}

/// Queue depths and pacing for the streaming pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample bridge depth in milliseconds of capture.
    pub bridge_ms: u64,
    /// DSP worker -> coordinator frame queue depth.
    pub frame_queue: usize,
    /// Live frame emission ceiling.
    pub target_fps: f64,
    /// Per-client lossless sweep backlog before disconnect.
    pub client_sweep_queue: usize,
    /// Per-client text backlog before disconnect.
    pub client_text_queue: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bridge_ms: 128,
            frame_queue: 8,
            target_fps: 30.0,
            client_sweep_queue: 64,
            client_text_queue: 32,
        }
    }
}

/// Sweep engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Fraction of the capture bandwidth retained per step.
    pub usable_fraction: f64,
    /// Blocks discarded after each retune while the PLL settles.
    pub settle_blocks: usize,
    /// Panorama emission bin budget.
    pub display_bins: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            usable_fraction: 0.8,
            settle_blocks: 2,
            display_bins: 4096,
        }
    }
}

/// Signal detector defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub threshold_db: f64,
    pub min_width_bins: usize,
    pub merge_gap_bins: usize,
    pub smooth_bins: usize,
    pub miss_count: u32,
    pub freq_tol_min_hz: f64,
    pub max_tracked: usize,
}

impl Default for DetectionConfig {
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

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub storage_path: PathBuf,
    /// Total budget across all recordings, not per file.
    pub max_storage_bytes: u64,
    /// Recorder queue depth in blocks; overflow drops, never blocks DSP.
    pub queue_blocks: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("recordings"),
            max_storage_bytes: 10 * 1024 * 1024 * 1024,
            queue_blocks: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in Self::default_search_paths() {
            if path.exists() {
                let config = Self::load_from_file(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("spx-server.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("spx-rs").join("server.toml"));
        }
        paths.push(PathBuf::from("/etc/spx-rs/server.toml"));
        paths
    }

    /// Validate cross-field consistency before the server starts.
    pub fn validate(&self) -> Result<(), String> {
        if !self.dsp.fft_size.is_power_of_two()
            || !(256..=8192).contains(&self.dsp.fft_size)
        {
            return Err(format!(
                "dsp.fft_size {} must be a power of two in 256..=8192",
                self.dsp.fft_size
            ));
        }
        if self.dsp.output_bins == 0 || self.dsp.output_bins > self.dsp.fft_size {
            return Err(format!(
                "dsp.output_bins {} must be in 1..=fft_size",
                self.dsp.output_bins
            ));
        }
        if self.dsp.overlap != 0.0 && self.dsp.overlap != 0.5 {
            return Err(format!(
                "dsp.overlap {} must be 0.0 or 0.5",
                self.dsp.overlap
            ));
        }
        if spx_core::dsp::config::WindowKind::parse(&self.dsp.window).is_none() {
            return Err(format!("dsp.window '{}' is not a known window", self.dsp.window));
        }
        if !matches!(
            self.dsp.averaging_mode.as_str(),
            "none" | "linear" | "exponential"
        ) {
            return Err(format!(
                "dsp.averaging_mode '{}' must be none, linear, or exponential",
                self.dsp.averaging_mode
            ));
        }
        if self.device.min_freq_hz >= self.device.max_freq_hz {
            return Err("device frequency range is inverted".to_string());
        }
        if self.device.sample_rate <= 0.0
            || self.device.sample_rate < self.device.min_sample_rate
            || self.device.sample_rate > self.device.max_sample_rate
        {
            return Err(format!(
                "device.sample_rate {} outside supported range",
                self.device.sample_rate
            ));
        }
        if !(self.sweep.usable_fraction > 0.0 && self.sweep.usable_fraction <= 1.0) {
            return Err(format!(
                "sweep.usable_fraction {} must be in (0, 1]",
                self.sweep.usable_fraction
            ));
        }
        if self.stream.target_fps <= 0.0 {
            return Err("stream.target_fps must be positive".to_string());
        }
        Ok(())
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        toml::to_string_pretty(&ServerConfig::default()).unwrap_or_default()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, String),
    ParseError(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadError(path, err) => {
                write!(f, "failed to read config file '{}': {}", path.display(), err)
            }
            Self::ParseError(path, err) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.port, 5000);
        assert_eq!(config.device.source, "synthetic");
        assert_eq!(config.device.sample_rate, 2e6);
        assert_eq!(config.dsp.fft_size, 2048);
        assert_eq!(config.dsp.window, "blackman_harris");
        assert_eq!(config.sweep.usable_fraction, 0.8);
        assert_eq!(config.detection.miss_count, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[device]
source = "synthetic"
center_freq_hz = 433.92e6

[listen]
port = 8080
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.center_freq_hz, 433.92e6);
        assert_eq!(config.listen.port, 8080);
        // Untouched sections keep defaults.
        assert_eq!(config.dsp.fft_size, 2048);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[listen]
listen = "127.0.0.1"
port = 9000

[device]
source = "synthetic"
args = "tone=100.2e6:0.5"
sample_rate = 4e6

[dsp]
fft_size = 4096
window = "kaiser_10"
averaging_mode = "linear"
averaging_count = 16
overlap = 0.0

[sweep]
usable_fraction = 0.75
settle_blocks = 3

[detection]
threshold_db = 15.0
miss_count = 3

[recording]
storage_path = "/tmp/spx-recordings"
max_storage_bytes = 1000000
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.listen.port, 9000);
        assert_eq!(config.device.sample_rate, 4e6);
        assert_eq!(config.dsp.fft_size, 4096);
        assert_eq!(config.dsp.window, "kaiser_10");
        assert_eq!(config.dsp.overlap, 0.0);
        assert_eq!(config.sweep.usable_fraction, 0.75);
        assert_eq!(config.detection.miss_count, 3);
        assert_eq!(
            config.recording.storage_path,
            PathBuf::from("/tmp/spx-recordings")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fft() {
        let mut config = ServerConfig::default();
        config.dsp.fft_size = 3000;
        assert!(config.validate().is_err());
        config.dsp.fft_size = 16384;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_overlap() {
        let mut config = ServerConfig::default();
        config.dsp.overlap = 0.25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_sample_rate() {
        let mut config = ServerConfig::default();
        config.device.sample_rate = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ServerConfig::example_toml();
        let config: ServerConfig = toml::from_str(&example).unwrap();
        assert!(config.validate().is_ok());
    }
}
