// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod runner;
pub mod synthetic;

use std::collections::HashMap;

use num_complex::Complex32;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("device busy: {0}")]
    Busy(String),
    #[error("invalid source config: {0}")]
    Config(String),
}

/// Tuning applied to a source at open time and on reconfiguration.
#[derive(Debug, Clone, Copy)]
pub struct SourceConfig {
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub gain: f64,
}

/// Abstraction over any IQ sample source (hardware device, synthetic
/// generator, or file playback).
pub trait SampleSource: Send + 'static {
    /// Read the next run of IQ samples into `buf`; returns samples written.
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError>;

    /// True when `read_into` blocks until samples are ready (hardware).
    /// The capture loop throttles non-blocking sources to real time.
    fn is_blocking(&self) -> bool {
        false
    }

    fn set_center_freq(&mut self, _hz: f64) -> Result<(), SourceError> {
        Ok(())
    }

    fn set_sample_rate(&mut self, _hz: f64) -> Result<(), SourceError> {
        Ok(())
    }

    fn set_bandwidth(&mut self, _hz: f64) -> Result<(), SourceError> {
        Ok(())
    }

    fn set_gain(&mut self, _db: f64) -> Result<(), SourceError> {
        Ok(())
    }

    /// Human-readable description for probe responses.
    fn describe(&self) -> String {
        "sample source".to_string()
    }
}

pub type SourceFactory = fn(&str, &SourceConfig) -> Result<Box<dyn SampleSource>, SourceError>;

/// Registry of named source factories.
///
/// Hardware backends register here the same way the synthetic source does,
/// keeping vendor libraries behind this crate's seam.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: SourceFactory) {
        self.factories.insert(normalize_name(name), factory);
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build(
        &self,
        name: &str,
        args: &str,
        config: &SourceConfig,
    ) -> Result<Box<dyn SampleSource>, SourceError> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| SourceError::Config(format!("unknown source backend: {}", name)))?;
        factory(args, config)
    }
}

/// Register all built-in source backends.
pub fn register_builtin_sources(registry: &mut SourceRegistry) {
    registry.register("synthetic", synthetic_factory);
}

fn synthetic_factory(args: &str, config: &SourceConfig) -> Result<Box<dyn SampleSource>, SourceError> {
    Ok(Box::new(synthetic::SyntheticSource::from_args(args, config)?))
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SourceConfig {
        SourceConfig {
            center_freq: 100e6,
            sample_rate: 2e6,
            bandwidth: 2e6,
            gain: 40.0,
        }
    }

    #[test]
    fn builtin_synthetic_registers() {
        let mut reg = SourceRegistry::new();
        register_builtin_sources(&mut reg);
        assert!(reg.is_registered("synthetic"));
        assert!(reg.is_registered("SYNTHETIC"));
        assert!(reg.build("synthetic", "", &config()).is_ok());
    }

    #[test]
    fn unknown_backend_rejected() {
        let reg = SourceRegistry::new();
        match reg.build("bladerf", "", &config()) {
            Err(SourceError::Config(msg)) => assert!(msg.contains("bladerf")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn names_normalize() {
        assert_eq!(normalize_name("Blade-RF_2.0"), "bladerf20");
    }
}
