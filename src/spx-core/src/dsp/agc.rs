// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Software AGC: nudges hardware gain toward a target peak level.
//!
//! Pure observer. `update` returns the gain the device *should* move to; the
//! coordinator owns dispatching that change, so the AGC never touches device
//! state and never runs on the device thread.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SoftAgc {
    enabled: bool,
    target_dbfs: f64,
    /// Full dead-band width in dB; no adjustment within +/- half of it.
    hysteresis_db: f64,
    step_db: f64,
    min_interval: Duration,
    gain_min: f64,
    gain_max: f64,
    last_adjust: Option<Instant>,
}

impl Default for SoftAgc {
    fn default() -> Self {
        Self {
            enabled: false,
            target_dbfs: -20.0,
            hysteresis_db: 6.0,
            step_db: 3.0,
            min_interval: Duration::from_secs(1),
            gain_min: 0.0,
            gain_max: 60.0,
            last_adjust: None,
        }
    }
}

impl SoftAgc {
    #[must_use]
    pub fn new(gain_min: f64, gain_max: f64) -> Self {
        Self {
            gain_min,
            gain_max,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            tracing::info!(
                "AGC enabled: target={} dBFS, hysteresis={} dB, step={} dB",
                self.target_dbfs,
                self.hysteresis_db,
                self.step_db
            );
        } else {
            tracing::info!("AGC disabled");
        }
    }

    pub fn set_target(&mut self, dbfs: f64) {
        self.target_dbfs = dbfs;
    }

    pub fn set_hysteresis(&mut self, db: f64) {
        self.hysteresis_db = db.max(0.0);
    }

    pub fn set_step(&mut self, db: f64) {
        self.step_db = db.max(0.1);
    }

    pub fn set_min_interval(&mut self, interval: Duration) {
        self.min_interval = interval;
    }

    /// Evaluate the latest peak reading. Returns a new gain when an
    /// adjustment is due, `None` otherwise.
    pub fn update(&mut self, peak_dbfs: f64, current_gain: f64, now: Instant) -> Option<f64> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = self.last_adjust {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }

        let half = self.hysteresis_db / 2.0;
        let error = peak_dbfs - self.target_dbfs;
        let proposed = if error > half {
            current_gain - self.step_db
        } else if error < -half {
            current_gain + self.step_db
        } else {
            return None;
        };

        let clamped = proposed.clamp(self.gain_min, self.gain_max);
        if (clamped - current_gain).abs() < f64::EPSILON {
            return None;
        }

        self.last_adjust = Some(now);
        tracing::debug!(
            "AGC: peak={:.1} dBFS, target={:.1}, gain {:.0} -> {:.0} dB",
            peak_dbfs,
            self.target_dbfs,
            current_gain,
            clamped
        );
        Some(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_agc() -> SoftAgc {
        let mut agc = SoftAgc::new(0.0, 60.0);
        agc.set_enabled(true);
        agc
    }

    #[test]
    fn disabled_never_adjusts() {
        let mut agc = SoftAgc::new(0.0, 60.0);
        assert_eq!(agc.update(0.0, 40.0, Instant::now()), None);
    }

    #[test]
    fn strong_signal_reduces_gain() {
        let mut agc = enabled_agc();
        // Peak -10 dBFS vs target -20: error +10 > +3 -> step down.
        assert_eq!(agc.update(-10.0, 40.0, Instant::now()), Some(37.0));
    }

    #[test]
    fn weak_signal_increases_gain() {
        let mut agc = enabled_agc();
        assert_eq!(agc.update(-50.0, 40.0, Instant::now()), Some(43.0));
    }

    #[test]
    fn dead_band_holds_steady() {
        let mut agc = enabled_agc();
        assert_eq!(agc.update(-22.0, 40.0, Instant::now()), None);
        assert_eq!(agc.update(-18.0, 40.0, Instant::now()), None);
    }

    #[test]
    fn rate_limited_to_one_step_per_interval() {
        let mut agc = enabled_agc();
        let t0 = Instant::now();
        assert!(agc.update(-10.0, 40.0, t0).is_some());
        // 500 ms later: still inside the 1 s interval.
        assert_eq!(agc.update(-10.0, 37.0, t0 + Duration::from_millis(500)), None);
        // Past the interval: allowed again.
        assert_eq!(
            agc.update(-10.0, 37.0, t0 + Duration::from_millis(1100)),
            Some(34.0)
        );
    }

    #[test]
    fn clamps_to_gain_range() {
        let mut agc = enabled_agc();
        assert_eq!(agc.update(-50.0, 59.0, Instant::now()), Some(60.0));
        // Already at the rail: no change, no rate-limit consumption.
        let mut agc = enabled_agc();
        assert_eq!(agc.update(-50.0, 60.0, Instant::now()), None);
    }
}
