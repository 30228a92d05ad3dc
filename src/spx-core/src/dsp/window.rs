// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Window tables and their dBFS correction factors.
//!
//! Each table carries its coherent power gain `(sum(w)/N)^2` so a full-scale
//! tone reads 0 dBFS after normalization regardless of the window in use.

use std::f64::consts::PI;

use super::config::WindowKind;

/// Precomputed window with its coherent power gain.
#[derive(Debug, Clone)]
pub struct Window {
    pub kind: WindowKind,
    coeffs: Vec<f32>,
    power_gain: f64,
}

impl Window {
    #[must_use]
    pub fn new(kind: WindowKind, size: usize) -> Self {
        let coeffs = generate(kind, size);
        let sum: f64 = coeffs.iter().map(|&c| c as f64).sum();
        let coherent_gain = if size > 0 { sum / size as f64 } else { 1.0 };
        Self {
            kind,
            coeffs,
            power_gain: coherent_gain * coherent_gain,
        }
    }

    #[must_use]
    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    /// Coherent power gain `(sum(w)/N)^2`; 1.0 for the rectangular window.
    #[must_use]
    pub fn power_gain(&self) -> f64 {
        self.power_gain
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }
}

fn generate(kind: WindowKind, size: usize) -> Vec<f32> {
    if size == 0 {
        return Vec::new();
    }
    if size == 1 {
        return vec![1.0];
    }
    let m = (size - 1) as f64;
    match kind {
        WindowKind::Rectangular => vec![1.0; size],
        WindowKind::Hanning => (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / m).cos()))
            .map(|w| w as f32)
            .collect(),
        WindowKind::Blackman => (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / m;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .map(|w| w as f32)
            .collect(),
        WindowKind::BlackmanHarris => cosine_sum(size, &[0.35875, -0.48829, 0.14128, -0.01168]),
        WindowKind::FlatTop => cosine_sum(
            size,
            &[
                0.215_578_95,
                -0.416_631_58,
                0.277_263_158,
                -0.083_578_947,
                0.006_947_368,
            ],
        ),
        WindowKind::Kaiser6 => kaiser(size, 6.0),
        WindowKind::Kaiser10 => kaiser(size, 10.0),
        WindowKind::Kaiser14 => kaiser(size, 14.0),
    }
}

fn cosine_sum(size: usize, terms: &[f64]) -> Vec<f32> {
    let m = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / m;
            terms
                .iter()
                .enumerate()
                .map(|(k, &a)| a * (k as f64 * x).cos())
                .sum::<f64>()
        })
        .map(|w| w as f32)
        .collect()
}

fn kaiser(size: usize, beta: f64) -> Vec<f32> {
    let m = (size - 1) as f64;
    let denom = bessel_i0(beta);
    (0..size)
        .map(|i| {
            let r = 2.0 * i as f64 / m - 1.0;
            bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / denom
        })
        .map(|w| w as f32)
        .collect()
}

/// Modified Bessel function of the first kind, order zero (power series).
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= (half / k as f64) * (half / k as f64);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangular_unity() {
        let w = Window::new(WindowKind::Rectangular, 1024);
        assert!(w.coeffs().iter().all(|&c| c == 1.0));
        assert!((w.power_gain() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hanning_shape() {
        let w = Window::new(WindowKind::Hanning, 64);
        assert!(w.coeffs()[0].abs() < 1e-6);
        assert!(w.coeffs()[63].abs() < 1e-6);
        // Midpoint of an even-length Hann window sits just below 1.0.
        let mid = w.coeffs()[32];
        assert!(mid > 0.99 && mid <= 1.0, "mid = {}", mid);
    }

    #[test]
    fn blackman_harris_sidelobe_floor() {
        let w = Window::new(WindowKind::BlackmanHarris, 128);
        // First coefficient equals the sum of the term signs: ~6e-5.
        assert!(w.coeffs()[0] < 1e-3);
        assert!(w.power_gain() > 0.0 && w.power_gain() < 1.0);
    }

    #[test]
    fn kaiser_monotone_center() {
        let w = Window::new(WindowKind::Kaiser10, 65);
        let c = w.coeffs();
        assert!((c[32] - 1.0).abs() < 1e-6);
        for i in 0..32 {
            assert!(c[i] <= c[i + 1] + 1e-7);
        }
    }

    #[test]
    fn bessel_i0_reference_values() {
        assert!((bessel_i0(0.0) - 1.0).abs() < 1e-12);
        // I0(1) = 1.2660658..., I0(5) = 27.239871...
        assert!((bessel_i0(1.0) - 1.266_065_877_752_008).abs() < 1e-9);
        assert!((bessel_i0(5.0) - 27.239_871_823_604_45).abs() < 1e-6);
    }

    #[test]
    fn all_windows_have_positive_gain() {
        for &kind in WindowKind::all() {
            let w = Window::new(kind, 512);
            assert!(w.power_gain() > 0.0, "{:?}", kind);
            assert_eq!(w.len(), 512);
        }
    }
}
