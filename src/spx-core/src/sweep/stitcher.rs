// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Panorama assembly from sweep segments.
//!
//! The panorama accumulates in **linear power**; conversion to dBFS happens
//! once, at emission. Segments arrive in step order carrying their usable
//! window plus a crossfade margin taken from the capture's guard band.
//! Where a segment overlaps previously written data, a linear ramp weights
//! the new data by `w` and the old by `1 - w`, so weights sum to one at every
//! bin and a flat input never gains a +3 dB seam.

use super::plan::SweepPlan;
use crate::dsp::downsample::peak_downsample;
use crate::dsp::{linear_to_dbfs, SENTINEL_DBFS};

pub struct PanoramaStitcher {
    usable_bins: usize,
    total_bins: usize,
    margin: usize,
    /// Linear power per panorama bin; meaningful only up to `written_end`.
    linear: Vec<f64>,
    /// Exclusive high-water mark of written bins.
    written_end: usize,
}

impl PanoramaStitcher {
    #[must_use]
    pub fn new(plan: &SweepPlan) -> Self {
        let total_bins = plan.usable_bins * plan.total_segments();
        Self {
            usable_bins: plan.usable_bins,
            total_bins,
            margin: plan.overlap_margin(),
            linear: vec![0.0; total_bins],
            written_end: 0,
        }
    }

    #[must_use]
    pub fn total_bins(&self) -> usize {
        self.total_bins
    }

    #[must_use]
    pub fn margin(&self) -> usize {
        self.margin
    }

    /// Number of extra leading bins a segment should carry for `step_idx`.
    /// The first segment has no predecessor to blend with.
    #[must_use]
    pub fn lead_margin(&self, step_idx: usize) -> usize {
        if step_idx == 0 {
            0
        } else {
            self.margin
        }
    }

    /// Number of extra trailing bins a segment should carry for `step_idx`.
    #[must_use]
    pub fn tail_margin(&self, step_idx: usize, total_segments: usize) -> usize {
        if step_idx + 1 >= total_segments {
            0
        } else {
            self.margin
        }
    }

    /// Insert a segment's linear-power bins.
    ///
    /// `bins` must hold `lead + usable_bins + tail` values, where `lead` and
    /// `tail` are the margins reported for this step. Bins beyond the
    /// panorama's reserved extent are ignored.
    pub fn add_segment(&mut self, step_idx: usize, bins: &[f64], lead: usize) {
        let seg_start = (step_idx * self.usable_bins).saturating_sub(lead);
        let seg_end = (seg_start + bins.len()).min(self.total_bins);
        if seg_start >= seg_end {
            return;
        }
        let bins = &bins[..seg_end - seg_start];

        // Overlap with previously written data: only where the new extent
        // reaches back below the high-water mark.
        let overlap_end = self.written_end.clamp(seg_start, seg_end);
        let overlap_len = overlap_end - seg_start;

        for (offset, &value) in bins.iter().enumerate() {
            let idx = seg_start + offset;
            if offset < overlap_len {
                // Ramp 0 -> 1 across the overlap: starts as the previous
                // segment's data, ends as ours. Weights sum to exactly 1.
                let w = if overlap_len > 1 {
                    offset as f64 / (overlap_len - 1) as f64
                } else {
                    0.5
                };
                self.linear[idx] = w * value + (1.0 - w) * self.linear[idx];
            } else {
                self.linear[idx] = value;
            }
        }
        self.written_end = self.written_end.max(seg_end);
    }

    /// Full-resolution panorama in dBFS; unscanned bins carry the sentinel.
    #[must_use]
    pub fn to_dbfs(&self) -> Vec<f32> {
        self.linear
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                if i < self.written_end && p > 0.0 {
                    linear_to_dbfs(p) as f32
                } else {
                    SENTINEL_DBFS
                }
            })
            .collect()
    }

    /// Peak-preserving downsample to at most `target_bins` for emission.
    #[must_use]
    pub fn display_dbfs(&self, target_bins: usize) -> Vec<f32> {
        let full = self.to_dbfs();
        if full.len() <= target_bins {
            return full;
        }
        let as_f64: Vec<f64> = full.iter().map(|&v| v as f64).collect();
        peak_downsample(&as_f64, target_bins)
            .into_iter()
            .map(|v| v as f32)
            .collect()
    }

    /// Clear for the next sweep pass.
    pub fn reset(&mut self) {
        self.linear.iter_mut().for_each(|p| *p = 0.0);
        self.written_end = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::dbfs_to_linear;
    use crate::sweep::plan::SweepPlan;

    fn test_plan() -> SweepPlan {
        // 4 steps, usable_bins = 1640, margin = min(205, 32, 204) = 32.
        SweepPlan::new(100e6, 130e6, 10e6, 0.8, 2048).unwrap()
    }

    fn feed_constant(stitcher: &mut PanoramaStitcher, plan: &SweepPlan, power: f64) {
        let total = plan.total_segments();
        for step in 0..total {
            let lead = stitcher.lead_margin(step);
            let tail = stitcher.tail_margin(step, total);
            let bins = vec![power; lead + plan.usable_bins + tail];
            stitcher.add_segment(step, &bins, lead);
        }
    }

    #[test]
    fn constant_power_has_no_seams() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        let p = dbfs_to_linear(-40.0);
        feed_constant(&mut stitcher, &plan, p);

        let pano = stitcher.to_dbfs();
        assert_eq!(pano.len(), plan.usable_bins * 4);
        for (i, &db) in pano.iter().enumerate() {
            assert!(
                (db as f64 + 40.0).abs() < 1e-5,
                "seam at bin {}: {} dBFS",
                i,
                db
            );
        }
    }

    #[test]
    fn crossfade_ramps_between_levels() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        let low = dbfs_to_linear(-60.0);
        let high = dbfs_to_linear(-20.0);
        let total = plan.total_segments();

        let tail = stitcher.tail_margin(0, total);
        stitcher.add_segment(0, &vec![low; plan.usable_bins + tail], 0);
        let lead = stitcher.lead_margin(1);
        let tail1 = stitcher.tail_margin(1, total);
        stitcher.add_segment(1, &vec![high; lead + plan.usable_bins + tail1], lead);

        let pano = stitcher.to_dbfs();
        let boundary = plan.usable_bins;
        // Inside the overlap the value is strictly between the two levels,
        // rising monotonically toward the new segment.
        let before = pano[boundary - stitcher.margin() - 1];
        let after = pano[boundary + stitcher.margin()];
        assert!((before as f64 + 60.0).abs() < 1e-4);
        assert!((after as f64 + 20.0).abs() < 1e-4);
        let mut prev = f32::NEG_INFINITY;
        for i in (boundary - stitcher.margin())..(boundary + stitcher.margin()) {
            assert!(pano[i] >= prev - 1e-4, "not monotone at {}", i);
            assert!(pano[i] >= before - 1e-4 && pano[i] <= after + 1e-4);
            prev = pano[i];
        }
    }

    #[test]
    fn missing_segment_leaves_sentinel() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        let p = dbfs_to_linear(-30.0);
        let total = plan.total_segments();

        // Write steps 0 and 2, skip 1 and 3.
        let tail = stitcher.tail_margin(0, total);
        stitcher.add_segment(0, &vec![p; plan.usable_bins + tail], 0);
        let lead = stitcher.lead_margin(2);
        let tail2 = stitcher.tail_margin(2, total);
        stitcher.add_segment(2, &vec![p; lead + plan.usable_bins + tail2], lead);

        let pano = stitcher.to_dbfs();
        // Middle of skipped step 1 is unscanned.
        let mid1 = plan.usable_bins + plan.usable_bins / 2;
        assert_eq!(pano[mid1], SENTINEL_DBFS);
        // Step 3 never arrived; beyond step 2's tail margin it is unscanned.
        assert_eq!(
            pano[3 * plan.usable_bins + stitcher.margin() + 10],
            SENTINEL_DBFS
        );
        // Step 2's interior did land.
        let mid2 = 2 * plan.usable_bins + plan.usable_bins / 2;
        assert!((pano[mid2] as f64 + 30.0).abs() < 1e-4);
    }

    #[test]
    fn never_writes_past_reserved_extent() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        let last = plan.total_segments() - 1;
        // Hand the final segment an oversized bin vector.
        let bins = vec![1.0; plan.usable_bins + 500];
        stitcher.add_segment(last, &bins, 0);
        assert_eq!(stitcher.to_dbfs().len(), stitcher.total_bins());
    }

    #[test]
    fn reset_clears_for_next_pass() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        feed_constant(&mut stitcher, &plan, 1.0);
        stitcher.reset();
        assert!(stitcher.to_dbfs().iter().all(|&v| v == SENTINEL_DBFS));
    }

    #[test]
    fn display_downsample_bounds_output() {
        let plan = test_plan();
        let mut stitcher = PanoramaStitcher::new(&plan);
        feed_constant(&mut stitcher, &plan, dbfs_to_linear(-50.0));
        let display = stitcher.display_dbfs(1000);
        assert_eq!(display.len(), 1000);
        assert!(display.iter().all(|&v| (v as f64 + 50.0).abs() < 1e-4));
    }
}
