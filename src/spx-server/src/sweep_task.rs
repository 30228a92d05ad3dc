// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sweep engine thread.
//!
//! Steps through the plan: retune, discard settling blocks, capture and
//! average in linear power, emit the segment, feed the stitcher. After the
//! last step the stitched panorama goes out with the pass duration. Survey
//! mode runs one pass; band-monitor repeats until stopped.
//!
//! The coordinator owns all mode bookkeeping: installing the sweep bridge
//! before this thread starts and restoring the original binding afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender as StdSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use spx_backend::runner::SourceCommand;
use spx_core::bridge::{BridgeItem, SampleBridge};
use spx_core::dsp::config::{AveragingMode, DspConfig, Overlap, WindowKind};
use spx_core::dsp::pipeline::SpectrumPipeline;
use spx_core::dsp::{dbfs_to_linear, linear_to_dbfs};
use spx_core::sweep::plan::{SweepMode, SweepPlan};
use spx_core::sweep::stitcher::PanoramaStitcher;
use spx_protocol::wire::{
    encode_sweep_panorama, encode_sweep_segment, PanoramaMeta, SegmentMeta, FLAG_SWEEP_COMPLETE,
    FLAG_SWEEP_IN_PROGRESS,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::broadcast::Outbound;

/// Events the sweep thread reports to the coordinator.
#[derive(Debug)]
pub enum SweepEvent {
    Progress {
        sweep_id: u32,
        step: usize,
        total: usize,
    },
    PassCompleted {
        sweep_id: u32,
        duration_ms: f64,
    },
    /// The thread is exiting; the coordinator restores live mode.
    Finished {
        last_sweep_id: u32,
        sweeps_completed: u64,
        aborted: bool,
    },
}

pub struct SweepTask {
    pub plan: SweepPlan,
    pub mode: SweepMode,
    pub averages: usize,
    pub settle_blocks: usize,
    pub display_bins: usize,
    pub first_sweep_id: u32,
}

pub struct SweepHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SweepHandle {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn join(mut self) -> bool {
        match self.thread.take() {
            Some(t) => t.join().is_ok(),
            None => true,
        }
    }
}

const SETTLE_READ_TIMEOUT: Duration = Duration::from_millis(500);
const CAPTURE_READ_TIMEOUT: Duration = Duration::from_secs(2);

pub fn start_sweep(
    task: SweepTask,
    bridge: Arc<SampleBridge>,
    producer: StdSender<SourceCommand>,
    outbound: UnboundedSender<Outbound>,
    event_tx: UnboundedSender<SweepEvent>,
) -> SweepHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let thread = std::thread::Builder::new()
        .name("spx-sweep".to_string())
        .spawn(move || sweep_loop(task, bridge, producer, outbound, event_tx, thread_stop))
        .expect("failed to spawn spx-sweep thread");
    SweepHandle {
        stop,
        thread: Some(thread),
    }
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn sweep_loop(
    task: SweepTask,
    bridge: Arc<SampleBridge>,
    producer: StdSender<SourceCommand>,
    outbound: UnboundedSender<Outbound>,
    event_tx: UnboundedSender<SweepEvent>,
    stop: Arc<AtomicBool>,
) {
    let plan = &task.plan;
    tracing::info!(
        "sweep thread started: {:.3}-{:.3} MHz, {} steps, {} averages/step",
        plan.freq_start / 1e6,
        plan.freq_end / 1e6,
        plan.total_segments(),
        task.averages
    );

    // Independent per-step FFTs: no overlap, no pipeline-side averaging (the
    // step average below runs in linear power), full resolution out.
    let dsp_config = DspConfig {
        fft_size: plan.fft_size,
        window: WindowKind::BlackmanHarris,
        overlap: Overlap::None,
        averaging: AveragingMode::None,
        dc_removal: true,
        peak_hold: false,
        peak_hold_decay_db: 0.0,
        output_bins: plan.fft_size,
    };
    let mut dsp = match SpectrumPipeline::new(dsp_config) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("sweep DSP config rejected: {}", e);
            let _ = event_tx.send(SweepEvent::Finished {
                last_sweep_id: task.first_sweep_id,
                sweeps_completed: 0,
                aborted: true,
            });
            return;
        }
    };

    let mut stitcher = PanoramaStitcher::new(plan);
    let total = plan.total_segments();
    let mut sweep_id = task.first_sweep_id;
    let mut sweeps_completed: u64 = 0;
    let mut aborted = false;

    'pass: loop {
        stitcher.reset();
        let pass_start = Instant::now();

        for step in &plan.steps {
            if stop.load(Ordering::Acquire) {
                aborted = true;
                break 'pass;
            }
            let _ = event_tx.send(SweepEvent::Progress {
                sweep_id,
                step: step.index,
                total,
            });

            let _ = producer.send(SourceCommand::SetCenterFreq(step.center_freq));

            // Discard blocks captured while the PLL settles.
            for _ in 0..task.settle_blocks {
                match bridge.pop_timeout(SETTLE_READ_TIMEOUT) {
                    BridgeItem::Block(_) | BridgeItem::TimedOut => {}
                    BridgeItem::Poison => {
                        aborted = true;
                        break 'pass;
                    }
                }
            }

            // Capture and average in linear power. Blocks captured before the
            // retune landed carry the old center tag and are skipped without
            // consuming a capture slot.
            let mut accum: Vec<f64> = Vec::new();
            let mut valid = 0usize;
            let mut attempts = 0usize;
            let max_attempts = task.averages * 16 + 8;
            while valid < task.averages && attempts < max_attempts {
                attempts += 1;
                if stop.load(Ordering::Acquire) {
                    aborted = true;
                    break 'pass;
                }
                let block = match bridge.pop_timeout(CAPTURE_READ_TIMEOUT) {
                    BridgeItem::Block(b) => b,
                    BridgeItem::TimedOut => {
                        tracing::warn!("sweep: bridge timeout at step {}", step.index);
                        continue;
                    }
                    BridgeItem::Poison => {
                        aborted = true;
                        break 'pass;
                    }
                };
                if (block.center_freq - step.center_freq).abs() > 1.0 {
                    continue;
                }
                for frame in dsp.process_block(&block.samples) {
                    if accum.is_empty() {
                        accum = vec![0.0; frame.bins.len()];
                    }
                    for (acc, &db) in accum.iter_mut().zip(&frame.bins) {
                        *acc += dbfs_to_linear(db as f64);
                    }
                    valid += 1;
                }
            }
            dsp.reset();
            if valid == 0 {
                tracing::warn!("sweep: no valid captures at step {}", step.index);
                continue;
            }
            let inv = 1.0 / valid as f64;
            let averaged: Vec<f64> = accum.iter().map(|&p| p * inv).collect();

            // Stitch with crossfade margins from the guard band.
            let lead = stitcher.lead_margin(step.index);
            let tail = stitcher.tail_margin(step.index, total);
            let lo = plan.trim_bins - lead;
            let hi = plan.trim_bins + plan.usable_bins + tail;
            stitcher.add_segment(step.index, &averaged[lo..hi], lead);

            // Emit the usable window as a segment.
            let usable =
                &averaged[plan.trim_bins..plan.trim_bins + plan.usable_bins];
            let bins: Vec<f32> = usable
                .iter()
                .map(|&p| linear_to_dbfs(p) as f32)
                .collect();
            let meta = SegmentMeta {
                sweep_id,
                segment_idx: step.index as u16,
                total_segments: total as u16,
                freq_lo: step.freq_lo,
                freq_hi: step.freq_hi,
                sweep_start: plan.freq_start,
                sweep_end: plan.freq_end,
            };
            let _ = outbound.send(Outbound::Sweep(encode_sweep_segment(
                &meta,
                &bins,
                FLAG_SWEEP_IN_PROGRESS,
            )));
        }

        let duration_ms = pass_start.elapsed().as_secs_f64() * 1000.0;
        sweeps_completed += 1;

        let pano_bins = stitcher.display_dbfs(task.display_bins);
        let pano_meta = PanoramaMeta {
            sweep_id,
            sweep_mode: task.mode.wire_id(),
            freq_start: plan.freq_start,
            freq_end: plan.freq_end,
            sweep_time_ms: duration_ms as f32,
            timestamp: now_unix(),
        };
        let _ = outbound.send(Outbound::Sweep(encode_sweep_panorama(
            &pano_meta,
            &pano_bins,
            FLAG_SWEEP_COMPLETE,
        )));
        let _ = event_tx.send(SweepEvent::PassCompleted {
            sweep_id,
            duration_ms,
        });
        tracing::info!(
            "sweep #{} complete: {} steps in {:.0} ms",
            sweep_id,
            total,
            duration_ms
        );

        if !task.mode.is_continuous() || stop.load(Ordering::Acquire) {
            break;
        }
        sweep_id += 1;
    }

    let _ = event_tx.send(SweepEvent::Finished {
        last_sweep_id: sweep_id,
        sweeps_completed,
        aborted,
    });
    tracing::info!(
        "sweep thread exited ({} passes, aborted={})",
        sweeps_completed,
        aborted
    );
}
