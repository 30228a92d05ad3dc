// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! DSP worker thread.
//!
//! Reads sample blocks from the bridge with a short timeout, runs them
//! through the spectrum pipeline, and pushes finalized frames toward the
//! coordinator over a small bounded queue. The push is `try_send`, so the
//! worker never waits on the async side; overflow drops the frame and counts
//! it. Detector passes and recorder taps also happen here, on the worker,
//! never on the coordinator loop.
//!
//! The pipeline lives behind a mutex shared with the coordinator, which makes
//! parameter changes atomic with respect to frame processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use spx_core::bridge::{BridgeItem, SampleBridge};
use spx_core::detect::{SignalDetector, SignalEvent};
use spx_core::dsp::pipeline::{SpectrumData, SpectrumPipeline};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Sender, UnboundedSender};

use crate::recorder::{IqRecorder, SpectrumRecord, SpectrumRecorder};

/// Commands posted to the worker's mailbox.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Stop consuming and acknowledge; pipeline state is reset.
    Pause,
    Resume,
    Stop,
}

/// Events the worker reports to the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    Paused,
    Resumed,
    Stopped,
    Signals(Vec<SignalEvent>),
}

/// One finalized live frame with the tuning in force at capture.
#[derive(Debug, Clone)]
pub struct LiveFrame {
    pub data: SpectrumData,
    pub center_freq: f64,
    pub sample_rate: f64,
    pub timestamp: f64,
}

pub struct DspWorkerHandle {
    thread: Option<JoinHandle<()>>,
}

impl DspWorkerHandle {
    /// Join the worker; call after `Stop` was sent and the bridge poisoned.
    pub fn join(mut self) -> bool {
        match self.thread.take() {
            Some(t) => t.join().is_ok(),
            None => true,
        }
    }
}

pub struct DspWorkerContext {
    pub bridge: Arc<SampleBridge>,
    pub pipeline: Arc<Mutex<SpectrumPipeline>>,
    pub detector: Arc<Mutex<SignalDetector>>,
    pub detector_enabled: Arc<AtomicBool>,
    pub iq_recorder: Arc<IqRecorder>,
    pub spectrum_recorder: Arc<SpectrumRecorder>,
    pub frame_tx: Sender<LiveFrame>,
    pub event_tx: UnboundedSender<WorkerEvent>,
    pub cmd_rx: Receiver<WorkerCommand>,
    pub target_fps: f64,
}

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const STATS_EVERY_FRAMES: u64 = 600;

pub fn start_dsp_worker(ctx: DspWorkerContext) -> DspWorkerHandle {
    let thread = std::thread::Builder::new()
        .name("spx-dsp".to_string())
        .spawn(move || worker_loop(ctx))
        .expect("failed to spawn spx-dsp thread");
    DspWorkerHandle {
        thread: Some(thread),
    }
}

fn worker_loop(ctx: DspWorkerContext) {
    tracing::info!("DSP worker started");
    let min_emit_interval = if ctx.target_fps > 0.0 {
        Duration::from_secs_f64(1.0 / ctx.target_fps)
    } else {
        Duration::ZERO
    };

    // Wall-clock base plus a monotonic offset keeps frame timestamps
    // non-decreasing even if the system clock steps.
    let wall_base = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let mono_base = Instant::now();

    let mut paused = false;
    let mut last_emit: Option<Instant> = None;
    let mut frames_emitted: u64 = 0;
    let mut frames_dropped: u64 = 0;

    'outer: loop {
        // Drain the command mailbox.
        loop {
            let cmd = if paused {
                // While paused, block on the mailbox so Stop stays prompt.
                match ctx.cmd_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => {
                        break 'outer;
                    }
                }
            } else {
                ctx.cmd_rx.try_recv().ok()
            };
            match cmd {
                Some(WorkerCommand::Pause) => {
                    paused = true;
                    ctx.pipeline.lock().expect("pipeline mutex poisoned").reset();
                    let _ = ctx.event_tx.send(WorkerEvent::Paused);
                }
                Some(WorkerCommand::Resume) => {
                    paused = false;
                    let _ = ctx.event_tx.send(WorkerEvent::Resumed);
                }
                Some(WorkerCommand::Stop) => {
                    let _ = ctx.event_tx.send(WorkerEvent::Stopped);
                    break 'outer;
                }
                None => break,
            }
        }

        if paused {
            continue;
        }

        let block = match ctx.bridge.pop_timeout(READ_TIMEOUT) {
            BridgeItem::Block(b) => b,
            BridgeItem::Poison => {
                tracing::info!("DSP worker: poison received, exiting");
                let _ = ctx.event_tx.send(WorkerEvent::Stopped);
                break;
            }
            BridgeItem::TimedOut => continue,
        };

        // Tap raw IQ for the recorder before any processing.
        ctx.iq_recorder.put(&block);

        let outputs: Vec<SpectrumData> = ctx
            .pipeline
            .lock()
            .expect("pipeline mutex poisoned")
            .process_block(&block.samples);

        for data in outputs {
            let timestamp = wall_base + mono_base.elapsed().as_secs_f64();

            ctx.spectrum_recorder.put(SpectrumRecord {
                timestamp,
                center_freq: block.center_freq,
                sample_rate: block.sample_rate,
                bins: data.bins.clone(),
            });

            if ctx.detector_enabled.load(Ordering::Acquire) {
                let events = ctx
                    .detector
                    .lock()
                    .expect("detector mutex poisoned")
                    .process(
                        &data.bins,
                        data.noise_floor,
                        block.center_freq,
                        block.sample_rate,
                        timestamp,
                    );
                if !events.is_empty() {
                    let _ = ctx.event_tx.send(WorkerEvent::Signals(events));
                }
            }

            // Frame-rate ceiling on emission; averaging and peak hold have
            // already advanced, only the send is skipped.
            if let Some(last) = last_emit {
                if last.elapsed() < min_emit_interval {
                    continue;
                }
            }
            last_emit = Some(Instant::now());

            let frame = LiveFrame {
                data,
                center_freq: block.center_freq,
                sample_rate: block.sample_rate,
                timestamp,
            };
            match ctx.frame_tx.try_send(frame) {
                Ok(()) => {
                    frames_emitted += 1;
                    if frames_emitted % STATS_EVERY_FRAMES == 0 {
                        tracing::info!(
                            "DSP stats: {} frames emitted, {} dropped, bridge {}/{} blocks dropped",
                            frames_emitted,
                            frames_dropped,
                            ctx.bridge.len(),
                            ctx.bridge.dropped(),
                        );
                    }
                }
                Err(TrySendError::Full(_)) => {
                    frames_dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::info!("DSP worker: frame channel closed, exiting");
                    break 'outer;
                }
            }
        }
    }

    tracing::info!("DSP worker exited ({} frames)", frames_emitted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use spx_core::bridge::SampleBlock;
    use spx_core::detect::DetectorConfig;
    use spx_core::dsp::config::{AveragingMode, DspConfig, Overlap, WindowKind};
    use std::sync::mpsc;

    fn context(
        bridge: Arc<SampleBridge>,
        frame_tx: Sender<LiveFrame>,
        event_tx: UnboundedSender<WorkerEvent>,
        cmd_rx: Receiver<WorkerCommand>,
    ) -> DspWorkerContext {
        let cfg = DspConfig {
            fft_size: 256,
            window: WindowKind::Rectangular,
            overlap: Overlap::None,
            averaging: AveragingMode::None,
            dc_removal: false,
            peak_hold: false,
            peak_hold_decay_db: 0.0,
            output_bins: 256,
        };
        let dir = std::env::temp_dir().join("spx-dsp-task-tests");
        DspWorkerContext {
            bridge,
            pipeline: Arc::new(Mutex::new(SpectrumPipeline::new(cfg).unwrap())),
            detector: Arc::new(Mutex::new(SignalDetector::new(DetectorConfig::default()))),
            detector_enabled: Arc::new(AtomicBool::new(false)),
            iq_recorder: Arc::new(IqRecorder::new(dir.clone(), u64::MAX, 4)),
            spectrum_recorder: Arc::new(SpectrumRecorder::new(dir, u64::MAX, 4)),
            frame_tx,
            event_tx,
            cmd_rx,
            // Unthrottled so tests see every frame.
            target_fps: 0.0,
        }
    }

    fn tone_block(n: usize) -> SampleBlock {
        let samples = (0..n)
            .map(|i| {
                let phase = std::f64::consts::TAU * 16.0 * i as f64 / n as f64;
                num_complex::Complex32::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();
        SampleBlock {
            samples,
            center_freq: 100e6,
            sample_rate: 2e6,
        }
    }

    #[tokio::test]
    async fn emits_frames_and_exits_on_poison() {
        let bridge = Arc::new(SampleBridge::new(16));
        let (frame_tx, mut frame_rx) = tokio::sync::mpsc::channel(8);
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let (_cmd_tx, cmd_rx) = mpsc::channel();

        let handle = start_dsp_worker(context(
            Arc::clone(&bridge),
            frame_tx,
            event_tx,
            cmd_rx,
        ));

        bridge.push(tone_block(256));
        let frame = tokio::time::timeout(Duration::from_secs(2), frame_rx.recv())
            .await
            .expect("timed out")
            .expect("frame");
        assert_eq!(frame.data.bins.len(), 256);
        assert_eq!(frame.center_freq, 100e6);
        assert_eq!(frame.data.peak_bin, 128 + 16);

        let poisoned_at = Instant::now();
        bridge.push_poison();
        // Worker exits promptly without waiting out its read timeout budget.
        let stopped = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match event_rx.recv().await {
                    Some(WorkerEvent::Stopped) => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(stopped);
        assert!(handle.join());
        assert!(poisoned_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn pause_acks_and_suppresses_frames() {
        let bridge = Arc::new(SampleBridge::new(16));
        let (frame_tx, mut frame_rx) = tokio::sync::mpsc::channel(8);
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let handle = start_dsp_worker(context(
            Arc::clone(&bridge),
            frame_tx,
            event_tx,
            cmd_rx,
        ));

        cmd_tx.send(WorkerCommand::Pause).unwrap();
        let acked = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match event_rx.recv().await {
                    Some(WorkerEvent::Paused) => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(acked);

        // Blocks pushed while paused produce no frames.
        bridge.push(tone_block(256));
        assert!(
            tokio::time::timeout(Duration::from_millis(300), frame_rx.recv())
                .await
                .is_err(),
            "frame emitted while paused"
        );

        cmd_tx.send(WorkerCommand::Resume).unwrap();
        cmd_tx.send(WorkerCommand::Stop).unwrap();
        assert!(handle.join());
    }

    #[tokio::test]
    async fn timestamps_are_monotonic() {
        let bridge = Arc::new(SampleBridge::new(64));
        let (frame_tx, mut frame_rx) = tokio::sync::mpsc::channel(64);
        let (event_tx, _event_rx) = tokio::sync::mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let handle = start_dsp_worker(context(
            Arc::clone(&bridge),
            frame_tx,
            event_tx,
            cmd_rx,
        ));

        for _ in 0..10 {
            bridge.push(tone_block(256));
        }
        let mut last_ts = f64::NEG_INFINITY;
        for _ in 0..10 {
            let frame = tokio::time::timeout(Duration::from_secs(2), frame_rx.recv())
                .await
                .expect("timed out")
                .expect("frame");
            assert!(frame.timestamp >= last_ts);
            assert!(frame.data.bins.iter().all(|b| b.is_finite()));
            last_ts = frame.timestamp;
        }
        cmd_tx.send(WorkerCommand::Stop).unwrap();
        bridge.push_poison();
        assert!(handle.join());
    }
}
