// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Capture thread: pulls samples from a [`SampleSource`] and pushes
//! FFT-sized blocks into the sample bridge.
//!
//! The thread owns the device handle exclusively. Tuning changes arrive
//! through a command mailbox drained at the top of each read cycle; the
//! coordinator never touches the source directly. The single exit path
//! releases the source before the thread ends, so a join guarantees the
//! handle is gone.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use num_complex::Complex32;
use spx_core::bridge::{SampleBlock, SampleBridge};
use tokio::sync::mpsc::UnboundedSender;

use crate::{SampleSource, SourceError};

/// Commands posted to the capture thread's mailbox.
#[derive(Debug, Clone)]
pub enum SourceCommand {
    SetCenterFreq(f64),
    SetSampleRate(f64),
    SetBandwidth(f64),
    SetGain(f64),
    /// Swap the bridge the producer pushes into (sweep install/restore).
    BindBridge(Arc<SampleBridge>),
    Stop,
}

/// Events the capture thread reports back to the coordinator.
#[derive(Debug)]
pub enum ProducerEvent {
    /// The source failed irrecoverably; the thread has exited.
    Failed(SourceError),
    /// The thread exited through its normal stop path.
    Stopped,
}

/// Handle owned by the coordinator.
pub struct ProducerHandle {
    cmd_tx: mpsc::Sender<SourceCommand>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    pub fn send(&self, cmd: SourceCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// Clone of the mailbox sender, for components that retune directly
    /// (the sweep engine).
    #[must_use]
    pub fn command_sender(&self) -> mpsc::Sender<SourceCommand> {
        self.cmd_tx.clone()
    }

    /// Signal the thread and join it. Returns true when the join completed.
    pub fn stop(mut self) -> bool {
        let _ = self.cmd_tx.send(SourceCommand::Stop);
        match self.thread.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        }
    }
}

/// How many consecutive read errors end the capture thread.
const MAX_READ_ERROR_STREAK: u32 = 8;

/// Spawn the capture thread.
///
/// `block_size` is the samples-per-block contract with the DSP worker
/// (one FFT frame per block). The block buffer is allocated once; the
/// per-read cost never grows with uptime.
pub fn start_producer(
    mut source: Box<dyn SampleSource>,
    bridge: Arc<SampleBridge>,
    block_size: usize,
    center_freq: f64,
    sample_rate: f64,
    event_tx: UnboundedSender<ProducerEvent>,
) -> ProducerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<SourceCommand>();

    let thread = std::thread::Builder::new()
        .name("spx-capture".to_string())
        .spawn(move || {
            capture_loop(
                source.as_mut(),
                bridge,
                block_size,
                center_freq,
                sample_rate,
                &cmd_rx,
                &event_tx,
            );
            // Dropping `source` here releases the device handle before the
            // thread becomes joinable.
            drop(source);
        })
        .expect("failed to spawn spx-capture thread");

    ProducerHandle {
        cmd_tx,
        thread: Some(thread),
    }
}

#[allow(clippy::too_many_arguments)]
fn capture_loop(
    source: &mut dyn SampleSource,
    mut bridge: Arc<SampleBridge>,
    block_size: usize,
    mut center_freq: f64,
    mut sample_rate: f64,
    cmd_rx: &mpsc::Receiver<SourceCommand>,
    event_tx: &UnboundedSender<ProducerEvent>,
) {
    tracing::info!(
        "capture thread started ({} samples/block, {:.3} MS/s)",
        block_size,
        sample_rate / 1e6
    );

    let mut block = vec![Complex32::new(0.0, 0.0); block_size];
    let mut filled = 0usize;
    let throttle = !source.is_blocking();
    let mut error_streak: u32 = 0;

    'outer: loop {
        // Drain the mailbox before each read cycle.
        loop {
            match cmd_rx.try_recv() {
                Ok(SourceCommand::Stop) => {
                    tracing::info!("capture thread stopping");
                    let _ = event_tx.send(ProducerEvent::Stopped);
                    break 'outer;
                }
                Ok(SourceCommand::SetCenterFreq(hz)) => {
                    if let Err(e) = source.set_center_freq(hz) {
                        tracing::warn!("retune to {:.0} Hz failed: {}", hz, e);
                    } else {
                        center_freq = hz;
                        filled = 0;
                    }
                }
                Ok(SourceCommand::SetSampleRate(hz)) => {
                    if let Err(e) = source.set_sample_rate(hz) {
                        tracing::warn!("sample rate change to {:.0} failed: {}", hz, e);
                    } else {
                        sample_rate = hz;
                        filled = 0;
                    }
                }
                Ok(SourceCommand::SetBandwidth(hz)) => {
                    if let Err(e) = source.set_bandwidth(hz) {
                        tracing::warn!("bandwidth change to {:.0} failed: {}", hz, e);
                    }
                }
                Ok(SourceCommand::SetGain(db)) => {
                    if let Err(e) = source.set_gain(db) {
                        tracing::warn!("gain change to {:.1} dB failed: {}", db, e);
                    }
                }
                Ok(SourceCommand::BindBridge(new_bridge)) => {
                    bridge = new_bridge;
                    filled = 0;
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    let _ = event_tx.send(ProducerEvent::Stopped);
                    break 'outer;
                }
            }
        }

        match source.read_into(&mut block[filled..]) {
            Ok(0) => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(n) => {
                error_streak = 0;
                filled += n;
                if filled >= block_size {
                    bridge.push(SampleBlock {
                        samples: block.clone(),
                        center_freq,
                        sample_rate,
                    });
                    filled = 0;
                    if throttle && sample_rate > 0.0 {
                        let block_nanos =
                            (block_size as f64 / sample_rate * 1e9).round() as u64;
                        std::thread::sleep(Duration::from_nanos(block_nanos));
                    }
                }
            }
            Err(e) => {
                error_streak += 1;
                tracing::warn!("source read error (streak {}): {}", error_streak, e);
                if error_streak >= MAX_READ_ERROR_STREAK {
                    tracing::error!("capture thread giving up: {}", e);
                    let _ = event_tx.send(ProducerEvent::Failed(e));
                    break;
                }
                std::thread::sleep(Duration::from_millis(
                    (10u64 << error_streak.min(4)).min(250),
                ));
            }
        }
    }

    tracing::info!("capture thread exited");
}
