// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ playback: replays a recorded `.raw` file through the sample bridge.
//!
//! The playback thread stands in for the capture thread; the DSP worker sees
//! identical blocks either way. Pacing matches the recording's sample rate
//! scaled by the speed factor (0.25x..4x). The file handle and the seek
//! command share a single lock, so a seek repositions the stream atomically
//! with respect to the read loop.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use num_complex::Complex32;
use spx_core::bridge::{SampleBlock, SampleBridge};
use spx_core::recording::RecordingDescriptor;
use spx_core::session::response::{SessionError, SessionResult};
use spx_core::session::state::PlaybackStatus;
use tokio::sync::mpsc::UnboundedSender;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

const BYTES_PER_SAMPLE: u64 = 8;

#[derive(Debug)]
pub enum PlaybackEvent {
    /// End of file with looping disabled.
    Finished,
    Error(String),
}

struct PlaybackInner {
    file: File,
    position_bytes: u64,
    total_bytes: u64,
    speed: f64,
    looping: bool,
}

struct PlaybackShared {
    inner: Mutex<PlaybackInner>,
    running: AtomicBool,
    paused: AtomicBool,
}

pub struct PlaybackHandle {
    shared: Arc<PlaybackShared>,
    thread: Option<JoinHandle<()>>,
    filename: String,
    sample_rate: f64,
    chunk_size: usize,
}

impl PlaybackHandle {
    /// Open a recording and start feeding the bridge.
    pub fn start(
        storage_dir: &Path,
        descriptor: RecordingDescriptor,
        chunk_size: usize,
        bridge: Arc<SampleBridge>,
        event_tx: UnboundedSender<PlaybackEvent>,
    ) -> SessionResult<Self> {
        let raw_path = storage_dir.join(format!("{}.raw", descriptor.filename));
        let file = File::open(&raw_path).map_err(|e| {
            SessionError::not_found(format!("open {}: {}", raw_path.display(), e))
        })?;
        let total_bytes = file
            .metadata()
            .map_err(|e| SessionError::internal(format!("stat playback file: {}", e)))?
            .len();
        if descriptor.sample_rate <= 0.0 {
            return Err(SessionError::invalid_config(
                "recording has no valid sample rate",
            ));
        }

        let shared = Arc::new(PlaybackShared {
            inner: Mutex::new(PlaybackInner {
                file,
                position_bytes: 0,
                total_bytes,
                speed: 1.0,
                looping: false,
            }),
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        });

        let thread_shared = Arc::clone(&shared);
        let sample_rate = descriptor.sample_rate;
        let center_freq = descriptor.center_freq;
        let thread = std::thread::Builder::new()
            .name("spx-playback".to_string())
            .spawn(move || {
                playback_loop(
                    thread_shared,
                    bridge,
                    chunk_size,
                    sample_rate,
                    center_freq,
                    event_tx,
                );
            })
            .map_err(|e| SessionError::internal(format!("spawn playback thread: {}", e)))?;

        tracing::info!(
            "playback started: {} ({:.1} s, {:.2} MS/s)",
            descriptor.filename,
            total_bytes as f64 / BYTES_PER_SAMPLE as f64 / sample_rate,
            sample_rate / 1e6
        );

        Ok(Self {
            shared,
            thread: Some(thread),
            filename: descriptor.filename,
            sample_rate,
            chunk_size,
        })
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
        tracing::info!("playback paused");
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
        tracing::info!("playback resumed");
    }

    /// Clamp and apply the speed factor.
    pub fn set_speed(&self, speed: f64) -> f64 {
        let clamped = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.shared
            .inner
            .lock()
            .expect("playback mutex poisoned")
            .speed = clamped;
        tracing::info!("playback speed: {:.2}x", clamped);
        clamped
    }

    pub fn set_loop(&self, looping: bool) {
        self.shared
            .inner
            .lock()
            .expect("playback mutex poisoned")
            .looping = looping;
    }

    /// Seek to a position, chunk-aligned. File repositioning and the logical
    /// index update happen under the same lock the read loop holds per chunk.
    pub fn seek(&self, position_seconds: f64) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock().expect("playback mutex poisoned");
        let chunk_bytes = self.chunk_size as u64 * BYTES_PER_SAMPLE;
        let target_sample = (position_seconds.max(0.0) * self.sample_rate) as u64;
        let mut target_byte = target_sample * BYTES_PER_SAMPLE;
        target_byte = (target_byte / chunk_bytes) * chunk_bytes;
        target_byte = target_byte.min(inner.total_bytes);
        inner
            .file
            .seek(SeekFrom::Start(target_byte))
            .map_err(|e| SessionError::internal(format!("seek: {}", e)))?;
        inner.position_bytes = target_byte;
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        let inner = self.shared.inner.lock().expect("playback mutex poisoned");
        let to_secs = |bytes: u64| bytes as f64 / BYTES_PER_SAMPLE as f64 / self.sample_rate;
        PlaybackStatus {
            playing: self.shared.running.load(Ordering::Acquire),
            paused: self.shared.paused.load(Ordering::Acquire),
            filename: Some(self.filename.clone()),
            position_seconds: to_secs(inner.position_bytes),
            duration_seconds: to_secs(inner.total_bytes),
            speed: inner.speed,
            looping: inner.looping,
        }
    }

    /// Stop the playback thread and join it.
    pub fn stop(mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("playback thread panicked");
            }
        }
        tracing::info!("playback stopped");
    }
}

fn playback_loop(
    shared: Arc<PlaybackShared>,
    bridge: Arc<SampleBridge>,
    chunk_size: usize,
    sample_rate: f64,
    center_freq: f64,
    event_tx: UnboundedSender<PlaybackEvent>,
) {
    tracing::info!("playback thread started");
    let chunk_bytes = chunk_size * BYTES_PER_SAMPLE as usize;
    let mut raw = vec![0u8; chunk_bytes];
    let base_interval = Duration::from_secs_f64(chunk_size as f64 / sample_rate);

    while shared.running.load(Ordering::Acquire) {
        if shared.paused.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        // Read one chunk under the shared lock; seek commands interleave
        // between chunks, never mid-read.
        let (read, speed, looping) = {
            let mut inner = shared.inner.lock().expect("playback mutex poisoned");
            let read = match inner.file.read(&mut raw) {
                Ok(n) => n,
                Err(e) => {
                    let _ = event_tx.send(PlaybackEvent::Error(format!("read: {}", e)));
                    break;
                }
            };
            inner.position_bytes += read as u64;
            (read, inner.speed, inner.looping)
        };

        if read < chunk_bytes {
            // End of file: rewind or finish.
            if looping {
                let mut inner = shared.inner.lock().expect("playback mutex poisoned");
                if inner.file.seek(SeekFrom::Start(0)).is_err() {
                    let _ = event_tx.send(PlaybackEvent::Error("rewind failed".into()));
                    break;
                }
                inner.position_bytes = 0;
                continue;
            }
            let _ = event_tx.send(PlaybackEvent::Finished);
            break;
        }

        let samples: Vec<Complex32> = raw
            .chunks_exact(8)
            .map(|pair| {
                Complex32::new(
                    f32::from_le_bytes(pair[0..4].try_into().expect("chunk width")),
                    f32::from_le_bytes(pair[4..8].try_into().expect("chunk width")),
                )
            })
            .collect();
        bridge.push(SampleBlock {
            samples,
            center_freq,
            sample_rate,
        });

        std::thread::sleep(base_interval.div_f64(speed.max(MIN_SPEED)));
    }

    shared.running.store(false, Ordering::Release);
    tracing::info!("playback thread exited");
}
