// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ and spectrum recorders.
//!
//! Each recorder runs a dedicated writer thread fed by a bounded queue; the
//! DSP worker's `put` never blocks (overflow drops). IQ files hold raw
//! interleaved complex float32, little-endian, with no framing. Spectrum
//! files hold length-prefixed records. Every recording gets a
//! `<filename>.meta` JSON sidecar.
//!
//! The storage budget covers the whole directory: baseline usage measured at
//! start plus bytes written this session. Hitting it stops the recording
//! cleanly; the sidecar still lands.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use spx_core::bridge::SampleBlock;
use spx_core::recording::{RecordingDescriptor, RecordingKind};
use spx_core::session::response::{SessionError, SessionResult};

const WRITE_BUFFER_BYTES: usize = 512 * 1024;
const BYTES_PER_SAMPLE: u64 = 8; // complex float32

/// Device context captured when a recording starts.
#[derive(Debug, Clone)]
pub struct RecordingParams {
    pub sample_rate: f64,
    pub center_freq: f64,
    pub bandwidth: f64,
    pub gain: f64,
    pub fft_size: usize,
    pub window: String,
}

fn now_unix() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn write_sidecar(dir: &Path, descriptor: &RecordingDescriptor) {
    let path = dir.join(format!("{}.meta", descriptor.filename));
    match serde_json::to_vec_pretty(descriptor) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                tracing::error!("failed to write sidecar {}: {}", path.display(), e);
            }
        }
        Err(e) => tracing::error!("failed to encode sidecar: {}", e),
    }
}

struct BudgetGuard {
    baseline: u64,
    max_bytes: u64,
}

impl BudgetGuard {
    fn exhausted(&self, written: u64) -> bool {
        self.baseline + written >= self.max_bytes
    }
}

// ---------------------------------------------------------------------------
// IQ recorder
// ---------------------------------------------------------------------------

struct ActiveRecording<T> {
    tx: SyncSender<T>,
    thread: JoinHandle<()>,
    filename: String,
}

pub struct IqRecorder {
    storage_path: PathBuf,
    max_storage_bytes: u64,
    queue_blocks: usize,
    active: Mutex<Option<ActiveRecording<SampleBlock>>>,
    recording: Arc<AtomicBool>,
    bytes_written: Arc<AtomicU64>,
    /// Set by the writer when the storage budget stops the recording.
    exhausted: Arc<AtomicBool>,
    finished: Arc<Mutex<Option<RecordingDescriptor>>>,
}

impl IqRecorder {
    #[must_use]
    pub fn new(storage_path: PathBuf, max_storage_bytes: u64, queue_blocks: usize) -> Self {
        Self {
            storage_path,
            max_storage_bytes,
            queue_blocks: queue_blocks.max(1),
            active: Mutex::new(None),
            recording: Arc::new(AtomicBool::new(false)),
            bytes_written: Arc::new(AtomicU64::new(0)),
            exhausted: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn current_filename(&self) -> Option<String> {
        self.active
            .lock()
            .expect("iq recorder mutex poisoned")
            .as_ref()
            .map(|a| a.filename.clone())
    }

    /// Begin recording. Returns the base filename.
    pub fn start(&self, params: &RecordingParams) -> SessionResult<String> {
        let mut active = self.active.lock().expect("iq recorder mutex poisoned");
        if active.is_some() {
            return Err(SessionError::busy("IQ recording already running"));
        }
        std::fs::create_dir_all(&self.storage_path)
            .map_err(|e| SessionError::internal(format!("storage dir: {}", e)))?;

        let baseline = spx_app::storage_usage_bytes(&self.storage_path);
        if baseline >= self.max_storage_bytes {
            return Err(SessionError::storage_exhausted(format!(
                "storage budget reached: {} / {} bytes",
                baseline, self.max_storage_bytes
            )));
        }

        let start_time = now_unix();
        let filename = format!(
            "iq_{}_{:.3}MHz",
            format_timestamp(start_time),
            params.center_freq / 1e6
        );
        let raw_path = self.storage_path.join(format!("{}.raw", filename));
        let file = File::create(&raw_path)
            .map_err(|e| SessionError::internal(format!("create {}: {}", raw_path.display(), e)))?;

        let descriptor = RecordingDescriptor {
            kind: RecordingKind::Iq,
            filename: filename.clone(),
            sample_rate: params.sample_rate,
            center_freq: params.center_freq,
            bandwidth: params.bandwidth,
            gain: params.gain,
            fft_size: params.fft_size,
            window: Some(params.window.clone()),
            start_time,
            end_time: 0.0,
            total_bytes: 0,
            total_records: 0,
            duration_seconds: 0.0,
        };

        let (tx, rx) = std::sync::mpsc::sync_channel::<SampleBlock>(self.queue_blocks);
        let bytes_written = Arc::clone(&self.bytes_written);
        bytes_written.store(0, Ordering::Release);
        self.exhausted.store(false, Ordering::Release);
        self.finished.lock().expect("finished slot poisoned").take();

        let budget = BudgetGuard {
            baseline,
            max_bytes: self.max_storage_bytes,
        };
        let dir = self.storage_path.clone();
        let exhausted = Arc::clone(&self.exhausted);
        let finished = Arc::clone(&self.finished);
        let recording_flag = Arc::clone(&self.recording);

        let thread = std::thread::Builder::new()
            .name("spx-iq-recorder".to_string())
            .spawn(move || {
                iq_writer_loop(
                    file,
                    rx,
                    descriptor,
                    budget,
                    dir,
                    bytes_written,
                    exhausted,
                    finished,
                    recording_flag,
                );
            })
            .map_err(|e| SessionError::internal(format!("spawn recorder thread: {}", e)))?;

        self.recording.store(true, Ordering::Release);
        *active = Some(ActiveRecording {
            tx,
            thread,
            filename: filename.clone(),
        });
        tracing::info!(
            "IQ recording started: {} ({:.3} MHz, {:.2} MS/s)",
            filename,
            params.center_freq / 1e6,
            params.sample_rate / 1e6
        );
        Ok(filename)
    }

    /// Submit a block. Called from the DSP worker; drops when the queue is
    /// full rather than blocking.
    pub fn put(&self, block: &SampleBlock) {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        let active = self.active.lock().expect("iq recorder mutex poisoned");
        if let Some(rec) = active.as_ref() {
            match rec.tx.try_send(block.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    /// Stop and finalize. Returns the completed descriptor.
    pub fn stop(&self) -> Option<RecordingDescriptor> {
        let rec = self.active.lock().expect("iq recorder mutex poisoned").take()?;
        self.recording.store(false, Ordering::Release);
        drop(rec.tx);
        if rec.thread.join().is_err() {
            tracing::error!("IQ recorder thread panicked");
        }
        let descriptor = self
            .finished
            .lock()
            .expect("finished slot poisoned")
            .take();
        if let Some(d) = &descriptor {
            tracing::info!(
                "IQ recording stopped: {} ({} bytes, {:.1} s)",
                d.filename,
                d.total_bytes,
                d.duration_seconds
            );
        }
        descriptor
    }

    #[must_use]
    pub fn storage_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }
}

#[allow(clippy::too_many_arguments)]
fn iq_writer_loop(
    file: File,
    rx: Receiver<SampleBlock>,
    mut descriptor: RecordingDescriptor,
    budget: BudgetGuard,
    dir: PathBuf,
    bytes_written: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
    finished: Arc<Mutex<Option<RecordingDescriptor>>>,
    recording_flag: Arc<AtomicBool>,
) {
    tracing::info!("IQ recorder thread started");
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut written = 0u64;
    let mut samples = 0u64;

    loop {
        let block = match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(b) => b,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let mut ok = true;
        for s in &block.samples {
            if writer.write_all(&s.re.to_le_bytes()).is_err()
                || writer.write_all(&s.im.to_le_bytes()).is_err()
            {
                tracing::error!("IQ write error, stopping recording");
                ok = false;
                break;
            }
        }
        if !ok {
            break;
        }
        written += block.samples.len() as u64 * BYTES_PER_SAMPLE;
        samples += block.samples.len() as u64;
        bytes_written.store(written, Ordering::Release);

        if budget.exhausted(written) {
            tracing::warn!("storage budget reached, stopping IQ recording");
            exhausted.store(true, Ordering::Release);
            recording_flag.store(false, Ordering::Release);
            break;
        }
    }

    if let Err(e) = writer.flush() {
        tracing::error!("IQ recorder flush failed: {}", e);
    }
    descriptor.end_time = now_unix();
    descriptor.total_bytes = written;
    descriptor.total_records = samples;
    descriptor.duration_seconds = if descriptor.sample_rate > 0.0 {
        samples as f64 / descriptor.sample_rate
    } else {
        0.0
    };
    write_sidecar(&dir, &descriptor);
    *finished.lock().expect("finished slot poisoned") = Some(descriptor);
    tracing::info!("IQ recorder thread exited ({} bytes)", written);
}

// ---------------------------------------------------------------------------
// Spectrum recorder
// ---------------------------------------------------------------------------

/// One spectrum frame queued for recording.
#[derive(Debug, Clone)]
pub struct SpectrumRecord {
    pub timestamp: f64,
    pub center_freq: f64,
    pub sample_rate: f64,
    pub bins: Vec<f32>,
}

pub struct SpectrumRecorder {
    storage_path: PathBuf,
    max_storage_bytes: u64,
    queue_frames: usize,
    active: Mutex<Option<ActiveRecording<SpectrumRecord>>>,
    recording: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
    finished: Arc<Mutex<Option<RecordingDescriptor>>>,
}

impl SpectrumRecorder {
    #[must_use]
    pub fn new(storage_path: PathBuf, max_storage_bytes: u64, queue_frames: usize) -> Self {
        Self {
            storage_path,
            max_storage_bytes,
            queue_frames: queue_frames.max(1),
            active: Mutex::new(None),
            recording: Arc::new(AtomicBool::new(false)),
            frames_written: Arc::new(AtomicU64::new(0)),
            exhausted: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn current_filename(&self) -> Option<String> {
        self.active
            .lock()
            .expect("spectrum recorder mutex poisoned")
            .as_ref()
            .map(|a| a.filename.clone())
    }

    pub fn start(&self, params: &RecordingParams) -> SessionResult<String> {
        let mut active = self.active.lock().expect("spectrum recorder mutex poisoned");
        if active.is_some() {
            return Err(SessionError::busy("spectrum recording already running"));
        }
        std::fs::create_dir_all(&self.storage_path)
            .map_err(|e| SessionError::internal(format!("storage dir: {}", e)))?;

        let baseline = spx_app::storage_usage_bytes(&self.storage_path);
        if baseline >= self.max_storage_bytes {
            return Err(SessionError::storage_exhausted(format!(
                "storage budget reached: {} / {} bytes",
                baseline, self.max_storage_bytes
            )));
        }

        let start_time = now_unix();
        let filename = format!(
            "spec_{}_{:.3}MHz",
            format_timestamp(start_time),
            params.center_freq / 1e6
        );
        let path = self.storage_path.join(format!("{}.spec", filename));
        let file = File::create(&path)
            .map_err(|e| SessionError::internal(format!("create {}: {}", path.display(), e)))?;

        let descriptor = RecordingDescriptor {
            kind: RecordingKind::Spectrum,
            filename: filename.clone(),
            sample_rate: params.sample_rate,
            center_freq: params.center_freq,
            bandwidth: params.bandwidth,
            gain: params.gain,
            fft_size: params.fft_size,
            window: Some(params.window.clone()),
            start_time,
            end_time: 0.0,
            total_bytes: 0,
            total_records: 0,
            duration_seconds: 0.0,
        };

        let (tx, rx) = std::sync::mpsc::sync_channel::<SpectrumRecord>(self.queue_frames);
        let frames_written = Arc::clone(&self.frames_written);
        frames_written.store(0, Ordering::Release);
        self.exhausted.store(false, Ordering::Release);
        self.finished.lock().expect("finished slot poisoned").take();

        let budget = BudgetGuard {
            baseline,
            max_bytes: self.max_storage_bytes,
        };
        let dir = self.storage_path.clone();
        let exhausted = Arc::clone(&self.exhausted);
        let finished = Arc::clone(&self.finished);
        let recording_flag = Arc::clone(&self.recording);

        let thread = std::thread::Builder::new()
            .name("spx-spectrum-recorder".to_string())
            .spawn(move || {
                spectrum_writer_loop(
                    file,
                    rx,
                    descriptor,
                    budget,
                    dir,
                    frames_written,
                    exhausted,
                    finished,
                    recording_flag,
                );
            })
            .map_err(|e| SessionError::internal(format!("spawn recorder thread: {}", e)))?;

        self.recording.store(true, Ordering::Release);
        *active = Some(ActiveRecording {
            tx,
            thread,
            filename: filename.clone(),
        });
        tracing::info!("spectrum recording started: {}", filename);
        Ok(filename)
    }

    pub fn put(&self, record: SpectrumRecord) {
        if !self.recording.load(Ordering::Acquire) {
            return;
        }
        let active = self.active.lock().expect("spectrum recorder mutex poisoned");
        if let Some(rec) = active.as_ref() {
            let _ = rec.tx.try_send(record);
        }
    }

    pub fn stop(&self) -> Option<RecordingDescriptor> {
        let rec = self
            .active
            .lock()
            .expect("spectrum recorder mutex poisoned")
            .take()?;
        self.recording.store(false, Ordering::Release);
        drop(rec.tx);
        if rec.thread.join().is_err() {
            tracing::error!("spectrum recorder thread panicked");
        }
        let descriptor = self
            .finished
            .lock()
            .expect("finished slot poisoned")
            .take();
        if let Some(d) = &descriptor {
            tracing::info!(
                "spectrum recording stopped: {} ({} frames)",
                d.filename,
                d.total_records
            );
        }
        descriptor
    }
}

#[allow(clippy::too_many_arguments)]
fn spectrum_writer_loop(
    file: File,
    rx: Receiver<SpectrumRecord>,
    mut descriptor: RecordingDescriptor,
    budget: BudgetGuard,
    dir: PathBuf,
    frames_written: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
    finished: Arc<Mutex<Option<RecordingDescriptor>>>,
    recording_flag: Arc<AtomicBool>,
) {
    tracing::info!("spectrum recorder thread started");
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut written_bytes = 0u64;
    let mut frames = 0u64;
    let mut first_ts = 0.0f64;
    let mut last_ts = 0.0f64;

    loop {
        let record = match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(r) => r,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if frames == 0 {
            first_ts = record.timestamp;
        }
        last_ts = record.timestamp;

        // Record: [u32 length][u32 num_bins][f64 ts][f64 cf][f64 sr][bins f32]
        // where length counts the bytes that follow it.
        let body_len = 4 + 8 + 8 + 8 + record.bins.len() * 4;
        let mut ok = writer.write_all(&(body_len as u32).to_be_bytes()).is_ok()
            && writer
                .write_all(&(record.bins.len() as u32).to_be_bytes())
                .is_ok()
            && writer.write_all(&record.timestamp.to_be_bytes()).is_ok()
            && writer.write_all(&record.center_freq.to_be_bytes()).is_ok()
            && writer.write_all(&record.sample_rate.to_be_bytes()).is_ok();
        if ok {
            for &b in &record.bins {
                if writer.write_all(&b.to_be_bytes()).is_err() {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            tracing::error!("spectrum write error, stopping recording");
            break;
        }

        written_bytes += 4 + body_len as u64;
        frames += 1;
        frames_written.store(frames, Ordering::Release);

        if budget.exhausted(written_bytes) {
            tracing::warn!("storage budget reached, stopping spectrum recording");
            exhausted.store(true, Ordering::Release);
            recording_flag.store(false, Ordering::Release);
            break;
        }
    }

    if let Err(e) = writer.flush() {
        tracing::error!("spectrum recorder flush failed: {}", e);
    }
    descriptor.end_time = now_unix();
    descriptor.total_bytes = written_bytes;
    descriptor.total_records = frames;
    descriptor.duration_seconds = (last_ts - first_ts).max(0.0);
    write_sidecar(&dir, &descriptor);
    *finished.lock().expect("finished slot poisoned") = Some(descriptor);
    tracing::info!("spectrum recorder thread exited ({} frames)", frames);
}

// ---------------------------------------------------------------------------
// Recording management
// ---------------------------------------------------------------------------

/// List recordings by scanning sidecars in the storage directory.
#[must_use]
pub fn list_recordings(dir: &Path) -> Vec<RecordingDescriptor> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("meta") {
            continue;
        }
        match std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<RecordingDescriptor>(&s).ok())
        {
            Some(desc) => out.push(desc),
            None => tracing::warn!("unreadable recording sidecar: {}", path.display()),
        }
    }
    out.sort_by(|a, b| {
        a.start_time
            .partial_cmp(&b.start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

/// Delete a recording's data file and sidecar. `base` must already be
/// sanitized to a terminal path component.
pub fn delete_recording(dir: &Path, base: &str) -> SessionResult<()> {
    let mut removed = false;
    for ext in ["raw", "spec", "meta"] {
        let path = dir.join(format!("{}.{}", base, ext));
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| SessionError::internal(format!("delete {}: {}", path.display(), e)))?;
            removed = true;
        }
    }
    if removed {
        Ok(())
    } else {
        Err(SessionError::not_found(format!("no such recording: {}", base)))
    }
}

fn format_timestamp(unix: f64) -> String {
    // YYYYMMDD_HHMMSS from a Unix timestamp, UTC, without a date crate.
    let secs = unix as i64;
    let days = secs.div_euclid(86_400);
    let tod = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        year,
        month,
        day,
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60
    )
}

/// Days-since-epoch to (year, month, day), Howard Hinnant's civil algorithm.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    fn params() -> RecordingParams {
        RecordingParams {
            sample_rate: 2e6,
            center_freq: 100e6,
            bandwidth: 2e6,
            gain: 40.0,
            fft_size: 2048,
            window: "blackman_harris".to_string(),
        }
    }

    fn block(n: usize, seed: f32) -> SampleBlock {
        SampleBlock {
            samples: (0..n)
                .map(|i| Complex32::new(seed + i as f32, -(seed + i as f32)))
                .collect(),
            center_freq: 100e6,
            sample_rate: 2e6,
        }
    }

    #[test]
    fn iq_recording_writes_le_samples_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let rec = IqRecorder::new(dir.path().to_path_buf(), u64::MAX, 16);
        let name = rec.start(&params()).unwrap();
        assert!(rec.is_recording());

        rec.put(&block(64, 1.0));
        rec.put(&block(64, 100.0));
        std::thread::sleep(Duration::from_millis(100));
        let desc = rec.stop().expect("descriptor");

        assert_eq!(desc.total_records, 128);
        assert_eq!(desc.total_bytes, 128 * 8);
        assert!(!rec.is_recording());

        let raw = std::fs::read(dir.path().join(format!("{}.raw", name))).unwrap();
        assert_eq!(raw.len(), 128 * 8);
        // First sample is (1.0, -1.0) little-endian.
        assert_eq!(&raw[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&raw[4..8], &(-1.0f32).to_le_bytes());

        let sidecar = std::fs::read_to_string(dir.path().join(format!("{}.meta", name))).unwrap();
        let parsed: RecordingDescriptor = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(parsed.kind, RecordingKind::Iq);
        assert_eq!(parsed.total_records, 128);
    }

    #[test]
    fn iq_budget_counts_existing_usage() {
        let dir = tempfile::tempdir().unwrap();
        // Pre-existing 1 KB file; budget of 1 KB is already exhausted.
        std::fs::write(dir.path().join("old.raw"), vec![0u8; 1024]).unwrap();
        let rec = IqRecorder::new(dir.path().to_path_buf(), 1024, 16);
        match rec.start(&params()) {
            Err(e) => assert_eq!(
                e.kind,
                spx_core::session::response::ErrorKind::StorageExhausted
            ),
            Ok(_) => panic!("expected storage exhausted"),
        }
    }

    #[test]
    fn iq_budget_stops_mid_recording() {
        let dir = tempfile::tempdir().unwrap();
        // Budget allows roughly one 64-sample block.
        let rec = IqRecorder::new(dir.path().to_path_buf(), 600, 16);
        rec.start(&params()).unwrap();
        for i in 0..10 {
            rec.put(&block(64, i as f32));
        }
        std::thread::sleep(Duration::from_millis(200));
        assert!(rec.storage_exhausted());
        let desc = rec.stop().expect("descriptor");
        // It stopped cleanly after crossing the budget, sidecar written.
        assert!(desc.total_bytes >= 512);
        assert!(dir
            .path()
            .join(format!("{}.meta", desc.filename))
            .exists());
    }

    #[test]
    fn double_start_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let rec = IqRecorder::new(dir.path().to_path_buf(), u64::MAX, 16);
        rec.start(&params()).unwrap();
        assert!(rec.start(&params()).is_err());
        rec.stop();
    }

    #[test]
    fn spectrum_records_are_framed() {
        let dir = tempfile::tempdir().unwrap();
        let rec = SpectrumRecorder::new(dir.path().to_path_buf(), u64::MAX, 16);
        let name = rec.start(&params()).unwrap();
        rec.put(SpectrumRecord {
            timestamp: 123.5,
            center_freq: 100e6,
            sample_rate: 2e6,
            bins: vec![-80.0, -75.0, -90.25],
        });
        std::thread::sleep(Duration::from_millis(100));
        let desc = rec.stop().expect("descriptor");
        assert_eq!(desc.total_records, 1);

        let data = std::fs::read(dir.path().join(format!("{}.spec", name))).unwrap();
        let body_len = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
        assert_eq!(body_len, 4 + 24 + 3 * 4);
        assert_eq!(data.len(), 4 + body_len);
        let num_bins = u32::from_be_bytes(data[4..8].try_into().unwrap());
        assert_eq!(num_bins, 3);
        let ts = f64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(ts, 123.5);
        let first_bin = f32::from_be_bytes(data[32..36].try_into().unwrap());
        assert_eq!(first_bin, -80.0);
    }

    #[test]
    fn list_and_delete_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let rec = IqRecorder::new(dir.path().to_path_buf(), u64::MAX, 16);
        let name = rec.start(&params()).unwrap();
        rec.put(&block(16, 0.0));
        std::thread::sleep(Duration::from_millis(50));
        rec.stop();

        let list = list_recordings(dir.path());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].filename, name);

        delete_recording(dir.path(), &name).unwrap();
        assert!(list_recordings(dir.path()).is_empty());
        assert!(delete_recording(dir.path(), &name).is_err());
    }

    #[test]
    fn timestamp_format() {
        // 2025-01-01 00:00:00 UTC
        assert_eq!(format_timestamp(1_735_689_600.0), "20250101_000000");
        // 2004-02-29 12:34:56 UTC (leap day)
        assert_eq!(format_timestamp(1_078_058_096.0), "20040229_123456");
    }
}
