// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Session coordinator.
//!
//! Single-task event loop owning the authoritative session state. Serializes
//! mode transitions under an async mode lock, routes commands to the capture
//! thread, DSP worker, sweep engine, recorders, and playback, and publishes
//! status snapshots on every change. All user-visible error text originates
//! here.
//!
//! Worker threads never suspend cooperatively and never touch session state;
//! they report through event channels consumed by this loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::sync::{mpsc, watch};

use spx_backend::runner::{start_producer, ProducerEvent, ProducerHandle, SourceCommand};
use spx_backend::{SourceConfig, SourceRegistry};
use spx_core::bridge::SampleBridge;
use spx_core::detect::{SignalDetector, SignalEvent};
use spx_core::dsp::config::{AveragingMode, DspConfig, Overlap, WindowKind};
use spx_core::dsp::pipeline::SpectrumPipeline;
use spx_core::dsp::SoftAgc;
use spx_core::radio::freq::Freq;
use spx_core::session::command::{AgcUpdate, DspUpdate, SessionCommand, SweepParams};
use spx_core::session::request::{SessionReply, SessionRequest};
use spx_core::session::response::{SessionError, SessionResult};
use spx_core::session::state::{
    DeviceParams, DeviceProbe, SessionMode, SessionState, StatusSnapshot,
};
use spx_core::sweep::plan::SweepPlan;
use spx_protocol::types::ServerMessage;
use spx_protocol::wire::{encode_spectrum, SpectrumMeta};

use crate::broadcast::{ClientRegistry, Outbound};
use crate::config::ServerConfig;
use crate::dsp_task::{
    start_dsp_worker, DspWorkerContext, DspWorkerHandle, LiveFrame, WorkerCommand, WorkerEvent,
};
use crate::playback::{PlaybackEvent, PlaybackHandle};
use crate::recorder::{
    delete_recording, list_recordings, IqRecorder, RecordingParams, SpectrumRecorder,
};
use crate::sweep_task::{start_sweep, SweepEvent, SweepHandle, SweepTask};

const ACK_TIMEOUT: Duration = Duration::from_secs(2);

struct Session {
    cfg: ServerConfig,
    registry: SourceRegistry,
    state: SessionState,
    mode_lock: Arc<tokio::sync::Mutex<()>>,

    pipeline: Arc<StdMutex<SpectrumPipeline>>,
    detector: Arc<StdMutex<SignalDetector>>,
    detector_enabled: Arc<AtomicBool>,
    agc: SoftAgc,
    iq_recorder: Arc<IqRecorder>,
    spectrum_recorder: Arc<SpectrumRecorder>,

    producer: Option<ProducerHandle>,
    source_info: Option<String>,
    live_bridge: Option<Arc<SampleBridge>>,
    worker: Option<DspWorkerHandle>,
    worker_cmd: Option<std::sync::mpsc::Sender<WorkerCommand>>,

    sweep: Option<SweepHandle>,
    sweep_bridge: Option<Arc<SampleBridge>>,
    saved_sample_rate: Option<f64>,

    playback: Option<PlaybackHandle>,

    next_sweep_id: u32,

    // Sender sides cloned into spawned components.
    frame_tx: Sender<LiveFrame>,
    worker_event_tx: UnboundedSender<WorkerEvent>,
    producer_event_tx: UnboundedSender<ProducerEvent>,
    sweep_event_tx: UnboundedSender<SweepEvent>,
    playback_event_tx: UnboundedSender<PlaybackEvent>,

    status_tx: watch::Sender<StatusSnapshot>,
    outbound_tx: UnboundedSender<Outbound>,
    clients: Arc<ClientRegistry>,
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Build the initial DSP config from the config file sections.
fn dsp_config_from(cfg: &ServerConfig) -> SessionResult<DspConfig> {
    let window = WindowKind::parse(&cfg.dsp.window)
        .ok_or_else(|| SessionError::invalid_config(format!("unknown window: {}", cfg.dsp.window)))?;
    let averaging = match cfg.dsp.averaging_mode.as_str() {
        "none" => AveragingMode::None,
        "linear" => AveragingMode::Linear {
            count: cfg.dsp.averaging_count,
        },
        "exponential" => AveragingMode::Exponential {
            alpha: cfg.dsp.averaging_alpha,
        },
        other => {
            return Err(SessionError::invalid_config(format!(
                "unknown averaging mode: {}",
                other
            )))
        }
    };
    let config = DspConfig {
        fft_size: cfg.dsp.fft_size,
        window,
        overlap: if cfg.dsp.overlap == 0.5 {
            Overlap::Half
        } else {
            Overlap::None
        },
        averaging,
        dc_removal: cfg.dsp.dc_removal,
        peak_hold: false,
        peak_hold_decay_db: 0.0,
        output_bins: cfg.dsp.output_bins,
    };
    config
        .validate()
        .map_err(|e| SessionError::invalid_config(e.to_string()))?;
    Ok(config)
}

/// Run the session coordinator until shutdown.
pub async fn run_session(
    cfg: ServerConfig,
    registry: SourceRegistry,
    mut request_rx: Receiver<SessionRequest>,
    status_tx: watch::Sender<StatusSnapshot>,
    outbound_tx: UnboundedSender<Outbound>,
    clients: Arc<ClientRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> SessionResult<()> {
    let dsp = dsp_config_from(&cfg)?;
    let pipeline = SpectrumPipeline::new(dsp.clone())
        .map_err(|e| SessionError::invalid_config(e.to_string()))?;

    let detector_cfg = spx_core::detect::DetectorConfig {
        threshold_db: cfg.detection.threshold_db,
        min_width_bins: cfg.detection.min_width_bins,
        merge_gap_bins: cfg.detection.merge_gap_bins,
        smooth_bins: cfg.detection.smooth_bins,
        miss_count: cfg.detection.miss_count,
        freq_tol_min_hz: cfg.detection.freq_tol_min_hz,
        max_tracked: cfg.detection.max_tracked,
    };

    let (frame_tx, mut frame_rx) = mpsc::channel::<LiveFrame>(cfg.stream.frame_queue.max(1));
    let (worker_event_tx, mut worker_event_rx) = mpsc::unbounded_channel::<WorkerEvent>();
    let (producer_event_tx, mut producer_event_rx) = mpsc::unbounded_channel::<ProducerEvent>();
    let (sweep_event_tx, mut sweep_event_rx) = mpsc::unbounded_channel::<SweepEvent>();
    let (playback_event_tx, mut playback_event_rx) = mpsc::unbounded_channel::<PlaybackEvent>();

    let device = DeviceParams {
        center_freq: cfg.device.center_freq_hz,
        sample_rate: cfg.device.sample_rate,
        bandwidth: cfg.device.bandwidth_hz,
        gain: cfg.device.gain_db,
    };
    let mut state = SessionState::new(device, dsp);
    state.detector.threshold_db = cfg.detection.threshold_db;

    let mut session = Session {
        agc: SoftAgc::new(cfg.device.min_gain_db, cfg.device.max_gain_db),
        iq_recorder: Arc::new(IqRecorder::new(
            cfg.recording.storage_path.clone(),
            cfg.recording.max_storage_bytes,
            cfg.recording.queue_blocks,
        )),
        spectrum_recorder: Arc::new(SpectrumRecorder::new(
            cfg.recording.storage_path.clone(),
            cfg.recording.max_storage_bytes,
            cfg.recording.queue_blocks,
        )),
        cfg,
        registry,
        state,
        mode_lock: Arc::new(tokio::sync::Mutex::new(())),
        pipeline: Arc::new(StdMutex::new(pipeline)),
        detector: Arc::new(StdMutex::new(SignalDetector::new(detector_cfg))),
        detector_enabled: Arc::new(AtomicBool::new(false)),
        producer: None,
        source_info: None,
        live_bridge: None,
        worker: None,
        worker_cmd: None,
        sweep: None,
        sweep_bridge: None,
        saved_sample_rate: None,
        playback: None,
        next_sweep_id: 0,
        frame_tx,
        worker_event_tx,
        producer_event_tx,
        sweep_event_tx,
        playback_event_tx,
        status_tx,
        outbound_tx,
        clients,
    };
    session.publish();

    loop {
        tokio::select! {
            maybe_req = request_rx.recv() => {
                match maybe_req {
                    Some(req) => session.handle_request(req, &mut worker_event_rx).await,
                    None => break,
                }
            }
            Some(frame) = frame_rx.recv() => {
                session.handle_frame(frame);
            }
            Some(ev) = worker_event_rx.recv() => {
                session.handle_worker_event(ev);
            }
            Some(ev) = producer_event_rx.recv() => {
                session.handle_producer_event(ev).await;
            }
            Some(ev) = sweep_event_rx.recv() => {
                session.handle_sweep_event(ev, &mut worker_event_rx).await;
            }
            Some(ev) = playback_event_rx.recv() => {
                session.handle_playback_event(ev).await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("session coordinator shutting down");
                    session.shutdown(&mut worker_event_rx).await;
                    break;
                }
            }
        }
    }
    Ok(())
}

impl Session {
    // -- status plumbing ----------------------------------------------------

    fn refresh_derived_state(&mut self) {
        self.state.clients = self.clients.count();
        if let Some(bridge) = &self.live_bridge {
            self.state.dropped_blocks = bridge.dropped();
        }
        self.state.recorder.iq_recording = self.iq_recorder.is_recording();
        self.state.recorder.iq_filename = self.iq_recorder.current_filename();
        self.state.recorder.iq_bytes_written = self.iq_recorder.bytes_written();
        self.state.recorder.spectrum_recording = self.spectrum_recorder.is_recording();
        self.state.recorder.spectrum_filename = self.spectrum_recorder.current_filename();
        self.state.recorder.spectrum_frames_written = self.spectrum_recorder.frames_written();
        self.state.playback = self
            .playback
            .as_ref()
            .map(|p| p.status())
            .unwrap_or_default();
        let detector = self.detector.lock().expect("detector mutex poisoned");
        self.state.detector.tracked_signals = detector.tracked_count();
        self.state.detector.total_detections = detector.total_detections();
        self.state.detector.threshold_db = detector.config().threshold_db;
        self.state.detector.detection_enabled = self.detector_enabled.load(Ordering::Acquire);
    }

    fn publish(&mut self) {
        self.refresh_derived_state();
        let snapshot = self.state.snapshot();
        let _ = self.status_tx.send_replace(snapshot.clone());
        let _ = self.outbound_tx.send(Outbound::Text(
            ServerMessage::Status {
                data: Box::new(snapshot),
            }
            .to_text(),
        ));
    }

    fn forward_signals(&mut self, events: Vec<SignalEvent>) {
        for event in events {
            let _ = self.outbound_tx.send(Outbound::Text(
                ServerMessage::SignalEvent { data: event }.to_text(),
            ));
        }
    }

    fn recording_params(&self) -> RecordingParams {
        RecordingParams {
            sample_rate: self.state.device.sample_rate,
            center_freq: self.state.device.center_freq,
            bandwidth: self.state.device.bandwidth,
            gain: self.state.device.gain,
            fft_size: self.state.dsp.fft_size,
            window: self.state.dsp.window.name().to_string(),
        }
    }

    // -- worker pause/resume handshakes -------------------------------------

    async fn await_worker_ack(
        &mut self,
        events: &mut UnboundedReceiver<WorkerEvent>,
        want_paused: bool,
    ) -> bool {
        let deadline = Instant::now() + ACK_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match tokio::time::timeout(remaining, events.recv()).await {
                Ok(Some(WorkerEvent::Paused)) if want_paused => return true,
                Ok(Some(WorkerEvent::Resumed)) if !want_paused => return true,
                Ok(Some(WorkerEvent::Signals(evts))) => self.forward_signals(evts),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return false,
            }
        }
    }

    async fn pause_worker(&mut self, events: &mut UnboundedReceiver<WorkerEvent>) -> bool {
        let Some(cmd) = self.worker_cmd.as_ref() else {
            return true;
        };
        if cmd.send(WorkerCommand::Pause).is_err() {
            return false;
        }
        self.await_worker_ack(events, true).await
    }

    async fn resume_worker(&mut self, events: &mut UnboundedReceiver<WorkerEvent>) -> bool {
        let Some(cmd) = self.worker_cmd.as_ref() else {
            return true;
        };
        if cmd.send(WorkerCommand::Resume).is_err() {
            return false;
        }
        self.await_worker_ack(events, false).await
    }

    // -- pipeline lifecycle --------------------------------------------------

    fn spawn_worker(&mut self, bridge: Arc<SampleBridge>) {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        let handle = start_dsp_worker(DspWorkerContext {
            bridge,
            pipeline: Arc::clone(&self.pipeline),
            detector: Arc::clone(&self.detector),
            detector_enabled: Arc::clone(&self.detector_enabled),
            iq_recorder: Arc::clone(&self.iq_recorder),
            spectrum_recorder: Arc::clone(&self.spectrum_recorder),
            frame_tx: self.frame_tx.clone(),
            event_tx: self.worker_event_tx.clone(),
            cmd_rx,
            target_fps: self.cfg.stream.target_fps,
        });
        self.worker = Some(handle);
        self.worker_cmd = Some(cmd_tx);
    }

    fn make_bridge(&self, sample_rate: f64) -> Arc<SampleBridge> {
        Arc::new(SampleBridge::new(SampleBridge::capacity_for(
            sample_rate,
            self.state.dsp.fft_size,
            self.cfg.stream.bridge_ms,
        )))
    }

    fn start_live(&mut self) -> SessionResult<()> {
        if self.state.mode != SessionMode::Idle {
            return Err(SessionError::busy(format!(
                "cannot start streaming in {:?} mode",
                self.state.mode
            )));
        }

        let source_config = SourceConfig {
            center_freq: self.state.device.center_freq,
            sample_rate: self.state.device.sample_rate,
            bandwidth: self.state.device.bandwidth,
            gain: self.state.device.gain,
        };
        let source = self
            .registry
            .build(&self.cfg.device.source, &self.cfg.device.args, &source_config)
            .map_err(|e| {
                self.state.device_connected = false;
                self.state.device_error = Some(e.to_string());
                SessionError::device_unavailable(e.to_string())
            })?;
        self.source_info = Some(source.describe());

        let bridge = self.make_bridge(self.state.device.sample_rate);
        self.live_bridge = Some(Arc::clone(&bridge));
        self.pipeline
            .lock()
            .expect("pipeline mutex poisoned")
            .reset();

        self.spawn_worker(Arc::clone(&bridge));
        self.producer = Some(start_producer(
            source,
            bridge,
            self.state.dsp.fft_size,
            self.state.device.center_freq,
            self.state.device.sample_rate,
            self.producer_event_tx.clone(),
        ));

        self.state.device_connected = true;
        self.state.device_error = None;
        self.state.mode = SessionMode::Live;
        tracing::info!(
            "streaming pipeline started ({} @ {:.2} MS/s)",
            Freq::new(self.state.device.center_freq),
            self.state.device.sample_rate / 1e6
        );
        Ok(())
    }

    /// Tear down producer, worker, and bridges. Shutdown flags first, then
    /// the poison marker, then join producer, then join the DSP worker.
    async fn stop_pipeline(&mut self) {
        if let Some(cmd) = self.worker_cmd.take() {
            let _ = cmd.send(WorkerCommand::Stop);
        }
        if let Some(bridge) = &self.live_bridge {
            bridge.push_poison();
        }
        if let Some(bridge) = &self.sweep_bridge {
            bridge.push_poison();
        }
        if let Some(producer) = self.producer.take() {
            let joined = tokio::task::spawn_blocking(move || producer.stop())
                .await
                .unwrap_or(false);
            if !joined {
                tracing::error!("capture thread did not join cleanly");
            }
        }
        if let Some(worker) = self.worker.take() {
            let joined = tokio::task::spawn_blocking(move || worker.join())
                .await
                .unwrap_or(false);
            if !joined {
                tracing::error!("DSP worker did not join cleanly");
            }
        }
        if let Some(bridge) = self.live_bridge.take() {
            self.state.dropped_blocks = bridge.dropped();
            bridge.clear();
        }
        self.sweep_bridge = None;
        self.source_info = None;
        tracing::info!("streaming pipeline stopped");
    }

    async fn stop_all(&mut self, events: &mut UnboundedReceiver<WorkerEvent>) {
        let lock = Arc::clone(&self.mode_lock);
        let _guard = lock.lock().await;

        if self.sweep.is_some() {
            self.finish_sweep(events, true).await;
        }
        if let Some(playback) = self.playback.take() {
            let _ = tokio::task::spawn_blocking(move || playback.stop()).await;
        }
        self.stop_pipeline().await;
        self.state.mode = SessionMode::Idle;
        self.state.sweep.sweep_running = false;
    }

    // -- sweep lifecycle -----------------------------------------------------

    async fn start_sweep_locked(
        &mut self,
        params: SweepParams,
        events: &mut UnboundedReceiver<WorkerEvent>,
    ) -> SessionResult<()> {
        let lock = Arc::clone(&self.mode_lock);
        let _guard = lock.lock().await;

        if self.sweep.is_some() {
            return Err(SessionError::busy("sweep already running"));
        }
        if self.state.mode == SessionMode::Playback {
            return Err(SessionError::busy("cannot sweep during playback"));
        }
        self.validate_freq(params.freq_start)?;
        self.validate_freq(params.freq_end)?;
        self.validate_sample_rate(params.sample_rate)?;

        let plan = SweepPlan::new(
            params.freq_start,
            params.freq_end,
            params.sample_rate,
            self.cfg.sweep.usable_fraction,
            self.state.dsp.fft_size,
        )?;

        if self.state.mode == SessionMode::Idle {
            self.start_live()?;
        }

        // Pause the live DSP path and wait for the acknowledgement before
        // touching the bridge binding.
        if !self.pause_worker(events).await {
            return Err(SessionError::internal("DSP worker did not acknowledge pause"));
        }

        self.saved_sample_rate = Some(self.state.device.sample_rate);
        let sweep_bridge = self.make_bridge(params.sample_rate);
        self.sweep_bridge = Some(Arc::clone(&sweep_bridge));

        let producer = self.producer.as_ref().expect("producer running");
        producer.send(SourceCommand::BindBridge(Arc::clone(&sweep_bridge)));
        if (params.sample_rate - self.state.device.sample_rate).abs() > f64::EPSILON {
            producer.send(SourceCommand::SetSampleRate(params.sample_rate));
            self.state.device.sample_rate = params.sample_rate;
        }

        self.next_sweep_id += 1;
        let total = plan.total_segments();
        let handle = start_sweep(
            SweepTask {
                plan,
                mode: params.mode,
                averages: params.averages,
                settle_blocks: self.cfg.sweep.settle_blocks,
                display_bins: self.cfg.sweep.display_bins,
                first_sweep_id: self.next_sweep_id,
            },
            sweep_bridge,
            producer.command_sender(),
            self.outbound_tx.clone(),
            self.sweep_event_tx.clone(),
        );
        self.sweep = Some(handle);

        self.state.mode = SessionMode::SweepRunning;
        self.state.sweep.sweep_running = true;
        self.state.sweep.sweep_mode = Some(params.mode);
        self.state.sweep.sweep_id = self.next_sweep_id;
        self.state.sweep.sweep_step = 0;
        self.state.sweep.sweep_total_steps = total;
        self.state.sweep.sweep_progress = 0.0;
        tracing::info!(
            "sweep started: {} - {}, {} steps",
            Freq::new(params.freq_start),
            Freq::new(params.freq_end),
            total
        );
        Ok(())
    }

    /// Join the sweep thread and restore the live binding. Runs on every
    /// exit path: stop command, natural completion, and full shutdown.
    async fn finish_sweep(&mut self, events: &mut UnboundedReceiver<WorkerEvent>, resume: bool) {
        let Some(handle) = self.sweep.take() else {
            return;
        };
        handle.request_stop();
        if let Some(bridge) = &self.sweep_bridge {
            bridge.push_poison();
        }
        let joined = tokio::task::spawn_blocking(move || handle.join())
            .await
            .unwrap_or(false);
        if !joined {
            tracing::error!("sweep thread did not join cleanly");
        }
        self.sweep_bridge = None;

        if let Some(producer) = self.producer.as_ref() {
            if let Some(rate) = self.saved_sample_rate.take() {
                if (rate - self.state.device.sample_rate).abs() > f64::EPSILON {
                    producer.send(SourceCommand::SetSampleRate(rate));
                    self.state.device.sample_rate = rate;
                }
            }
            if let Some(bridge) = &self.live_bridge {
                producer.send(SourceCommand::BindBridge(Arc::clone(bridge)));
            }
        }
        self.saved_sample_rate = None;

        if resume {
            self.pipeline
                .lock()
                .expect("pipeline mutex poisoned")
                .reset();
            if !self.resume_worker(events).await {
                tracing::warn!("DSP worker did not acknowledge resume");
            }
            self.state.mode = SessionMode::Live;
        }
        self.state.sweep.sweep_running = false;
        tracing::info!("sweep stopped, live mode restored");
    }

    async fn handle_sweep_event(
        &mut self,
        event: SweepEvent,
        worker_events: &mut UnboundedReceiver<WorkerEvent>,
    ) {
        match event {
            SweepEvent::Progress {
                sweep_id,
                step,
                total,
            } => {
                self.state.sweep.sweep_id = sweep_id;
                self.state.sweep.sweep_step = step;
                self.state.sweep.sweep_total_steps = total;
                self.state.sweep.sweep_progress = if total > 0 {
                    step as f64 / total as f64
                } else {
                    0.0
                };
                self.publish();
            }
            SweepEvent::PassCompleted {
                sweep_id,
                duration_ms,
            } => {
                self.state.sweep.sweep_id = sweep_id;
                self.state.sweep.sweep_last_duration_ms = duration_ms;
                self.state.sweep.sweeps_completed += 1;
                self.publish();
            }
            SweepEvent::Finished {
                last_sweep_id,
                sweeps_completed: _,
                aborted: _,
            } => {
                self.next_sweep_id = self.next_sweep_id.max(last_sweep_id);
                if self.sweep.is_some() {
                    // Natural completion: the coordinator restores the
                    // original binding, not the sweep engine.
                    let lock = Arc::clone(&self.mode_lock);
                    let _guard = lock.lock().await;
                    self.finish_sweep(worker_events, true).await;
                }
                self.publish();
            }
        }
    }

    // -- playback lifecycle --------------------------------------------------

    fn start_playback(&mut self, filename: &str) -> SessionResult<()> {
        if self.state.mode != SessionMode::Idle {
            return Err(SessionError::busy(format!(
                "cannot start playback in {:?} mode",
                self.state.mode
            )));
        }
        let base = spx_app::sanitize_filename(filename)
            .ok_or_else(|| SessionError::invalid_config("empty recording name"))?;
        let base = strip_recording_extension(&base);

        let meta_path = self
            .cfg
            .recording
            .storage_path
            .join(format!("{}.meta", base));
        let descriptor: spx_core::recording::RecordingDescriptor =
            std::fs::read_to_string(&meta_path)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .ok_or_else(|| SessionError::not_found(format!("no such recording: {}", base)))?;

        let bridge = self.make_bridge(descriptor.sample_rate);
        self.live_bridge = Some(Arc::clone(&bridge));
        self.pipeline
            .lock()
            .expect("pipeline mutex poisoned")
            .reset();
        self.spawn_worker(Arc::clone(&bridge));

        self.state.device.center_freq = descriptor.center_freq;
        self.state.device.sample_rate = descriptor.sample_rate;

        let handle = PlaybackHandle::start(
            &self.cfg.recording.storage_path,
            descriptor,
            self.state.dsp.fft_size,
            bridge,
            self.playback_event_tx.clone(),
        )?;
        self.playback = Some(handle);
        self.state.mode = SessionMode::Playback;
        Ok(())
    }

    async fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            let _ = tokio::task::spawn_blocking(move || playback.stop()).await;
        }
        self.stop_pipeline().await;
        self.state.mode = SessionMode::Idle;
    }

    async fn handle_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Finished => {
                tracing::info!("playback reached end of file");
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.stop_playback().await;
                self.publish();
            }
            PlaybackEvent::Error(msg) => {
                tracing::error!("playback failed: {}", msg);
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.stop_playback().await;
                self.state.device_error = Some(msg);
                self.publish();
            }
        }
    }

    // -- live frame path -----------------------------------------------------

    fn handle_frame(&mut self, frame: LiveFrame) {
        self.state.frames_emitted += 1;

        if self.agc.enabled() {
            if let Some(new_gain) = self.agc.update(
                frame.data.peak_power as f64,
                self.state.device.gain,
                Instant::now(),
            ) {
                if let Some(producer) = self.producer.as_ref() {
                    producer.send(SourceCommand::SetGain(new_gain));
                }
                self.state.device.gain = new_gain;
                self.publish();
            }
        }

        let meta = SpectrumMeta {
            center_freq: frame.center_freq,
            sample_rate: frame.sample_rate,
            bandwidth: self.state.device.bandwidth,
            gain: self.state.device.gain as f32,
            fft_size: self.state.dsp.fft_size as u32,
            noise_floor: frame.data.noise_floor,
            peak_power: frame.data.peak_power,
            peak_freq_offset: frame.data.peak_freq_offset,
            timestamp: frame.timestamp,
        };
        let encoded = encode_spectrum(
            &meta,
            &frame.data.bins,
            frame.data.peak_hold.as_deref(),
            0,
        );
        let _ = self.outbound_tx.send(Outbound::Live(encoded));
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Signals(events) => self.forward_signals(events),
            // Pause/resume acks arriving here were answers to handshakes
            // that already timed out; stale Stopped events are harmless.
            WorkerEvent::Paused | WorkerEvent::Resumed | WorkerEvent::Stopped => {}
        }
    }

    async fn handle_producer_event(&mut self, event: ProducerEvent) {
        match event {
            ProducerEvent::Failed(err) => {
                tracing::error!("device failed: {}", err);
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.state.device_connected = false;
                self.state.device_error = Some(err.to_string());
                self.stop_pipeline().await;
                self.state.mode = SessionMode::Idle;
                self.publish();
            }
            ProducerEvent::Stopped => {}
        }
    }

    // -- validation ----------------------------------------------------------

    fn validate_freq(&self, hz: f64) -> SessionResult<()> {
        if !hz.is_finite()
            || hz < self.cfg.device.min_freq_hz
            || hz > self.cfg.device.max_freq_hz
        {
            return Err(SessionError::invalid_config(format!(
                "frequency {} outside {}..{}",
                Freq::new(hz),
                Freq::new(self.cfg.device.min_freq_hz),
                Freq::new(self.cfg.device.max_freq_hz)
            )));
        }
        Ok(())
    }

    fn validate_gain(&self, db: f64) -> SessionResult<()> {
        if !db.is_finite() || db < self.cfg.device.min_gain_db || db > self.cfg.device.max_gain_db
        {
            return Err(SessionError::invalid_config(format!(
                "gain {} dB outside {}..{} dB",
                db, self.cfg.device.min_gain_db, self.cfg.device.max_gain_db
            )));
        }
        Ok(())
    }

    fn validate_sample_rate(&self, hz: f64) -> SessionResult<()> {
        if !hz.is_finite()
            || hz < self.cfg.device.min_sample_rate
            || hz > self.cfg.device.max_sample_rate
        {
            return Err(SessionError::invalid_config(format!(
                "sample rate {} outside {}..{}",
                hz, self.cfg.device.min_sample_rate, self.cfg.device.max_sample_rate
            )));
        }
        Ok(())
    }

    // -- command dispatch ----------------------------------------------------

    async fn handle_request(
        &mut self,
        request: SessionRequest,
        worker_events: &mut UnboundedReceiver<WorkerEvent>,
    ) {
        let SessionRequest { cmd, respond_to } = request;
        let result = self.dispatch(cmd, worker_events).await;
        match &result {
            // Rejected commands leave state unchanged; everything else (and
            // device failures discovered on the way) re-publishes.
            Err(e) if e.kind == spx_core::session::response::ErrorKind::DeviceUnavailable => {
                self.publish()
            }
            Err(_) => {}
            Ok(_) => self.publish(),
        }
        let _ = respond_to.send(result);
    }

    async fn dispatch(
        &mut self,
        cmd: SessionCommand,
        worker_events: &mut UnboundedReceiver<WorkerEvent>,
    ) -> SessionResult<SessionReply> {
        match cmd {
            SessionCommand::Start => {
                self.start_live()?;
                self.reply_status()
            }
            SessionCommand::Stop => {
                self.stop_all(worker_events).await;
                self.reply_status()
            }
            SessionCommand::SetFrequency(hz) => {
                if self.state.mode == SessionMode::SweepRunning {
                    return Err(SessionError::busy("sweep owns tuning while running"));
                }
                self.validate_freq(hz)?;
                self.state.device.center_freq = hz;
                if let Some(producer) = self.producer.as_ref() {
                    producer.send(SourceCommand::SetCenterFreq(hz));
                }
                self.reply_status()
            }
            SessionCommand::SetGain(db) => {
                self.validate_gain(db)?;
                self.state.device.gain = db;
                if let Some(producer) = self.producer.as_ref() {
                    producer.send(SourceCommand::SetGain(db));
                }
                self.reply_status()
            }
            SessionCommand::SetBandwidth(hz) => {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(SessionError::invalid_config(format!(
                        "bandwidth {} must be positive",
                        hz
                    )));
                }
                self.state.device.bandwidth = hz;
                if let Some(producer) = self.producer.as_ref() {
                    producer.send(SourceCommand::SetBandwidth(hz));
                }
                self.reply_status()
            }
            SessionCommand::SetSampleRate(hz) => {
                if matches!(
                    self.state.mode,
                    SessionMode::SweepRunning | SessionMode::Playback
                ) {
                    return Err(SessionError::busy(format!(
                        "cannot change sample rate in {:?} mode",
                        self.state.mode
                    )));
                }
                self.validate_sample_rate(hz)?;
                self.state.device.sample_rate = hz;
                if let Some(producer) = self.producer.as_ref() {
                    producer.send(SourceCommand::SetSampleRate(hz));
                }
                self.reply_status()
            }
            SessionCommand::SetFftSize(size) => {
                if self.state.mode != SessionMode::Idle {
                    return Err(SessionError::busy(
                        "stop streaming before changing FFT size",
                    ));
                }
                let mut dsp = self.state.dsp.clone();
                dsp.fft_size = size;
                dsp.output_bins = dsp.output_bins.min(size);
                dsp.validate()
                    .map_err(|e| SessionError::invalid_config(e.to_string()))?;
                let rebuilt = SpectrumPipeline::new(dsp.clone())
                    .map_err(|e| SessionError::invalid_config(e.to_string()))?;
                *self.pipeline.lock().expect("pipeline mutex poisoned") = rebuilt;
                self.state.dsp = dsp;
                self.reply_status()
            }
            SessionCommand::SetDsp(update) => {
                self.apply_dsp_update(update)?;
                self.reply_status()
            }
            SessionCommand::SetAgc(update) => {
                self.apply_agc_update(update);
                self.reply_status()
            }
            SessionCommand::SweepStart(params) => {
                self.start_sweep_locked(params, worker_events).await?;
                self.reply_status()
            }
            SessionCommand::SweepStop => {
                if self.sweep.is_none() {
                    return Err(SessionError::busy("no sweep running"));
                }
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.finish_sweep(worker_events, true).await;
                self.reply_status()
            }
            SessionCommand::DetectionEnable(enabled) => {
                self.detector_enabled.store(enabled, Ordering::Release);
                if !enabled {
                    let events = self
                        .detector
                        .lock()
                        .expect("detector mutex poisoned")
                        .clear(now_unix());
                    self.forward_signals(events);
                }
                tracing::info!(
                    "signal detection {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.reply_status()
            }
            SessionCommand::DetectionSetThreshold(db) => {
                if !db.is_finite() || db <= 0.0 {
                    return Err(SessionError::invalid_config(format!(
                        "detection threshold {} must be positive",
                        db
                    )));
                }
                self.detector
                    .lock()
                    .expect("detector mutex poisoned")
                    .config_mut()
                    .threshold_db = db;
                self.reply_status()
            }
            SessionCommand::RecIqStart => {
                let params = self.recording_params();
                self.iq_recorder.start(&params)?;
                self.reply_status()
            }
            SessionCommand::RecIqStop => {
                self.iq_recorder.stop();
                self.reply_status()
            }
            SessionCommand::RecSpectrumStart => {
                let params = self.recording_params();
                self.spectrum_recorder.start(&params)?;
                self.reply_status()
            }
            SessionCommand::RecSpectrumStop => {
                self.spectrum_recorder.stop();
                self.reply_status()
            }
            SessionCommand::RecList => Ok(SessionReply::Recordings(list_recordings(
                &self.cfg.recording.storage_path,
            ))),
            SessionCommand::RecDelete { filename } => {
                let base = spx_app::sanitize_filename(&filename)
                    .ok_or_else(|| SessionError::invalid_config("empty recording name"))?;
                let base = strip_recording_extension(&base);
                delete_recording(&self.cfg.recording.storage_path, base)?;
                Ok(SessionReply::Recordings(list_recordings(
                    &self.cfg.recording.storage_path,
                )))
            }
            SessionCommand::PlaybackStart { filename } => {
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.start_playback(&filename)?;
                self.reply_status()
            }
            SessionCommand::PlaybackPause => {
                self.playback_ref()?.pause();
                self.reply_status()
            }
            SessionCommand::PlaybackResume => {
                self.playback_ref()?.resume();
                self.reply_status()
            }
            SessionCommand::PlaybackStop => {
                if self.playback.is_none() {
                    return Err(SessionError::busy("no playback active"));
                }
                let lock = Arc::clone(&self.mode_lock);
                let _guard = lock.lock().await;
                self.stop_playback().await;
                self.reply_status()
            }
            SessionCommand::PlaybackSpeed(speed) => {
                self.playback_ref()?.set_speed(speed);
                self.reply_status()
            }
            SessionCommand::PlaybackLoop(enabled) => {
                self.playback_ref()?.set_loop(enabled);
                self.reply_status()
            }
            SessionCommand::PlaybackSeek(position) => {
                self.playback_ref()?.seek(position)?;
                self.reply_status()
            }
            SessionCommand::GetStatus => self.reply_status(),
            SessionCommand::CheckDevice => Ok(SessionReply::Device(self.probe_device())),
        }
    }

    fn playback_ref(&self) -> SessionResult<&PlaybackHandle> {
        self.playback
            .as_ref()
            .ok_or_else(|| SessionError::busy("no playback active"))
    }

    fn reply_status(&mut self) -> SessionResult<SessionReply> {
        self.refresh_derived_state();
        Ok(SessionReply::Status(Box::new(self.state.snapshot())))
    }

    /// Probe the device. Never opens a second handle while one is live; in
    /// that case the answer derives from the running session.
    fn probe_device(&mut self) -> DeviceProbe {
        if self.producer.is_some() {
            return DeviceProbe {
                device_connected: self.state.device_connected,
                device_info: self.source_info.clone(),
                device_error: self.state.device_error.clone(),
            };
        }
        let source_config = SourceConfig {
            center_freq: self.state.device.center_freq,
            sample_rate: self.state.device.sample_rate,
            bandwidth: self.state.device.bandwidth,
            gain: self.state.device.gain,
        };
        match self.registry.build(
            &self.cfg.device.source,
            &self.cfg.device.args,
            &source_config,
        ) {
            Ok(source) => {
                let info = source.describe();
                drop(source);
                self.state.device_connected = true;
                self.state.device_error = None;
                DeviceProbe {
                    device_connected: true,
                    device_info: Some(info),
                    device_error: None,
                }
            }
            Err(e) => {
                self.state.device_connected = false;
                self.state.device_error = Some(e.to_string());
                DeviceProbe {
                    device_connected: false,
                    device_info: None,
                    device_error: Some(e.to_string()),
                }
            }
        }
    }

    fn apply_dsp_update(&mut self, update: DspUpdate) -> SessionResult<()> {
        let mut pipeline = self.pipeline.lock().expect("pipeline mutex poisoned");
        if let Some(window) = update.window {
            pipeline.set_window(window);
            self.state.dsp.window = window;
        }
        if let Some(averaging) = update.averaging {
            pipeline
                .set_averaging(averaging)
                .map_err(|e| SessionError::invalid_config(e.to_string()))?;
            self.state.dsp.averaging = averaging;
        }
        if let Some(dc) = update.dc_removal {
            pipeline.set_dc_removal(dc);
            self.state.dsp.dc_removal = dc;
        }
        if let Some(peak_hold) = update.peak_hold {
            pipeline.set_peak_hold(peak_hold);
            self.state.dsp.peak_hold = peak_hold;
        }
        if let Some(decay) = update.peak_hold_decay_db {
            pipeline.set_peak_hold_decay(decay);
            self.state.dsp.peak_hold_decay_db = decay.max(0.0);
        }
        if let Some(bins) = update.output_bins {
            pipeline
                .set_output_bins(bins)
                .map_err(|e| SessionError::invalid_config(e.to_string()))?;
            self.state.dsp.output_bins = bins;
        }
        if update.reset_peak_hold {
            pipeline.reset_peak_hold();
        }
        Ok(())
    }

    fn apply_agc_update(&mut self, update: AgcUpdate) {
        if let Some(target) = update.target_dbfs {
            self.agc.set_target(target);
        }
        if let Some(hysteresis) = update.hysteresis_db {
            self.agc.set_hysteresis(hysteresis);
        }
        if let Some(step) = update.step_db {
            self.agc.set_step(step);
        }
        if let Some(secs) = update.min_interval_secs {
            self.agc
                .set_min_interval(Duration::from_secs_f64(secs.max(0.0)));
        }
        if let Some(enabled) = update.enabled {
            self.agc.set_enabled(enabled);
            self.state.agc_enabled = enabled;
        }
    }

    async fn shutdown(&mut self, events: &mut UnboundedReceiver<WorkerEvent>) {
        self.stop_all(events).await;
        self.iq_recorder.stop();
        self.spectrum_recorder.stop();
        self.publish();
    }
}

/// Strip a known recording extension so clients may pass either the base
/// name or a full data-file name.
fn strip_recording_extension(name: &str) -> &str {
    for ext in [".raw", ".spec", ".meta"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            return stripped;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use spx_backend::register_builtin_sources;
    use spx_core::session::command::SessionCommand;
    use tokio::sync::oneshot;

    struct Harness {
        request_tx: Sender<SessionRequest>,
        status_rx: watch::Receiver<StatusSnapshot>,
        outbound_rx: UnboundedReceiver<Outbound>,
        shutdown_tx: watch::Sender<bool>,
        task: tokio::task::JoinHandle<SessionResult<()>>,
    }

    fn test_config(dir: &std::path::Path) -> ServerConfig {
        let mut cfg = ServerConfig::default();
        cfg.device.source = "synthetic".into();
        cfg.device.args = "tone=100.25e6:0.3".into();
        cfg.dsp.fft_size = 512;
        cfg.dsp.output_bins = 512;
        cfg.dsp.averaging_mode = "none".into();
        cfg.dsp.overlap = 0.0;
        cfg.stream.target_fps = 0.0;
        cfg.sweep.settle_blocks = 1;
        cfg.recording.storage_path = dir.to_path_buf();
        cfg
    }

    fn spawn_session(cfg: ServerConfig) -> Harness {
        let mut registry = SourceRegistry::new();
        register_builtin_sources(&mut registry);
        let (request_tx, request_rx) = mpsc::channel(8);
        let initial = SessionState::new(
            DeviceParams {
                center_freq: cfg.device.center_freq_hz,
                sample_rate: cfg.device.sample_rate,
                bandwidth: cfg.device.bandwidth_hz,
                gain: cfg.device.gain_db,
            },
            DspConfig::default(),
        )
        .snapshot();
        let (status_tx, status_rx) = watch::channel(initial);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let clients = Arc::new(ClientRegistry::new(64, 32));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_session(
            cfg,
            registry,
            request_rx,
            status_tx,
            outbound_tx,
            clients,
            shutdown_rx,
        ));
        Harness {
            request_tx,
            status_rx,
            outbound_rx,
            shutdown_tx,
            task,
        }
    }

    async fn send(harness: &Harness, cmd: SessionCommand) -> SessionResult<SessionReply> {
        let (tx, rx) = oneshot::channel();
        harness
            .request_tx
            .send(SessionRequest {
                cmd,
                respond_to: tx,
            })
            .await
            .expect("session alive");
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("command timed out")
            .expect("reply dropped")
    }

    async fn finish(harness: Harness) {
        let _ = harness.shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), harness.task).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_streams_frames_then_stops_within_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = spawn_session(test_config(dir.path()));

        match send(&harness, SessionCommand::Start).await.unwrap() {
            SessionReply::Status(snap) => {
                assert_eq!(snap.mode, SessionMode::Live);
                assert!(snap.streaming);
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        // A binary live frame arrives on the outbound queue.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut saw_live = false;
        while Instant::now() < deadline && !saw_live {
            match tokio::time::timeout(Duration::from_secs(1), harness.outbound_rx.recv()).await {
                Ok(Some(Outbound::Live(bytes))) => {
                    use spx_protocol::wire::{decode_frame, DecodedFrame};
                    match decode_frame(&bytes).unwrap() {
                        DecodedFrame::Spectrum { meta, bins, .. } => {
                            assert_eq!(meta.center_freq, 100e6);
                            assert_eq!(bins.len(), 512);
                            assert!(bins.iter().all(|b| b.is_finite()));
                            saw_live = true;
                        }
                        other => panic!("unexpected frame: {:?}", other),
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => panic!("outbound closed"),
                Err(_) => {}
            }
        }
        assert!(saw_live, "no live frame within deadline");

        // Stop returns to idle within the bounded deadline.
        let stop_started = Instant::now();
        match send(&harness, SessionCommand::Stop).await.unwrap() {
            SessionReply::Status(snap) => assert_eq!(snap.mode, SessionMode::Idle),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert!(stop_started.elapsed() < Duration::from_secs(2));

        // The device handle is released: a fresh probe succeeds.
        match send(&harness, SessionCommand::CheckDevice).await.unwrap() {
            SessionReply::Device(probe) => assert!(probe.device_connected),
            other => panic!("unexpected reply: {:?}", other),
        }
        finish(harness).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fft_size_change_rejected_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let harness = spawn_session(test_config(dir.path()));

        send(&harness, SessionCommand::Start).await.unwrap();
        let err = send(&harness, SessionCommand::SetFftSize(4096))
            .await
            .unwrap_err();
        assert_eq!(err.kind, spx_core::session::response::ErrorKind::Busy);

        send(&harness, SessionCommand::Stop).await.unwrap();
        // Allowed once idle.
        assert!(send(&harness, SessionCommand::SetFftSize(4096)).await.is_ok());
        // Still validated.
        let err = send(&harness, SessionCommand::SetFftSize(3000))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            spx_core::session::response::ErrorKind::InvalidConfig
        );
        finish(harness).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_tuning_rejected_without_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = spawn_session(test_config(dir.path()));

        let err = send(&harness, SessionCommand::SetFrequency(10e6))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            spx_core::session::response::ErrorKind::InvalidConfig
        );
        let err = send(&harness, SessionCommand::SetGain(90.0))
            .await
            .unwrap_err();
        assert_eq!(
            err.kind,
            spx_core::session::response::ErrorKind::InvalidConfig
        );
        // State unchanged.
        let snap = harness.status_rx.borrow_and_update().clone();
        assert_eq!(snap.center_freq, 100e6);
        assert_eq!(snap.gain, 40.0);
        finish(harness).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_runs_and_restores_live_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = spawn_session(test_config(dir.path()));

        send(&harness, SessionCommand::Start).await.unwrap();
        let params = SweepParams {
            mode: spx_core::sweep::plan::SweepMode::Survey,
            freq_start: 100e6,
            freq_end: 110e6,
            sample_rate: 10e6,
            averages: 2,
        };
        match send(&harness, SessionCommand::SweepStart(params)).await.unwrap() {
            SessionReply::Status(snap) => {
                assert_eq!(snap.mode, SessionMode::SweepRunning);
                assert!(snap.sweep.sweep_running);
                assert_eq!(snap.sweep.sweep_id, 1);
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        // Survey completes on its own; segments and a panorama flow out and
        // the session returns to live.
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut saw_segment = false;
        let mut saw_panorama = false;
        let mut restored = false;
        while Instant::now() < deadline && !(saw_segment && saw_panorama && restored) {
            match tokio::time::timeout(Duration::from_millis(500), harness.outbound_rx.recv())
                .await
            {
                Ok(Some(Outbound::Sweep(bytes))) => {
                    use spx_protocol::wire::{decode_frame, DecodedFrame};
                    match decode_frame(&bytes).unwrap() {
                        DecodedFrame::Segment { .. } => saw_segment = true,
                        DecodedFrame::Panorama { .. } => saw_panorama = true,
                        DecodedFrame::Spectrum { .. } => {}
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {}
            }
            if harness.status_rx.borrow().mode == SessionMode::Live {
                restored = true;
            }
        }
        assert!(saw_segment, "no sweep segment");
        assert!(saw_panorama, "no panorama");
        assert!(restored, "live mode not restored after sweep");

        send(&harness, SessionCommand::Stop).await.unwrap();
        finish(harness).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rec_delete_sanitizes_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let harness = spawn_session(test_config(dir.path()));
        // Traversal collapses to a basename that does not exist.
        let err = send(
            &harness,
            SessionCommand::RecDelete {
                filename: "../../etc/passwd".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, spx_core::session::response::ErrorKind::NotFound);
        finish(harness).await;
    }

    #[test]
    fn strip_extension_variants() {
        assert_eq!(strip_recording_extension("x.raw"), "x");
        assert_eq!(strip_recording_extension("x.spec"), "x");
        assert_eq!(strip_recording_extension("x.meta"), "x");
        assert_eq!(strip_recording_extension("x"), "x");
    }
}
