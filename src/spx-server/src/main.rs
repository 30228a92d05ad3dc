// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod broadcast;
mod config;
mod dsp_task;
mod listener;
mod playback;
mod recorder;
mod session;
mod sweep_task;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use spx_app::init_logging;
use spx_backend::{register_builtin_sources, SourceConfig, SourceRegistry};
use spx_core::dsp::config::DspConfig;
use spx_core::session::state::{DeviceParams, SessionState};

use config::ServerConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - spectrum analyzer daemon");
const REQUEST_CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the WebSocket listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the WebSocket listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Sample rate in Hz
    #[arg(long = "sample-rate")]
    sample_rate: Option<f64>,
    /// FFT size (power of two)
    #[arg(long = "fft-size")]
    fft_size: Option<usize>,
    /// Source backend to use (e.g. synthetic)
    #[arg(short = 's', long = "source")]
    source: Option<String>,
    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn resolve_config(cli: &Cli, mut cfg: ServerConfig) -> ServerConfig {
    if let Some(listen) = cli.listen {
        cfg.listen.listen = listen;
    }
    if let Some(port) = cli.port {
        cfg.listen.port = port;
    }
    if let Some(rate) = cli.sample_rate {
        cfg.device.sample_rate = rate;
    }
    if let Some(fft) = cli.fft_size {
        cfg.dsp.fft_size = fft;
        cfg.dsp.output_bins = cfg.dsp.output_bins.min(fft);
    }
    if let Some(ref source) = cli.source {
        cfg.device.source = source.clone();
    }
    cfg
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return ExitCode::SUCCESS;
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        match ServerConfig::load_from_file(path) {
            Ok(cfg) => (cfg, Some(path.clone())),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match ServerConfig::load_from_default_paths() {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    };
    let cfg = resolve_config(&cli, cfg);

    let log_level = if cli.debug {
        Some("debug")
    } else {
        cfg.general.log_level.as_deref()
    };
    init_logging(log_level);

    if let Err(e) = cfg.validate() {
        error!("invalid server configuration: {}", e);
        return ExitCode::FAILURE;
    }
    if let Some(ref path) = config_path {
        info!("loaded configuration from {}", path.display());
    }

    let mut registry = SourceRegistry::new();
    register_builtin_sources(&mut registry);

    if !registry.is_registered(&cfg.device.source) {
        error!(
            "unknown source backend: {} (available: {})",
            cfg.device.source,
            registry.registered().join(", ")
        );
        return ExitCode::FAILURE;
    }

    // Fail fast when the device cannot be opened at all.
    let probe_config = SourceConfig {
        center_freq: cfg.device.center_freq_hz,
        sample_rate: cfg.device.sample_rate,
        bandwidth: cfg.device.bandwidth_hz,
        gain: cfg.device.gain_db,
    };
    match registry.build(&cfg.device.source, &cfg.device.args, &probe_config) {
        Ok(source) => info!("device probe ok: {}", source.describe()),
        Err(e) => {
            error!("device initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!(
        "starting spx-server (source: {}, {:.3} MHz @ {:.2} MS/s, fft {})",
        cfg.device.source,
        cfg.device.center_freq_hz / 1e6,
        cfg.device.sample_rate / 1e6,
        cfg.dsp.fft_size
    );

    // Wire the coordinator, broadcast fan-out, and listener together.
    let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_BUFFER);
    let initial_snapshot = SessionState::new(
        DeviceParams {
            center_freq: cfg.device.center_freq_hz,
            sample_rate: cfg.device.sample_rate,
            bandwidth: cfg.device.bandwidth_hz,
            gain: cfg.device.gain_db,
        },
        DspConfig::default(),
    )
    .snapshot();
    let (status_tx, status_rx) = watch::channel(initial_snapshot);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let clients = Arc::new(broadcast::ClientRegistry::new(
        cfg.stream.client_sweep_queue,
        cfg.stream.client_text_queue,
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let broadcast_clients = Arc::clone(&clients);
    let broadcast_task = tokio::spawn(broadcast::run_broadcast(outbound_rx, broadcast_clients));

    let listen_addr = SocketAddr::from((cfg.listen.listen, cfg.listen.port));
    let session_task = tokio::spawn(session::run_session(
        cfg.clone(),
        registry,
        request_rx,
        status_tx,
        outbound_tx,
        Arc::clone(&clients),
        shutdown_rx.clone(),
    ));

    let app = listener::router(listener::AppState {
        request_tx,
        status_rx,
        clients,
    });
    let tcp = match tokio::net::TcpListener::bind(listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {}: {}", listen_addr, e);
            return ExitCode::FAILURE;
        }
    };
    info!("listening on ws://{}/ws", listen_addr);

    let mut serve_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(async move {
        let shutdown = async move {
            while serve_shutdown.changed().await.is_ok() {
                if *serve_shutdown.borrow() {
                    break;
                }
            }
        };
        if let Err(e) = axum::serve(tcp, app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("server error: {}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down"),
        Err(e) => error!("signal handler failed: {}", e),
    }
    let _ = shutdown_tx.send(true);

    match session_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("session coordinator failed: {}", e),
        Err(e) => error!("session task join error: {}", e),
    }
    server_task.abort();
    let _ = server_task.await;
    broadcast_task.abort();
    let _ = broadcast_task.await;

    ExitCode::SUCCESS
}
