//! smartlock - smart lock controller
//!
//! Reads keypad and card frames from the panel's serial port, decides who may
//! open the lock, drives the lock output and plays sound feedback.
//!
//! # Usage
//!
//! ```bash
//! # Run with a configuration file
//! smartlock --config /etc/smartlock/smartlock.toml
//!
//! # Run without a lock output, logging actuation only
//! smartlock --config smartlock.toml --simulate
//!
//! # Enable debug logging
//! RUST_LOG=smartlock=debug smartlock --config smartlock.toml
//! ```
//!
//! Events for the event bus are written to stdout as JSON lines, logs go to
//! stderr.
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: secure the lock and exit
//! - SIGHUP: reload the `[lock]` table of the configuration file

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use smartlock_controller::ControlLoop;
use smartlock_core::LockConfig;
use smartlock_hardware::{
    LockActuator, LoggingDriver, PlayerSound, SerialFrameReader, SilentSound, SoundCoordinator,
    SysfsGpioDriver, open_serial, select_sound,
};
use smartlock_protocol::DeviceEvent;

use crate::config::AppConfig;

/// How long the reader may take to notice shutdown.
const READER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Smart lock controller
#[derive(Parser, Debug)]
#[command(name = "smartlock", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log lock actuation instead of driving the GPIO output
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::default(),
    };

    let level = args
        .log_level
        .clone()
        .or_else(|| config.general.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&level)?;

    info!(
        version = smartlock_core::VERSION,
        config = ?args.config,
        "smartlock starting"
    );

    let cancel = CancellationToken::new();
    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let source = open_serial(&config.serial)
        .await
        .context("Failed to acquire serial port")?;

    let actuator = if args.simulate {
        LockActuator::new(LoggingDriver)
    } else {
        LockActuator::new(SysfsGpioDriver::new(config.lock.pin)?)
    }
    .context("Failed to initialize lock output")?;

    let sound: Box<dyn SoundCoordinator> = match &config.lock.sound_dir {
        Some(dir) => select_sound(PlayerSound::new(dir, PlayerSound::DEFAULT_PLAYER)),
        None => {
            info!("No sound directory configured, running silent");
            Box::new(SilentSound)
        }
    };

    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let reader = SerialFrameReader::new(source).spawn(frames_tx, cancel.clone());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let writer = spawn_event_writer(events_rx);

    let (config_tx, config_rx) = watch::channel(config.lock.clone());
    if let Some(path) = args.config.clone() {
        spawn_config_reloader(path, config_tx, cancel.clone());
    }

    let mut control = ControlLoop::builder(config.lock)
        .with_settings(config.controller)
        .with_config_updates(config_rx)
        .build(actuator, sound, frames_rx, events_tx)
        .context("Failed to build control loop")?;

    let result = control.run(cancel.clone()).await;
    cancel.cancel();

    match tokio::time::timeout(READER_SHUTDOWN_TIMEOUT, reader.shutdown()).await {
        Ok(Some(report)) => info!(?report, "Frame reader joined"),
        Ok(None) => {}
        Err(_) => warn!("Frame reader did not stop in time, detaching"),
    }

    drop(control);
    if let Err(e) = writer.await {
        warn!(error = %e, "Event writer task failed");
    }

    result.context("Failed to secure lock on shutdown")?;
    info!("smartlock stopped");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{level}'"))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    Ok(())
}

/// Write every event to stdout as one JSON line.
fn spawn_event_writer(mut events: mpsc::UnboundedReceiver<DeviceEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
                warn!(error = %e, "Failed to write event");
            }
        }
    })
}

/// Republish the `[lock]` table whenever SIGHUP arrives.
fn spawn_config_reloader(
    path: PathBuf,
    updates: watch::Sender<LockConfig>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(hangup) => hangup,
                Err(e) => {
                    warn!(error = %e, "SIGHUP reload unavailable");
                    return;
                }
            };

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    received = hangup.recv() => {
                        if received.is_none() {
                            break;
                        }
                    }
                }

                match AppConfig::load_from_file(&path) {
                    Ok(config) => {
                        info!(path = %path.display(), "Configuration reloaded");
                        if updates.send(config.lock).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Configuration reload failed, keeping current"),
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (path, updates);
            cancel.cancelled().await;
        }
    })
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
