//! Background frame reader.
//!
//! Runs a blocking [`FrameSource`] on tokio's blocking pool and forwards
//! every frame to the control loop through an unbounded channel. Sending
//! never blocks, so the reader never waits on the consumer.

use crate::serial::FrameSource;
use smartlock_core::constants::READER_RETRY_DELAY_MS;
use smartlock_protocol::RawFrame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consecutive read failures after which the reader logs at error level.
const ERROR_ESCALATION_THRESHOLD: u32 = 10;

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Shutdown was requested.
    Cancelled,
    /// The control loop dropped its receiver.
    ChannelClosed,
    /// The source failed in a way retrying cannot fix.
    Disconnected,
}

/// Counters reported when the reader stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderReport {
    pub exit: ReaderExit,
    pub frames_read: u64,
    pub read_errors: u64,
}

/// Producer side of the frame queue.
pub struct SerialFrameReader<S> {
    source: S,
    retry_delay: Duration,
}

impl<S: FrameSource> SerialFrameReader<S> {
    /// Create a reader over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            retry_delay: Duration::from_millis(READER_RETRY_DELAY_MS),
        }
    }

    /// Set the pause after an empty or failed read.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Start reading on the blocking pool.
    pub fn spawn(self, tx: mpsc::UnboundedSender<RawFrame>, cancel: CancellationToken) -> ReaderHandle {
        let task = tokio::task::spawn_blocking({
            let cancel = cancel.clone();
            move || self.run(&tx, &cancel)
        });
        ReaderHandle { task, cancel }
    }

    fn run(mut self, tx: &mpsc::UnboundedSender<RawFrame>, cancel: &CancellationToken) -> ReaderReport {
        info!(source = self.source.name(), "Frame reader started");

        let mut frames_read = 0u64;
        let mut read_errors = 0u64;
        let mut consecutive_errors = 0u32;

        let exit = loop {
            if cancel.is_cancelled() {
                break ReaderExit::Cancelled;
            }
            if tx.is_closed() {
                break ReaderExit::ChannelClosed;
            }

            match self.source.read_frame() {
                Ok(Some(frame)) => {
                    consecutive_errors = 0;
                    frames_read += 1;
                    debug!(len = frame.len(), "Frame received");
                    if tx.send(frame).is_err() {
                        break ReaderExit::ChannelClosed;
                    }
                }
                Ok(None) => std::thread::sleep(self.retry_delay),
                Err(e) if e.is_fatal() => {
                    read_errors += 1;
                    error!(source = self.source.name(), error = %e, "Serial source lost, reader stopping");
                    break ReaderExit::Disconnected;
                }
                Err(e) => {
                    read_errors += 1;
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    if consecutive_errors >= ERROR_ESCALATION_THRESHOLD {
                        error!(source = self.source.name(), error = %e, consecutive_errors, "Serial read failing");
                    } else {
                        warn!(source = self.source.name(), error = %e, "Serial read failed, retrying");
                    }
                    std::thread::sleep(self.retry_delay);
                }
            }
        };

        info!(?exit, frames_read, read_errors, "Frame reader stopped");
        ReaderReport {
            exit,
            frames_read,
            read_errors,
        }
    }
}

/// Handle to a running reader.
pub struct ReaderHandle {
    task: JoinHandle<ReaderReport>,
    cancel: CancellationToken,
}

impl ReaderHandle {
    /// Returns `true` once the reader has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request shutdown and wait for the reader to stop.
    ///
    /// Returns `None` if the reader task panicked.
    pub async fn shutdown(self) -> Option<ReaderReport> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the reader to stop on its own.
    pub async fn join(self) -> Option<ReaderReport> {
        match self.task.await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Frame reader task failed");
                None
            }
        }
    }
}
