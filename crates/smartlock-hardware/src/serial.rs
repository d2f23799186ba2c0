//! Line-oriented frame sources.
//!
//! The keypad/card board writes one newline-terminated frame per input on a
//! serial port. [`LineFrameSource`] turns any byte stream into [`RawFrame`]s;
//! [`open_serial`] finds and opens the board's port.

use crate::error::{HardwareError, Result};
use serde::{Deserialize, Serialize};
use smartlock_core::constants::{
    ACQUIRE_RETRY_DELAY_MS, DEFAULT_ACQUIRE_ATTEMPTS, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_SERIAL_PORTS, FRAME_TERMINATOR,
};
use smartlock_protocol::RawFrame;
use std::io::{self, BufRead, BufReader, Read};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Blocking source of raw frames.
///
/// Implementations may block up to their read timeout. `Ok(None)` means no
/// complete frame was available yet.
pub trait FrameSource: Send + 'static {
    /// Read the next complete frame.
    fn read_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Frame source splitting a byte stream on newlines.
///
/// Partial lines are kept across read timeouts until their terminator
/// arrives.
pub struct LineFrameSource<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    name: String,
}

/// Frame source reading from a serial port.
pub type SerialFrameSource = LineFrameSource<Box<dyn serialport::SerialPort>>;

impl<R: Read> LineFrameSource<R> {
    /// Wrap `inner`, naming it `name` in logs.
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            name: name.into(),
        }
    }

    /// Bytes of an incomplete frame received so far.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

impl<R: Read + Send + 'static> FrameSource for LineFrameSource<R> {
    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        match self.reader.read_until(FRAME_TERMINATOR, &mut self.pending) {
            Ok(_) if self.pending.last() == Some(&FRAME_TERMINATOR) => {
                let line = std::mem::take(&mut self.pending);
                Ok(Some(RawFrame::new(line)))
            }
            // EOF or a partial line
            Ok(_) => Ok(None),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                Err(HardwareError::disconnected(&self.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Candidate device paths, tried in order.
    pub ports: Vec<String>,

    /// Baud rate.
    pub baud_rate: u32,

    /// Read timeout in milliseconds.
    pub read_timeout_ms: u64,

    /// Rounds over `ports` before giving up.
    pub acquire_attempts: u32,

    /// Pause between rounds in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_SERIAL_PORTS.iter().map(|p| (*p).to_string()).collect(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            acquire_attempts: DEFAULT_ACQUIRE_ATTEMPTS,
            retry_delay_ms: ACQUIRE_RETRY_DELAY_MS,
        }
    }
}

impl SerialConfig {
    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Pause between acquisition rounds as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Open the first available serial port from `config.ports`.
///
/// Every round tries each candidate once. Rounds are separated by
/// `retry_delay`.
///
/// # Errors
///
/// Returns `HardwareError::PortUnavailable` once all rounds failed, or
/// `HardwareError::InitializationFailed` if no port is configured.
pub async fn open_serial(config: &SerialConfig) -> Result<SerialFrameSource> {
    acquire(config, |path| {
        serialport::new(path, config.baud_rate)
            .timeout(config.read_timeout())
            .open()
            .map(|port| LineFrameSource::new(port, path))
            .map_err(HardwareError::from)
    })
    .await
}

async fn acquire<T, F>(config: &SerialConfig, mut open: F) -> Result<T>
where
    F: FnMut(&str) -> Result<T>,
{
    if config.ports.is_empty() {
        return Err(HardwareError::initialization_failed("no serial port configured"));
    }

    let attempts = config.acquire_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        for path in &config.ports {
            match open(path) {
                Ok(source) => {
                    info!(port = %path, attempt, "Serial port opened");
                    return Ok(source);
                }
                Err(e) => {
                    debug!(port = %path, attempt, error = %e, "Serial port unavailable");
                    last_error = e.to_string();
                }
            }
        }

        if attempt < attempts {
            warn!(attempt, attempts, "No serial port available, retrying");
            tokio::time::sleep(config.retry_delay()).await;
        }
    }

    Err(HardwareError::PortUnavailable {
        attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields its chunks one read at a time, then times out forever.
    struct Chunked {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_reads_one_frame_per_line() {
        let mut source = LineFrameSource::new(Cursor::new(b"01KB1\n01CDA1B2\n".to_vec()), "test");

        let first = source.read_frame().unwrap().unwrap();
        assert_eq!(first.as_bytes(), b"01KB1\n");
        let second = source.read_frame().unwrap().unwrap();
        assert_eq!(second.as_bytes(), b"01CDA1B2\n");
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let inner = Chunked {
            chunks: vec![b"01K".to_vec(), b"B11\n".to_vec()],
        };
        let mut source = LineFrameSource::new(inner, "test");

        // first chunk then timeout
        assert!(source.read_frame().unwrap().is_none());
        assert_eq!(source.pending(), b"01K");

        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!(frame.as_bytes(), b"01KB11\n");
        assert!(source.pending().is_empty());
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let mut source = LineFrameSource::new(Chunked { chunks: vec![] }, "test");
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.ports, vec!["/dev/ttyS1", "/dev/ttyAMA1"]);
        assert_eq!(config.baud_rate, 9_600);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_falls_back_to_second_port() {
        let config = SerialConfig::default();
        let mut tried = Vec::new();

        let opened = acquire(&config, |path| {
            tried.push(path.to_string());
            if path == "/dev/ttyAMA1" {
                Ok(path.to_string())
            } else {
                Err(HardwareError::disconnected(path))
            }
        })
        .await
        .unwrap();

        assert_eq!(opened, "/dev/ttyAMA1");
        assert_eq!(tried, vec!["/dev/ttyS1", "/dev/ttyAMA1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_gives_up_after_attempts() {
        let config = SerialConfig {
            ports: vec!["/dev/null0".to_string()],
            acquire_attempts: 3,
            ..SerialConfig::default()
        };
        let mut calls = 0;

        let result: Result<()> = acquire(&config, |path| {
            calls += 1;
            Err(HardwareError::disconnected(path))
        })
        .await;

        assert_eq!(calls, 3);
        assert!(matches!(
            result,
            Err(HardwareError::PortUnavailable { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_acquire_without_ports() {
        let config = SerialConfig {
            ports: vec![],
            ..SerialConfig::default()
        };
        let result: Result<()> = acquire(&config, |_| Ok(())).await;
        assert!(matches!(result, Err(HardwareError::InitializationFailed { .. })));
    }
}
