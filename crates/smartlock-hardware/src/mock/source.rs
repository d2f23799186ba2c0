//! Mock frame source.

use crate::error::{HardwareError, Result};
use crate::serial::FrameSource;
use smartlock_protocol::RawFrame;
use tokio::sync::mpsc::{self, error::TryRecvError};

#[derive(Debug)]
enum MockRead {
    Frame(RawFrame),
    Error(String),
}

/// Frame source fed from a [`MockFrameSourceHandle`].
///
/// # Examples
///
/// ```
/// use smartlock_hardware::mock::MockFrameSource;
/// use smartlock_hardware::FrameSource;
///
/// let (mut source, handle) = MockFrameSource::new();
/// handle.send_frame("01KB11\n");
///
/// let frame = source.read_frame().unwrap().unwrap();
/// assert_eq!(frame.as_bytes(), b"01KB11\n");
/// assert!(source.read_frame().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MockFrameSource {
    rx: mpsc::UnboundedReceiver<MockRead>,
}

impl MockFrameSource {
    /// Create a source and its handle.
    pub fn new() -> (Self, MockFrameSourceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, MockFrameSourceHandle { tx })
    }
}

impl FrameSource for MockFrameSource {
    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        match self.rx.try_recv() {
            Ok(MockRead::Frame(frame)) => Ok(Some(frame)),
            Ok(MockRead::Error(message)) => Err(HardwareError::communication(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(HardwareError::disconnected("mock")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Test-side handle of a [`MockFrameSource`].
#[derive(Debug, Clone)]
pub struct MockFrameSourceHandle {
    tx: mpsc::UnboundedSender<MockRead>,
}

impl MockFrameSourceHandle {
    /// Queue a frame received now.
    pub fn send_frame(&self, line: &str) {
        self.send(RawFrame::new(line.as_bytes().to_vec()));
    }

    /// Queue a prepared frame.
    pub fn send(&self, frame: RawFrame) {
        let _ = self.tx.send(MockRead::Frame(frame));
    }

    /// Make the next read fail.
    pub fn send_error(&self, message: impl Into<String>) {
        let _ = self.tx.send(MockRead::Error(message.into()));
    }
}
