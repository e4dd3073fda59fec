// rolltail - app/stream.rs
//
// Output contract shared by every tailer: a line stream plus a parallel error
// stream carrying at most one terminal error, and the `Tailer` capability set
// that File and Directory tailers both implement.

use crate::app::lifecycle::{CancelToken, ErrorSink};
use crate::util::error::TailError;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

/// Receiving half of a tailer's output. Designed for exactly one reader.
#[derive(Debug)]
pub struct TailStreams {
    pub lines: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<TailError>,
}

/// Sending half, owned by the tailer's worker(s).
#[derive(Debug, Clone)]
pub struct StreamSenders {
    pub lines: mpsc::Sender<String>,
    pub errors: ErrorSink,
}

/// Create a connected sender/receiver pair.
pub fn stream_pair() -> (StreamSenders, TailStreams) {
    let (line_tx, line_rx) = mpsc::channel();
    let (err_tx, err_rx) = mpsc::channel();
    (
        StreamSenders {
            lines: line_tx,
            errors: ErrorSink::new(err_tx),
        },
        TailStreams {
            lines: line_rx,
            errors: err_rx,
        },
    )
}

/// One step of draining a `TailStreams`.
#[derive(Debug)]
pub enum StreamEvent {
    Line(String),
    /// The terminal error. Both streams close right after it.
    Error(TailError),
    /// Nothing arrived within the wait.
    Idle,
    /// Both streams are closed and drained.
    Closed,
}

impl TailStreams {
    /// Wait up to `wait` for the next item.
    ///
    /// The error stream is only consulted once the line stream has closed and
    /// drained. Workers drop their line senders right after reporting, so
    /// every line produced before a failure is observed before the failure.
    pub fn poll(&self, wait: Duration) -> StreamEvent {
        match self.lines.recv_timeout(wait) {
            Ok(line) => StreamEvent::Line(line),
            Err(mpsc::RecvTimeoutError::Timeout) => StreamEvent::Idle,
            Err(mpsc::RecvTimeoutError::Disconnected) => self.final_error(),
        }
    }

    fn final_error(&self) -> StreamEvent {
        match self.errors.try_recv() {
            Ok(err) => StreamEvent::Error(err),
            Err(_) => StreamEvent::Closed,
        }
    }
}

/// Capability set shared by the File and Directory tailers.
///
/// Lifecycle: construct, `start` (all fallible setup happens here and errors
/// are returned synchronously), then `stop`, which is idempotent and waits a
/// bounded time for the worker to exit and release its resources.
pub trait Tailer: Send {
    /// Perform setup and spawn the background worker.
    fn start(&mut self) -> Result<(), TailError>;

    /// Cancel the worker, wait for it to exit, and release everything it owns.
    /// Returns `ShutdownTimeout` if the worker is still running after the
    /// configured timeout.
    fn stop(&mut self) -> Result<(), TailError>;

    /// Hand over the output streams. Returns `None` after the first call.
    fn take_streams(&mut self) -> Option<TailStreams>;

    /// Token that cancels this tailer (and everything below it).
    fn cancel_token(&self) -> CancelToken;

    /// The file or directory being tailed.
    fn target(&self) -> &Path;
}
