// rolltail - app/tail.rs
//
// FileTailer: follows one file, surviving truncation and rotation.
//
// Architecture:
//   - `FileTailer` is the owning handle; `start` opens, stats, seeks and
//     attaches the watch on the caller's thread so setup errors are returned
//     synchronously, then moves the handle and the watch into a `FileWorker`
//     running on a background thread.
//   - The worker blocks on its FileWatch with a short timeout so the cancel
//     flag is checked at every suspension point.
//   - Lines go out over an mpsc channel; a terminal error goes out once on
//     the error stream, after which the worker exits and both streams close.
//
// Read/event handling:
//   - Write: re-stat. Size below the last known size (or below the read
//     offset) means truncation in place: rewind to the start. Then read every
//     complete line to EOF and persist the offset.
//   - Create/rename/remove on the path: rotation. Drain the stale handle,
//     wait the settle interval, drop the old watch, reopen by path from the
//     start, attach a fresh watch, and read once immediately.
//   - Watch errors and stat/open/read errors are fatal and never retried.
//
// Partial lines: bytes after the last newline are buffered and completed on
// the next pass, so arbitrary write-chunk boundaries never split a line.

use crate::app::lifecycle::{CancelToken, WorkerHandle};
use crate::app::stream::{stream_pair, StreamSenders, TailStreams, Tailer};
use crate::core::model::{SeekPolicy, TailConfig};
use crate::platform::watch::{FileWatch, WatchKind, WatchMessage};
use crate::util::constants::MAX_TAIL_PARTIAL_BYTES;
use crate::util::error::TailError;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

// =============================================================================
// FileTailer
// =============================================================================

/// Follows a single file and emits its lines.
pub struct FileTailer {
    path: PathBuf,
    config: TailConfig,
    seek: SeekPolicy,
    immediate_read: bool,
    cancel: CancelToken,
    /// Held until `start` moves them into the worker.
    senders: Option<StreamSenders>,
    streams: Option<TailStreams>,
    worker: Option<WorkerHandle>,
}

impl FileTailer {
    /// Create a stopped tailer with its own root cancel token.
    pub fn new(path: impl Into<PathBuf>, config: TailConfig) -> Self {
        Self::with_token(path.into(), config, CancelToken::new())
    }

    /// Create a stopped tailer that is cancelled whenever `parent` is.
    pub fn with_parent(path: impl Into<PathBuf>, config: TailConfig, parent: &CancelToken) -> Self {
        Self::with_token(path.into(), config, parent.child())
    }

    fn with_token(path: PathBuf, config: TailConfig, cancel: CancelToken) -> Self {
        let (senders, streams) = stream_pair();
        Self {
            path,
            config,
            seek: SeekPolicy::default(),
            immediate_read: false,
            cancel,
            senders: Some(senders),
            streams: Some(streams),
            worker: None,
        }
    }

    /// Initial position. Defaults to end-of-file (only future writes).
    pub fn with_seek(mut self, seek: SeekPolicy) -> Self {
        self.seek = seek;
        self
    }

    /// Read once as soon as the worker starts, before waiting for events.
    pub fn with_immediate_read(mut self) -> Self {
        self.immediate_read = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Tailer for FileTailer {
    fn start(&mut self) -> Result<(), TailError> {
        if self.worker.is_some() || self.senders.is_none() {
            return Err(TailError::AlreadyStarted {
                path: self.path.clone(),
            });
        }

        // Locals are released on every early return below.
        let cursor = LineCursor::open(&self.path, self.seek)?;
        let watch = FileWatch::attach(&self.path)?;

        let Some(senders) = self.senders.take() else {
            return Err(TailError::AlreadyStarted {
                path: self.path.clone(),
            });
        };

        tracing::info!(
            file = %self.path.display(),
            offset = cursor.offset,
            seek = ?self.seek,
            "File tailer started"
        );

        let worker = FileWorker {
            path: self.path.clone(),
            cursor,
            watch: Some(watch),
            config: self.config,
            immediate_read: self.immediate_read,
            senders,
            cancel: self.cancel.clone(),
        };
        self.worker = Some(WorkerHandle::spawn("file tailer", move || worker.run()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TailError> {
        self.cancel.cancel();
        // Never started: dropping the senders closes the streams.
        self.senders = None;

        match self.worker.take() {
            Some(worker) => {
                let result = worker.wait(self.config.shutdown_timeout);
                tracing::debug!(file = %self.path.display(), "File tailer stopped");
                result
            }
            None => Ok(()),
        }
    }

    fn take_streams(&mut self) -> Option<TailStreams> {
        self.streams.take()
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn target(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileTailer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(file = %self.path.display(), error = %e, "File tailer dropped while running");
            }
        }
    }
}

// =============================================================================
// Worker (private to the background thread)
// =============================================================================

/// Outcome of a read pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Drained,
    /// The line receiver was dropped; nobody is listening.
    ConsumerGone,
}

struct FileWorker {
    path: PathBuf,
    cursor: LineCursor,
    /// Always `Some` while running; briefly `None` during a reattach so the
    /// old subscription is gone before the new one exists.
    watch: Option<FileWatch>,
    config: TailConfig,
    immediate_read: bool,
    senders: StreamSenders,
    cancel: CancelToken,
}

impl FileWorker {
    fn run(mut self) {
        match self.event_loop() {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(file = %self.path.display(), error = %e, "File tailer failed");
                self.senders.errors.report(e);
            }
        }
        tracing::debug!(file = %self.path.display(), "File tailer worker exiting");
        // Handle, watch and senders drop here.
    }

    fn event_loop(&mut self) -> Result<(), TailError> {
        if self.immediate_read && self.read_pass()? == Pass::ConsumerGone {
            return Ok(());
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let Some(watch) = self.watch.as_ref() else {
                return Err(TailError::WatchClosed {
                    path: self.path.clone(),
                });
            };

            let message = match watch.recv_timeout(self.config.cancel_check_interval) {
                Ok(m) => m,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(TailError::WatchClosed {
                        path: self.path.clone(),
                    });
                }
            };

            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let pass = match message {
                WatchMessage::Error(source) => {
                    return Err(TailError::Watch {
                        path: self.path.clone(),
                        source,
                    });
                }
                WatchMessage::Event(event) => match event.kind {
                    WatchKind::Write => self.on_write()?,
                    WatchKind::Create | WatchKind::Rename | WatchKind::Remove => {
                        self.on_rotate(event.kind)?
                    }
                },
            };

            if pass == Pass::ConsumerGone {
                tracing::debug!(file = %self.path.display(), "Line receiver dropped; exiting");
                return Ok(());
            }
        }
    }

    fn on_write(&mut self) -> Result<Pass, TailError> {
        let size = self.cursor.current_size()?;
        if self.cursor.is_truncated(size) {
            tracing::info!(
                file = %self.path.display(),
                old_size = self.cursor.last_size,
                new_size = size,
                "File truncated; reading from start"
            );
            self.cursor.rewind();
        }
        self.read_pass()
    }

    fn on_rotate(&mut self, kind: WatchKind) -> Result<Pass, TailError> {
        tracing::info!(
            file = %self.path.display(),
            change = kind.as_str(),
            settle_ms = self.config.settle_interval.as_millis() as u64,
            "File rotated; preparing to reopen"
        );

        // Lines completed in the old file before it was moved are still
        // readable through the stale handle.
        if self.read_pass()? == Pass::ConsumerGone {
            return Ok(Pass::ConsumerGone);
        }

        if !self
            .cancel
            .sleep(self.config.settle_interval, self.config.cancel_check_interval)
        {
            return Ok(Pass::Drained);
        }

        self.watch = None;
        self.cursor = LineCursor::open(&self.path, SeekPolicy::Start(0))?;
        self.watch = Some(FileWatch::attach(&self.path)?);

        tracing::info!(file = %self.path.display(), "File reopened");
        self.read_pass()
    }

    fn read_pass(&mut self) -> Result<Pass, TailError> {
        let lines = &self.senders.lines;
        let mut consumer_gone = false;
        self.cursor.read_lines(&mut |line| {
            if lines.send(line).is_err() {
                consumer_gone = true;
                return false;
            }
            true
        })?;
        Ok(if consumer_gone {
            Pass::ConsumerGone
        } else {
            Pass::Drained
        })
    }
}

// =============================================================================
// LineCursor
// =============================================================================

/// Open handle plus read bookkeeping for one file identity.
#[derive(Debug)]
pub(crate) struct LineCursor {
    path: PathBuf,
    file: File,
    /// Byte position after the last byte consumed, including partial bytes.
    offset: u64,
    /// File size as of the end of the last pass; the truncation baseline.
    last_size: u64,
    /// Bytes after the last newline seen; an in-progress line.
    partial: Vec<u8>,
}

impl LineCursor {
    /// Open `path`, reject directories, and position per `seek`.
    pub(crate) fn open(path: &Path, seek: SeekPolicy) -> Result<Self, TailError> {
        let mut file = File::open(path).map_err(|source| TailError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let meta = file.metadata().map_err(|source| TailError::Io {
            path: path.to_path_buf(),
            operation: "stat",
            source,
        })?;
        if meta.is_dir() {
            return Err(TailError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let offset = file
            .seek(seek.to_seek_from())
            .map_err(|source| TailError::Io {
                path: path.to_path_buf(),
                operation: "seek",
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
            last_size: meta.len(),
            partial: Vec::new(),
        })
    }

    /// Size of the open file (fstat on the handle, not the path).
    pub(crate) fn current_size(&self) -> Result<u64, TailError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| TailError::Io {
                path: self.path.clone(),
                operation: "stat",
                source,
            })
    }

    pub(crate) fn is_truncated(&self, size: u64) -> bool {
        size < self.last_size || size < self.offset
    }

    /// Forget everything read so far; the next pass starts at byte 0.
    pub(crate) fn rewind(&mut self) {
        self.offset = 0;
        self.last_size = 0;
        self.partial.clear();
    }

    /// Read every complete line from the persisted offset to EOF, passing
    /// each to `emit` with its line terminator stripped. Stops early if
    /// `emit` returns `false`.
    pub(crate) fn read_lines(
        &mut self,
        emit: &mut dyn FnMut(String) -> bool,
    ) -> Result<(), TailError> {
        let path = &self.path;
        let io_err = |operation: &'static str| {
            move |source: std::io::Error| TailError::Io {
                path: path.clone(),
                operation,
                source,
            }
        };

        self.file
            .seek(SeekFrom::Start(self.offset))
            .map_err(io_err("seek"))?;

        let mut reader = BufReader::new(&self.file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).map_err(io_err("read"))?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;

            if buf.last() != Some(&b'\n') {
                // No terminator yet: the writer is mid-line.
                self.partial.extend_from_slice(&buf);
                if self.partial.len() > MAX_TAIL_PARTIAL_BYTES {
                    tracing::warn!(
                        file = %path.display(),
                        bytes = self.partial.len(),
                        "Unterminated line exceeds limit; flushing it as a line"
                    );
                    let fragment = std::mem::take(&mut self.partial);
                    if !emit(String::from_utf8_lossy(&fragment).into_owned()) {
                        break;
                    }
                }
                continue;
            }

            let line = if self.partial.is_empty() {
                decode_line(&buf)
            } else {
                self.partial.extend_from_slice(&buf);
                let joined = std::mem::take(&mut self.partial);
                decode_line(&joined)
            };

            if !emit(line) {
                break;
            }
        }

        self.last_size = self.offset;
        Ok(())
    }
}

/// Strip `\n` (and a preceding `\r`) and decode as lossy UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
