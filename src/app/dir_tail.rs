// rolltail - app/dir_tail.rs
//
// DirTailer: follows whichever file in a directory is currently "the" log.
//
// Architecture:
//   - `start` resolves the directory, attaches a watch on it, and picks the
//     initial candidate synchronously (tailed from end-of-file). An empty
//     directory is not an error; the tailer idles until a file appears.
//   - A `DirWorker` thread owns the directory watch and at most one active
//     child FileTailer. Each child's streams are drained by a relay thread
//     that forwards lines into the DirTailer's own line stream, so the
//     consumer sees one uninterrupted stream across swaps.
//   - Create events (including renames onto a name) for matching files
//     trigger a rescan. A different candidate replaces the active child:
//     stop the old child, wait for its relay to drain, start the new child
//     from byte 0 with an immediate read.
//   - The watched directory being renamed or removed, a watch error, or a
//     child failure is fatal: the error is reported once and everything
//     below this tailer is torn down.
//
// Cancellation: every child token is derived from the DirTailer's token, so
// cancelling the DirTailer (or any ancestor) reaches the active FileTailer.

use crate::app::lifecycle::{CancelToken, WorkerHandle};
use crate::app::stream::{stream_pair, StreamEvent, StreamSenders, TailStreams, Tailer};
use crate::app::tail::FileTailer;
use crate::core::model::{ExtensionSet, SeekPolicy, TailConfig};
use crate::core::scanner;
use crate::platform::fs::resolve_directory;
use crate::platform::watch::{FileWatch, WatchEvent, WatchKind, WatchMessage};
use crate::util::error::TailError;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

// =============================================================================
// DirTailer
// =============================================================================

/// Follows the lexicographically last matching file in a directory.
pub struct DirTailer {
    /// As given until `start`, canonical afterwards.
    dir: PathBuf,
    extensions: ExtensionSet,
    config: TailConfig,
    cancel: CancelToken,
    senders: Option<StreamSenders>,
    streams: Option<TailStreams>,
    worker: Option<WorkerHandle>,
}

impl DirTailer {
    pub fn new(dir: impl Into<PathBuf>, extensions: ExtensionSet, config: TailConfig) -> Self {
        Self::with_token(dir.into(), extensions, config, CancelToken::new())
    }

    /// Create a stopped tailer that is cancelled whenever `parent` is.
    pub fn with_parent(
        dir: impl Into<PathBuf>,
        extensions: ExtensionSet,
        config: TailConfig,
        parent: &CancelToken,
    ) -> Self {
        Self::with_token(dir.into(), extensions, config, parent.child())
    }

    fn with_token(
        dir: PathBuf,
        extensions: ExtensionSet,
        config: TailConfig,
        cancel: CancelToken,
    ) -> Self {
        let (senders, streams) = stream_pair();
        Self {
            dir,
            extensions,
            config,
            cancel,
            senders: Some(senders),
            streams: Some(streams),
            worker: None,
        }
    }
}

impl Tailer for DirTailer {
    fn start(&mut self) -> Result<(), TailError> {
        if self.worker.is_some() || self.senders.is_none() {
            return Err(TailError::AlreadyStarted {
                path: self.dir.clone(),
            });
        }

        let dir = resolve_directory(&self.dir)?;
        let watch = FileWatch::attach(&dir)?;

        let Some(senders) = self.senders.take() else {
            return Err(TailError::AlreadyStarted { path: dir });
        };
        self.dir = dir.clone();

        let mut worker = DirWorker {
            dir,
            extensions: self.extensions.clone(),
            config: self.config,
            watch,
            active: None,
            senders,
            cancel: self.cancel.clone(),
        };

        // Nothing is active yet on failure; dropping `worker` closes the streams.
        worker.select_initial()?;

        tracing::info!(
            dir = %self.dir.display(),
            extensions = ?self.extensions.iter().collect::<Vec<_>>(),
            "Directory tailer started"
        );

        self.worker = Some(WorkerHandle::spawn("directory tailer", move || worker.run()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TailError> {
        self.cancel.cancel();
        self.senders = None;

        match self.worker.take() {
            Some(worker) => {
                let result = worker.wait(self.config.shutdown_timeout);
                tracing::debug!(dir = %self.dir.display(), "Directory tailer stopped");
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
        &self.dir
    }
}

impl Drop for DirTailer {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Directory tailer dropped while running");
            }
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

/// The running child and the thread forwarding its output.
struct ActiveTail {
    tailer: FileTailer,
    relay: WorkerHandle,
}

struct DirWorker {
    dir: PathBuf,
    extensions: ExtensionSet,
    config: TailConfig,
    watch: FileWatch,
    active: Option<ActiveTail>,
    senders: StreamSenders,
    cancel: CancelToken,
}

impl DirWorker {
    fn select_initial(&mut self) -> Result<(), TailError> {
        match scanner::select_candidate(&self.dir, &self.extensions)? {
            Some(path) => self.activate(path, SeekPolicy::End(0), false),
            None => {
                tracing::info!(dir = %self.dir.display(), "No matching file yet; waiting");
                Ok(())
            }
        }
    }

    fn run(mut self) {
        let result = self.event_loop();
        let teardown = self.deactivate();

        match (result, teardown) {
            (Err(e), _) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Directory tailer failed");
                self.senders.errors.report(e);
            }
            (Ok(()), Err(e)) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Directory tailer teardown incomplete");
                self.senders.errors.report(e);
            }
            (Ok(()), Ok(())) => {}
        }
        // Cancel anything still holding a child of this token.
        self.cancel.cancel();
        tracing::debug!(dir = %self.dir.display(), "Directory tailer worker exiting");
    }

    fn event_loop(&mut self) -> Result<(), TailError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let message = match self.watch.recv_timeout(self.config.cancel_check_interval) {
                Ok(m) => m,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(TailError::WatchClosed {
                        path: self.dir.clone(),
                    });
                }
            };

            if self.cancel.is_cancelled() {
                return Ok(());
            }

            match message {
                WatchMessage::Error(source) => {
                    return Err(TailError::Watch {
                        path: self.dir.clone(),
                        source,
                    });
                }
                WatchMessage::Event(event) => self.on_event(event)?,
            }
        }
    }

    fn on_event(&mut self, event: WatchEvent) -> Result<(), TailError> {
        match event.kind {
            WatchKind::Rename | WatchKind::Remove => {
                if event.paths.iter().any(|p| p == &self.dir) {
                    return Err(TailError::DirectoryChanged {
                        path: self.dir.clone(),
                        change: event.kind.as_str(),
                    });
                }
                Ok(())
            }
            WatchKind::Create => {
                if event.paths.iter().any(|p| self.is_candidate_event(p)) {
                    self.rescan()
                } else {
                    Ok(())
                }
            }
            // The active child watches its own file.
            WatchKind::Write => Ok(()),
        }
    }

    fn is_candidate_event(&self, path: &Path) -> bool {
        path != self.dir && !path.is_dir() && self.extensions.matches(path)
    }

    fn rescan(&mut self) -> Result<(), TailError> {
        let Some(candidate) = scanner::select_candidate(&self.dir, &self.extensions)? else {
            return Ok(());
        };

        if let Some(active) = &self.active {
            if active.tailer.path() == candidate {
                tracing::trace!(file = %candidate.display(), "Candidate unchanged");
                return Ok(());
            }
        }

        tracing::info!(
            dir = %self.dir.display(),
            from = ?self.active.as_ref().map(|a| a.tailer.path().display().to_string()),
            to = %candidate.display(),
            "Switching active file"
        );

        self.deactivate()?;
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.activate(candidate, SeekPolicy::Start(0), true)
    }

    fn activate(
        &mut self,
        path: PathBuf,
        seek: SeekPolicy,
        immediate_read: bool,
    ) -> Result<(), TailError> {
        let mut tailer = FileTailer::with_parent(&path, self.config, &self.cancel).with_seek(seek);
        if immediate_read {
            tailer = tailer.with_immediate_read();
        }
        let streams = tailer
            .take_streams()
            .ok_or_else(|| TailError::AlreadyStarted { path: path.clone() })?;
        tailer.start()?;

        let senders = self.senders.clone();
        let cancel = self.cancel.clone();
        let check = self.config.cancel_check_interval;
        let relay = WorkerHandle::spawn("directory relay", move || {
            relay_lines(streams, senders, cancel, check)
        });

        tracing::info!(file = %path.display(), seek = ?seek, "Active file started");
        self.active = Some(ActiveTail { tailer, relay });
        Ok(())
    }

    /// Stop the active child and wait for its relay to forward everything the
    /// child produced. No-op when nothing is active.
    fn deactivate(&mut self) -> Result<(), TailError> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        let stopped = active.tailer.stop();
        let relayed = active.relay.wait(self.config.shutdown_timeout);
        tracing::debug!(file = %active.tailer.path().display(), "Active file stopped");
        stopped.and(relayed)
    }
}

/// Forward one child's output into the directory tailer's streams until the
/// child closes. A child failure is fatal for the whole directory tailer.
fn relay_lines(streams: TailStreams, senders: StreamSenders, cancel: CancelToken, check: Duration) {
    loop {
        match streams.poll(check) {
            StreamEvent::Line(line) => {
                if senders.lines.send(line).is_err() {
                    tracing::debug!("Directory line receiver dropped; cancelling");
                    cancel.cancel();
                    return;
                }
            }
            StreamEvent::Idle => {
                if cancel.is_cancelled() {
                    return;
                }
            }
            StreamEvent::Error(err) => {
                senders.errors.report(err);
                cancel.cancel();
                return;
            }
            StreamEvent::Closed => return,
        }
    }
}
