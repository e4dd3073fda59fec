// rolltail - platform/watch.rs
//
// FileWatch: a single filesystem-change subscription on one path.
//
// Architecture:
//   - Wraps a `notify::RecommendedWatcher` watching one path non-recursively.
//   - The notify callback runs on the backend's own thread and forwards every
//     relevant event over an mpsc channel; the owning worker blocks on
//     `recv_timeout` so it can interleave cancel checks.
//   - Raw notify kinds are folded into four kinds (write, create, rename,
//     remove). Access and metadata-only events are dropped at the source.
//   - Dropping the FileWatch drops the notify watcher, which releases the
//     OS-level subscription.

use crate::util::error::TailError;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Change kinds the tailers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// Content was written to the path.
    Write,
    /// An entry appeared at the path (created, or renamed onto it).
    Create,
    /// The path was renamed away.
    Rename,
    /// The path was removed.
    Remove,
}

impl WatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "written",
            Self::Create => "created",
            Self::Rename => "renamed",
            Self::Remove => "removed",
        }
    }
}

/// One classified notification.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub paths: Vec<PathBuf>,
}

/// Message delivered on a FileWatch channel.
#[derive(Debug)]
pub enum WatchMessage {
    Event(WatchEvent),
    Error(notify::Error),
}

/// Subscription on a single path. Exclusively owned by one tailer.
pub struct FileWatch {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<WatchMessage>,
}

impl std::fmt::Debug for FileWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatch").field("path", &self.path).finish()
    }
}

impl FileWatch {
    /// Attach a watch to `path`. Fails if the backend cannot be created or the
    /// path cannot be watched (e.g. it does not exist).
    pub fn attach(path: &Path) -> Result<Self, TailError> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                let msg = match res {
                    Ok(event) => match classify(&event.kind) {
                        Some(kind) => WatchMessage::Event(WatchEvent {
                            kind,
                            paths: event.paths,
                        }),
                        None => return,
                    },
                    Err(e) => WatchMessage::Error(e),
                };
                // Receiver gone: the owning tailer is shutting down.
                let _ = tx.send(msg);
            },
        )
        .map_err(|source| TailError::Watch {
            path: path.to_path_buf(),
            source,
        })?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| TailError::Watch {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "Watch attached");

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            rx,
        })
    }

    /// Block for at most `timeout` waiting for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<WatchMessage, mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

impl Drop for FileWatch {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Watch released");
    }
}

/// Fold a notify event kind into the kinds the tailers care about.
pub fn classify(kind: &EventKind) -> Option<WatchKind> {
    match kind {
        EventKind::Create(_) => Some(WatchKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchKind::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchKind::Rename),
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            Some(WatchKind::Write)
        }
        EventKind::Remove(_) => Some(WatchKind::Remove),
        _ => None,
    }
}
