// rolltail - app/runner.rs
//
// Drives one tailer from start to stop on the calling thread: build it from
// a `Selection`, start it, hand every line to a callback until the tailer
// closes, fails, or the caller cancels, then stop it with a bounded wait.

use crate::app::dir_tail::DirTailer;
use crate::app::lifecycle::CancelToken;
use crate::app::stream::{StreamEvent, Tailer};
use crate::app::tail::FileTailer;
use crate::core::model::{Selection, TailConfig};
use crate::util::error::TailError;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The caller's token was cancelled and the tailer shut down cleanly.
    Cancelled,
    /// The tailer closed its streams without reporting an error.
    Closed,
    /// The tailer did not exit within the shutdown timeout and was abandoned.
    ShutdownTimedOut,
}

/// Construct the tailer for `selection`, cancelled whenever `parent` is.
pub fn build_tailer(
    selection: &Selection,
    config: TailConfig,
    parent: &CancelToken,
) -> Box<dyn Tailer> {
    match selection {
        Selection::File(path) => Box::new(FileTailer::with_parent(path, config, parent)),
        Selection::Directory { dir, extensions } => Box::new(DirTailer::with_parent(
            dir,
            extensions.clone(),
            config,
            parent,
        )),
    }
}

/// Tail `selection` until it ends or `cancel` fires, passing each line to
/// `on_line`. Setup errors and the tailer's terminal error are returned.
pub fn run<F>(
    selection: &Selection,
    config: TailConfig,
    cancel: &CancelToken,
    mut on_line: F,
) -> Result<RunOutcome, TailError>
where
    F: FnMut(String),
{
    let mut tailer = build_tailer(selection, config, cancel);
    let streams = tailer.take_streams().ok_or_else(|| TailError::AlreadyStarted {
        path: selection.path().to_path_buf(),
    })?;
    tailer.start()?;

    tracing::info!(target_path = %tailer.target().display(), "Tailing");

    let outcome = loop {
        if cancel.is_cancelled() {
            break Ok(RunOutcome::Cancelled);
        }
        match streams.poll(config.cancel_check_interval) {
            StreamEvent::Line(line) => on_line(line),
            StreamEvent::Idle => {}
            StreamEvent::Error(e) => break Err(e),
            StreamEvent::Closed => {
                break Ok(if cancel.is_cancelled() {
                    RunOutcome::Cancelled
                } else {
                    RunOutcome::Closed
                });
            }
        }
    };

    let stopped = tailer.stop();
    match (outcome, stopped) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(TailError::ShutdownTimeout { worker, timeout })) => {
            tracing::warn!(
                worker,
                timeout_ms = timeout.as_millis() as u64,
                "Tailer did not stop in time"
            );
            Ok(RunOutcome::ShutdownTimedOut)
        }
        (Ok(_), Err(e)) => Err(e),
        (Ok(outcome), Ok(())) => Ok(outcome),
    }
}
