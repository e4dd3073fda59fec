// rolltail - app/lifecycle.rs
//
// Cancellation and shutdown plumbing shared by both tailers.
//
// Architecture:
//   - `CancelToken` is a hierarchical `Arc<AtomicBool>` cancel flag. A child
//     token reports cancelled when it or any ancestor is cancelled, so one
//     umbrella cancel reaches the DirTailer and from there its FileTailer.
//   - `ErrorSink` delivers at most one terminal error per tailer and closes
//     the error stream as it does so.
//   - `WorkerHandle` owns a worker thread. The thread holds the sender half of
//     a completion channel; when the thread returns (or panics) the sender is
//     dropped, which is what `wait` blocks on with a timeout.

use crate::util::error::TailError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// =============================================================================
// CancelToken
// =============================================================================

/// Cooperative, hierarchical cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled whenever `self` is, but which can also be cancelled
    /// on its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Sleep for `total`, waking every `slice` to check for cancellation.
    /// Returns `false` if cancelled before the full duration elapsed.
    pub fn sleep(&self, total: Duration, slice: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(slice.min(deadline - now));
        }
    }
}

// =============================================================================
// ErrorSink
// =============================================================================

/// Single-shot sender for a tailer's terminal error.
///
/// Cloned between a DirTailer's worker and its relay stage; whichever reports
/// first wins and the stream closes behind it.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: Arc<Mutex<Option<mpsc::Sender<TailError>>>>,
}

impl ErrorSink {
    pub fn new(tx: mpsc::Sender<TailError>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Deliver `err` if no error has been delivered yet.
    /// Returns `true` if this call delivered it.
    pub fn report(&self, err: TailError) -> bool {
        let sender = match self.tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                tracing::debug!(error = %err, "Reporting terminal error");
                // Consumer gone: nobody left to tell.
                let _ = tx.send(err);
                true
            }
            None => {
                tracing::debug!(error = %err, "Terminal error already reported; dropping");
                false
            }
        }
    }
}

// =============================================================================
// WorkerHandle
// =============================================================================

/// A spawned worker thread with a bounded-wait shutdown.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    done: mpsc::Receiver<()>,
}

impl WorkerHandle {
    /// Spawn `work` on a background thread.
    pub fn spawn<F>(name: &'static str, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            // Dropped on return or unwind; that is the completion signal.
            let _done = done_tx;
            work();
        });
        tracing::trace!(worker = name, "Worker spawned");
        Self {
            name,
            handle: Some(handle),
            done,
        }
    }

    /// Block until the worker exits or `timeout` elapses. On timeout the
    /// thread is abandoned (left detached) and `ShutdownTimeout` is returned.
    pub fn wait(mut self, timeout: Duration) -> Result<(), TailError> {
        match self.done.recv_timeout(timeout) {
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    worker = self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Worker did not exit in time; abandoning it"
                );
                Err(TailError::ShutdownTimeout {
                    worker: self.name,
                    timeout,
                })
            }
            // Nothing is ever sent; disconnection means the thread is done.
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!(worker = self.name, "Worker panicked");
                    }
                }
                tracing::trace!(worker = self.name, "Worker joined");
                Ok(())
            }
        }
    }
}
