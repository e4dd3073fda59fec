// rolltail - core/model.rs
//
// Core data types shared by the scanner, the tailers, and the runner.
// Pure data: no threads, no channels, no file handles.

use crate::util::constants;
use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Seek policy
// =============================================================================

/// Where a FileTailer positions its handle when it first opens the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPolicy {
    /// Byte offset from the start of the file. `Start(0)` emits the whole file.
    Start(u64),
    /// Byte offset relative to the end of the file. `End(0)` emits only
    /// content written after the tailer starts.
    End(i64),
}

impl SeekPolicy {
    pub fn to_seek_from(self) -> SeekFrom {
        match self {
            Self::Start(n) => SeekFrom::Start(n),
            Self::End(n) => SeekFrom::End(n),
        }
    }
}

impl Default for SeekPolicy {
    fn default() -> Self {
        Self::End(0)
    }
}

// =============================================================================
// Extension allow-list
// =============================================================================

/// Set of file extensions a DirTailer accepts.
///
/// Entries are stored without a leading dot; `".log"` and `"log"` are the same
/// entry. Matching is case-sensitive and looks at the final extension only,
/// so `app.log.1` does not match `.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    exts: BTreeSet<String>,
}

impl ExtensionSet {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exts = entries
            .into_iter()
            .map(|s| s.as_ref().trim().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { exts }
    }

    /// Parse a comma-separated list such as `".log,.txt"`.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }

    /// Returns `true` if the file name of `path` carries an allowed extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.exts.contains(e))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exts.iter().map(String::as_str)
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self::new(constants::DEFAULT_EXTENSIONS)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// What the caller asked to tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A single file, followed across truncation and rotation.
    File(PathBuf),
    /// A directory whose current log file is selected by name.
    Directory {
        dir: PathBuf,
        extensions: ExtensionSet,
    },
}

impl Selection {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) => p,
            Self::Directory { dir, .. } => dir,
        }
    }
}

// =============================================================================
// Tail timing configuration
// =============================================================================

/// Timing parameters shared by every tailer in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailConfig {
    /// Wait before reopening a rotated file.
    pub settle_interval: Duration,
    /// Bounded wait applied by every stop operation.
    pub shutdown_timeout: Duration,
    /// How often blocked workers re-check their cancel flag.
    pub cancel_check_interval: Duration,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_millis(constants::DEFAULT_SETTLE_INTERVAL_MS),
            shutdown_timeout: Duration::from_millis(constants::DEFAULT_SHUTDOWN_TIMEOUT_MS),
            cancel_check_interval: Duration::from_millis(
                constants::DEFAULT_CANCEL_CHECK_INTERVAL_MS,
            ),
        }
    }
}
