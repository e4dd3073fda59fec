// rolltail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every variant carries the path it concerns so a terminal error printed by
// the binary is actionable without a debug log.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all rolltail operations.
#[derive(Debug)]
pub enum RolltailError {
    /// A tailer failed during setup or at runtime.
    Tail(TailError),

    /// Configuration or command-line input was rejected.
    Config(ConfigError),
}

impl fmt::Display for RolltailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for RolltailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tail(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Errors raised by the file and directory tailers.
///
/// Setup failures are returned from `start`; runtime failures are delivered
/// once on the tailer's error stream. Neither class is retried.
#[derive(Debug)]
pub enum TailError {
    /// The tailed file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// A file tailer was pointed at a directory.
    NotAFile { path: PathBuf },

    /// A directory tailer was pointed at something other than a directory.
    NotADirectory { path: PathBuf },

    /// The directory path could not be resolved to an absolute form.
    Resolve { path: PathBuf, source: io::Error },

    /// stat/seek/read failure on an open file.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },

    /// Listing the directory for a candidate failed.
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// The watch subsystem could not attach or reported a failure.
    Watch {
        path: PathBuf,
        source: notify::Error,
    },

    /// The watch backend stopped delivering notifications.
    WatchClosed { path: PathBuf },

    /// The watched directory itself was renamed or removed.
    DirectoryChanged { path: PathBuf, change: &'static str },

    /// `start` was called on a tailer that was already started or stopped.
    AlreadyStarted { path: PathBuf },

    /// A worker did not exit within the shutdown timeout.
    ShutdownTimeout {
        worker: &'static str,
        timeout: Duration,
    },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open '{}': {source}", path.display())
            }
            Self::NotAFile { path } => {
                write!(f, "'{}' is a directory, not a file", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "'{}' is not a directory", path.display())
            }
            Self::Resolve { path, source } => {
                write!(f, "Cannot resolve '{}': {source}", path.display())
            }
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
            Self::Scan { path, source } => {
                write!(f, "Cannot list directory '{}': {source}", path.display())
            }
            Self::Watch { path, source } => {
                write!(f, "Watch error on '{}': {source}", path.display())
            }
            Self::WatchClosed { path } => {
                write!(f, "Watch on '{}' stopped delivering events", path.display())
            }
            Self::DirectoryChanged { path, change } => write!(
                f,
                "Watched directory '{}' was {change}; tailing cannot continue",
                path.display()
            ),
            Self::AlreadyStarted { path } => {
                write!(f, "Tailer for '{}' was already started", path.display())
            }
            Self::ShutdownTimeout { worker, timeout } => write!(
                f,
                "{worker} did not stop within {} ms",
                timeout.as_millis()
            ),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Resolve { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Scan { source, .. } => Some(source),
            Self::Watch { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TailError> for RolltailError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading and command-line input.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },

    /// Neither or both of a file and a directory were selected.
    InvalidSelection { reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
            Self::InvalidSelection { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for RolltailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
