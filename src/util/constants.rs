// rolltail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every interval and bound used by the tailers is named here so it can be
// audited and overridden from config.toml in one place.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "rolltail";

/// Application identifier used for config directories.
pub const APP_ID: &str = "rolltail";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Tail timing
// =============================================================================

/// How long a FileTailer waits after a create/rename/remove notification
/// before reopening its path, giving the rotating writer time to create the
/// replacement file. Heuristic only: a slow writer can still lose this race.
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 1_000;

/// Minimum user-configurable settle interval (ms).
pub const MIN_SETTLE_INTERVAL_MS: u64 = 0;

/// Maximum user-configurable settle interval (ms).
pub const MAX_SETTLE_INTERVAL_MS: u64 = 60_000;

/// How long a stop operation waits for a worker thread before giving up.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Minimum user-configurable shutdown timeout (ms).
pub const MIN_SHUTDOWN_TIMEOUT_MS: u64 = 100;

/// Maximum user-configurable shutdown timeout (ms).
pub const MAX_SHUTDOWN_TIMEOUT_MS: u64 = 120_000;

/// How often a blocked worker wakes up to check its cancel flag (ms).
/// Upper bound on cancellation latency for every loop in the crate.
pub const DEFAULT_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable cancel-check interval (ms).
pub const MIN_CANCEL_CHECK_INTERVAL_MS: u64 = 10;

/// Maximum user-configurable cancel-check interval (ms).
pub const MAX_CANCEL_CHECK_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// Tail limits
// =============================================================================

/// Maximum accumulated size of the partial (in-progress) line buffer for a
/// tailed file. A file that produces no newline for this many bytes has its
/// fragment flushed as a line so memory stays bounded.
pub const MAX_TAIL_PARTIAL_BYTES: usize = 2 * 1_024 * 1_024; // 2 MiB

// =============================================================================
// Directory selection
// =============================================================================

/// Extension allow-list used when none is given.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".log"];

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Accepted values for `[logging] level`.
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
