// rolltail - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::{ExtensionSet, TailConfig};
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for rolltail configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/rolltail/ or %APPDATA%\rolltail\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[tail]` section.
    pub tail: TailSection,
    /// `[directory]` section.
    pub directory: DirectorySection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[tail]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TailSection {
    /// Wait before reopening a rotated file (ms).
    pub settle_interval_ms: Option<u64>,
    /// Bounded wait for worker shutdown (ms).
    pub shutdown_timeout_ms: Option<u64>,
    /// Cancel-check granularity for blocked workers (ms).
    pub cancel_check_interval_ms: Option<u64>,
}

/// `[directory]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DirectorySection {
    /// Extension allow-list, e.g. `[".log", ".txt"]`.
    pub extensions: Option<Vec<String>>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Tail timing.
    pub tail: TailConfig,
    /// Extension allow-list for directory mode, when configured.
    pub extensions: Option<ExtensionSet>,
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

/// Load `config.toml` from the platform config directory.
///
/// A missing file yields defaults with no warnings (first run). An unreadable
/// or unparseable file yields defaults plus a warning so the tailer still
/// starts.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

/// Load a config file the user named explicitly. Read and parse failures
/// are errors here, since the user asked for this file.
pub fn load_config_file(path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Loaded config.toml");
    Ok(validate(raw))
}

/// Validate each field against named constants, accumulating warnings.
/// Invalid values fall back to defaults.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let mut config = AppConfig::default();

    // -- Tail: settle_interval_ms --
    if let Some(ms) = raw.tail.settle_interval_ms {
        if let Some(d) = ms_in_range(
            "[tail] settle_interval_ms",
            ms,
            constants::MIN_SETTLE_INTERVAL_MS..=constants::MAX_SETTLE_INTERVAL_MS,
            constants::DEFAULT_SETTLE_INTERVAL_MS,
            &mut warnings,
        ) {
            config.tail.settle_interval = d;
        }
    }

    // -- Tail: shutdown_timeout_ms --
    if let Some(ms) = raw.tail.shutdown_timeout_ms {
        if let Some(d) = ms_in_range(
            "[tail] shutdown_timeout_ms",
            ms,
            constants::MIN_SHUTDOWN_TIMEOUT_MS..=constants::MAX_SHUTDOWN_TIMEOUT_MS,
            constants::DEFAULT_SHUTDOWN_TIMEOUT_MS,
            &mut warnings,
        ) {
            config.tail.shutdown_timeout = d;
        }
    }

    // -- Tail: cancel_check_interval_ms --
    if let Some(ms) = raw.tail.cancel_check_interval_ms {
        if let Some(d) = ms_in_range(
            "[tail] cancel_check_interval_ms",
            ms,
            constants::MIN_CANCEL_CHECK_INTERVAL_MS..=constants::MAX_CANCEL_CHECK_INTERVAL_MS,
            constants::DEFAULT_CANCEL_CHECK_INTERVAL_MS,
            &mut warnings,
        ) {
            config.tail.cancel_check_interval = d;
        }
    }

    // -- Directory: extensions --
    if let Some(exts) = raw.directory.extensions {
        let set = ExtensionSet::new(&exts);
        if set.is_empty() {
            warnings.push(
                "[directory] extensions is empty. Using default (.log).".to_string(),
            );
        } else {
            config.extensions = Some(set);
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        if constants::VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

fn ms_in_range(
    field: &str,
    value: u64,
    range: std::ops::RangeInclusive<u64>,
    default: u64,
    warnings: &mut Vec<String>,
) -> Option<Duration> {
    if range.contains(&value) {
        Some(Duration::from_millis(value))
    } else {
        warnings.push(format!(
            "{field} = {value} is out of range ({}-{}). Using default ({default}).",
            range.start(),
            range.end(),
        ));
        None
    }
}
