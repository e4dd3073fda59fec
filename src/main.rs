// rolltail - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading (platform config dir or --config) with CLI overrides
// 3. Logging initialisation (stderr; stdout carries the tailed lines)
// 4. Ctrl-C wiring to the root cancel token
// 5. Running the tailer and mapping the outcome to an exit code

use clap::Parser;
use rolltail::app::lifecycle::CancelToken;
use rolltail::app::runner::{self, RunOutcome};
use rolltail::core::model::{ExtensionSet, Selection};
use rolltail::platform::config::{self, AppConfig, PlatformPaths};
use rolltail::util::constants;
use rolltail::util::error::{ConfigError, RolltailError};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// rolltail - follow a log file, or the newest log file in a directory,
/// across truncation and rotation.
#[derive(Parser, Debug)]
#[command(name = "rolltail", version, about)]
struct Cli {
    /// File to follow.
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Directory whose lexicographically last matching file is followed.
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Comma-separated extension allow-list for --dir (default ".log").
    #[arg(long = "ext")]
    ext: Option<String>,

    /// Wait before reopening a rotated file, in milliseconds.
    #[arg(long = "settle-ms")]
    settle_ms: Option<u64>,

    /// Bounded wait for shutdown, in milliseconds.
    #[arg(long = "shutdown-timeout-ms")]
    shutdown_timeout_ms: Option<u64>,

    /// Config file to use instead of the platform default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Tracing is not initialised yet; config warnings are replayed below.
    let (app_config, warnings) = match &cli.config {
        Some(path) => match config::load_config_file(path) {
            Ok(loaded) => loaded,
            Err(e) => return fail(e.into()),
        },
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    rolltail::util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "{} starting",
        constants::APP_NAME
    );
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    let (selection, tail_config) = match resolve_invocation(&cli, app_config) {
        Ok(resolved) => resolved,
        Err(e) => return fail(e.into()),
    };

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Interrupt received; shutting down");
        on_signal.cancel();
    }) {
        tracing::warn!(error = %e, "Cannot install Ctrl-C handler");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let on_broken_pipe = cancel.clone();
    let result = runner::run(&selection, tail_config, &cancel, |line| {
        if writeln!(out, "{line}").is_err() {
            on_broken_pipe.cancel();
        }
    });

    match result {
        Ok(RunOutcome::Cancelled) | Ok(RunOutcome::Closed) => {
            tracing::info!("{} exiting", constants::APP_NAME);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::ShutdownTimedOut) => {
            eprintln!("{}: shutdown timed out", constants::APP_NAME);
            ExitCode::FAILURE
        }
        Err(e) => fail(e.into()),
    }
}

/// Turn CLI flags plus loaded config into what to tail and how.
/// CLI values override config values.
fn resolve_invocation(
    cli: &Cli,
    app_config: AppConfig,
) -> Result<(Selection, rolltail::core::model::TailConfig), ConfigError> {
    let selection = match (&cli.file, &cli.dir) {
        (Some(file), None) => Selection::File(file.clone()),
        (None, Some(dir)) => {
            let extensions = match &cli.ext {
                Some(list) => ExtensionSet::parse_list(list),
                None => app_config.extensions.unwrap_or_default(),
            };
            if extensions.is_empty() {
                return Err(ConfigError::ValueOutOfRange {
                    field: "--ext".to_string(),
                    value: cli.ext.clone().unwrap_or_default(),
                    expected: "at least one extension, e.g. .log".to_string(),
                });
            }
            Selection::Directory {
                dir: dir.clone(),
                extensions,
            }
        }
        (Some(_), Some(_)) => {
            return Err(ConfigError::InvalidSelection {
                reason: "--file and --dir cannot be used together",
            });
        }
        (None, None) => {
            return Err(ConfigError::InvalidSelection {
                reason: "one of --file or --dir is required",
            });
        }
    };

    let mut tail = app_config.tail;
    if let Some(ms) = cli.settle_ms {
        tail.settle_interval = ms_flag(
            "--settle-ms",
            ms,
            constants::MIN_SETTLE_INTERVAL_MS..=constants::MAX_SETTLE_INTERVAL_MS,
        )?;
    }
    if let Some(ms) = cli.shutdown_timeout_ms {
        tail.shutdown_timeout = ms_flag(
            "--shutdown-timeout-ms",
            ms,
            constants::MIN_SHUTDOWN_TIMEOUT_MS..=constants::MAX_SHUTDOWN_TIMEOUT_MS,
        )?;
    }

    Ok((selection, tail))
}

fn ms_flag(
    flag: &str,
    value: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<Duration, ConfigError> {
    if range.contains(&value) {
        Ok(Duration::from_millis(value))
    } else {
        Err(ConfigError::ValueOutOfRange {
            field: flag.to_string(),
            value: value.to_string(),
            expected: format!("{}-{} ms", range.start(), range.end()),
        })
    }
}

fn fail(err: RolltailError) -> ExitCode {
    tracing::error!(error = %err, "Fatal");
    eprintln!("{}: {err}", constants::APP_NAME);
    ExitCode::FAILURE
}
