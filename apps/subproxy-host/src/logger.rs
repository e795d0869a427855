//! Logging for the subproxy host, in both of its modes.
//!
//! Provides dual output (console with colors + file) with thread-safe initialization. In
//! worker mode stdout carries the proxy channel, so the console sink is stderr.

use crate::error::HostError;

use common::ErrorLocation;

use std::io::{stderr, stdout};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

/// Thread-safe initialization guard.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Tracks if logger initialization was already attempted.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

const HOST_LOG_FILE_NAME: &str = "subproxy-host.log";
const WORKER_LOG_FILE_NAME: &str = "subproxy-worker.log";

/// Overrides the log directory.
pub const LOG_DIR_ENV: &str = "SUBPROXY_LOG_DIR";
const LOG_DIR_APP_NAME: &str = "subproxy";
const LOG_DIR_LEAF: &str = "logs";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";
const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

/// Default log level for debug builds.
#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// Default log level for release builds.
#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Where console output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// Normal host mode.
    Stdout,
    /// Worker mode; stdout is the proxy channel.
    Stderr,
}

impl Console {
    pub fn log_file_name(self) -> &'static str {
        match self {
            Console::Stdout => HOST_LOG_FILE_NAME,
            Console::Stderr => WORKER_LOG_FILE_NAME,
        }
    }
}

/// Log directory: `$SUBPROXY_LOG_DIR`, else `<local data dir>/subproxy/logs`, else the
/// temp dir.
pub fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_DIR_APP_NAME)
        .join(LOG_DIR_LEAF)
}

/// Initialize the logger with dual output (console + file).
///
/// This function is safe to call multiple times - subsequent calls will
/// log a warning and return Ok. The actual initialization runs exactly once.
///
/// # Errors
///
/// Returns an error if:
/// - The log directory or file cannot be created
/// - Logger dispatch configuration fails
pub fn initialize(log_dir: &Path, console: Console) -> Result<(), HostError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir, console);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{LOG_LEVEL:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(log_dir: &Path, console: Console) -> Result<(), HostError> {
    std::fs::create_dir_all(log_dir).map_err(|e| HostError::Logger {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let log_file_path = log_dir.join(console.log_file_name());
    let pid = std::process::id();

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let base_dispatch = Dispatch::new().level(LOG_LEVEL);

    let console_dispatch = Dispatch::new().format(move |out, message, record| {
        out.finish(format_args!(
            "[{date} - {level} - {pid}] {message} [{file}:{line}]",
            date = format_rfc3339(SystemTime::now()),
            level = color_configuration.color(record.level()),
            message = message,
            file = record.file().unwrap_or("unknown"),
            line = record.line().unwrap_or(0),
        ))
    });
    let console_dispatch = match console {
        Console::Stdout => console_dispatch.chain(stdout()),
        Console::Stderr => console_dispatch.chain(stderr()),
    };

    // File dispatch (plain text, no colors)
    let file_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level} - {pid}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = record.level(),
                message = message,
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0)
            ))
        })
        .chain(
            fern::log_file(&log_file_path).map_err(|e| HostError::Logger {
                message: format!("Failed to create log file: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?,
        );

    base_dispatch
        .chain(console_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HostError::Logger {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}
