//! # levelroll
//!
//! levelroll is a small leveled logging facade for long-running processes
//! that keep their own log files. It writes each severity (debug, info,
//! warn, error, fatal) to the console and, optionally, to a log file that is
//! rotated by size into a bounded chain of numbered backups
//! (`app.log.1`, `app.log.2`, ...), without any external log-management
//! infrastructure.
//!
//! The crate has two layers:
//!
//! * [`RotatingWriter`] owns the active log file. Every write checks the
//!   current file size and, once the configured threshold is reached, shifts
//!   the backup chain and reopens a fresh file before appending. The writer
//!   is a plain [`std::io::Write`] and can also be used as an appender for
//!   `tracing` through `tracing_appender::non_blocking`.
//! * [`LevelLogger`] binds the five severities to [`FanOut`] sinks chosen
//!   once from the configured minimum [`Level`], formats each line with a
//!   severity label, timestamp and call site, and never surfaces steady-state
//!   I/O errors to the caller.
//!
//! ## Example
//!
//! ```rust
//! use levelroll::{info, warn, Level, LevelLogger, LoggerConfig, RotationSize};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("levelroll-doc");
//!     let logger = LevelLogger::new(
//!         LoggerConfig::new(Level::Info)
//!             .path(dir.join("app.log"))
//!             .max_bytes(RotationSize::KB(64)) // Rotate once the file reaches 64 KB
//!             .backup_count(3), // Keep app.log.1 ..= app.log.3
//!     )?;
//!
//!     info!(logger, "listening on port {}", 8080);
//!     warn!(logger, "cache is {}% full", 93);
//!     logger.stop()?;
//!
//!     Ok(())
//! }
//! ```
use std::{io, path::PathBuf};

mod logger;
mod roller;
mod sink;

pub use crate::{
    logger::{
        Level, LevelLogger, LoggerConfig, TimeZone, FATAL_EXIT_CODE, STARTUP_FAILURE_EXIT_CODE,
    },
    roller::{
        ErrorObserver, RotatingWriter, RotatingWriterBuilder, RotationSize, DEFAULT_BACKUP_COUNT,
        DEFAULT_MAX_BYTES,
    },
    sink::{Console, FanOut, Sink},
};

/// Errors that can occur when configuring or driving the log writers.
///
/// Construction errors are returned to the caller. Errors that happen while
/// logging (rename, reopen and write failures) are never returned from the
/// logging calls; they are handed to the optional [`ErrorObserver`] and
/// emitted as `tracing` warnings instead.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Invalid max bytes {0}: the rotation threshold must be positive")]
    InvalidMaxBytes(u64),
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("Failed to write to '{path}': {error}")]
    WriteFileError { path: PathBuf, error: String },
    #[error("Log file '{0}' has been closed")]
    WriterClosed(PathBuf),
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
}

/// Logs a message at [`Level::Debug`].
///
/// ```rust
/// # let logger = levelroll::LevelLogger::new(levelroll::LoggerConfig::new(levelroll::Level::Debug)).unwrap();
/// levelroll::debug!(logger, "loaded {} routes", 12);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debug(::std::format_args!($($arg)+))
    };
}

/// Logs a message at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.info(::std::format_args!($($arg)+))
    };
}

/// Logs a message at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warn(::std::format_args!($($arg)+))
    };
}

/// Logs a message at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.errorf(::std::format_args!($($arg)+))
    };
}

/// Logs a message at [`Level::Fatal`], flushes the log file to stable
/// storage and terminates the process with [`FATAL_EXIT_CODE`].
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.fatalf(::std::format_args!($($arg)+))
    };
}
