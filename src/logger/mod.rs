//! Structured logging system for the pool history engine
//!
//! This module provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via tags
//! - Dual output: colored console + optional file persistence
//!
//! ## Usage
//!
//! ```rust
//! use pool_history::logger::{self, LogTag};
//!
//! logger::error(LogTag::Store, "Failed to persist history map");
//! logger::warning(LogTag::Eviction, "Storage quota exceeded, evicting");
//! logger::info(LogTag::Batch, "Batch finished");
//! logger::debug(LogTag::Api, "GET /chart/..."); // Only if debug enabled for `api`
//! logger::verbose(LogTag::Metrics, "Raw series: ..."); // Only with verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup with a [`LoggerConfig`]. When `init` is never called
//! (library use, tests) the default configuration applies: INFO and above,
//! console only.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Installs the configuration, applies the color override and opens the
/// log file when one is configured.
pub fn init(config: LoggerConfig) {
    if !config.colors {
        colored::control::set_override(false);
    }
    file::init_file_logging(config.log_file.as_deref());
    set_logger_config(config);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are ONLY shown when debug output is enabled for the tag
/// (`--debug <tag>` on the CLI, or `debug_tags` in [`LoggerConfig`]).
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush all pending log writes
///
/// Call this during shutdown to ensure all logs are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
