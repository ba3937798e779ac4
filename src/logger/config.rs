/// Logger configuration storage
///
/// Held in a process-wide lock so every call site sees the same filtering
/// rules. Reads fall back to the defaults until `logger::init` runs.
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level shown (Debug/Verbose still need per-tag enablement)
    pub min_level: LogLevel,
    /// Tags with debug output enabled ("all" enables every tag)
    pub debug_tags: HashSet<String>,
    /// Tags with verbose output enabled
    pub verbose_tags: HashSet<String>,
    /// When non-empty, only these tags are shown (errors always pass)
    pub enabled_tags: HashSet<String>,
    /// Optional append-only log file
    pub log_file: Option<PathBuf>,
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            log_file: None,
            colors: true,
        }
    }
}

impl LoggerConfig {
    /// Enable debug output for the given tag keys
    ///
    /// Enabling any debug tag raises the minimum level to Debug so the
    /// per-tag check is reached.
    pub fn with_debug_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.debug_tags.insert(tag.as_ref().trim().to_lowercase());
        }
        if !self.debug_tags.is_empty() && self.min_level < LogLevel::Debug {
            self.min_level = LogLevel::Debug;
        }
        self
    }

    pub fn verbose(mut self) -> Self {
        self.min_level = LogLevel::Verbose;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.min_level = LogLevel::Warning;
        self
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    let mut guard = LOGGER_CONFIG.write().unwrap_or_else(|e| e.into_inner());
    *guard = config;
}

pub(crate) fn is_debug_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.min_level == LogLevel::Verbose
        || config.debug_tags.contains("all")
        || config.debug_tags.contains(&tag.to_debug_key())
}

pub(crate) fn is_verbose_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.verbose_tags.contains("all") || config.verbose_tags.contains(&tag.to_debug_key())
}
