/// Core logging implementation with automatic filtering
///
/// This module contains the central logging logic that:
/// - Checks if a log should be displayed based on level and tag
/// - Delegates to the format module for formatting/writing
use super::config::{
    get_logger_config, is_debug_enabled_for_tag, is_verbose_enabled_for_tag, LoggerConfig,
};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level requires debug mode for that tag
/// 4. Verbose level requires global verbose OR verbose for that tag
/// 5. If enabled_tags is non-empty, tag must be in the set
pub fn should_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    if level > config.min_level && !(level == LogLevel::Verbose && is_verbose_enabled_for_tag(config, tag)) {
        return false;
    }

    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(config, tag);
    }

    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose || is_verbose_enabled_for_tag(config, tag);
    }

    if !config.enabled_tags.is_empty() && !config.enabled_tags.contains(&tag.to_debug_key()) {
        return false;
    }

    true
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !should_log(&config, &tag, level) {
        return;
    }

    super::format::format_and_log(tag, level.as_str(), message);
}
