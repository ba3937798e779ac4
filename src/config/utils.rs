use super::schemas::Config;
/// Configuration utilities - loading, validation and saving
///
/// Configuration is returned by value and passed to the components that
/// need it; there is no process-wide config instance.
use crate::logger::{self, LogTag};
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Load configuration from a specific file path
///
/// A missing file is not an error: defaults from the schema definitions are
/// used instead.
///
/// # Returns
/// - `Ok(Config)` - Configuration loaded (or defaulted) and validated
/// - `Err(String)` - Error message if reading, parsing or validation failed
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<Config, String> {
    let path = path.as_ref();

    let config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        parse_config(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    validate_config(&config)?;

    logger::debug(
        LogTag::Config,
        &format!(
            "Config loaded: ttl={}h window={}d batch_delay={}ms quota={}B",
            config.history.ttl_hours,
            config.history.window_days,
            config.batch.delay_ms,
            config.storage.quota_bytes
        ),
    );

    Ok(config)
}

/// Parse configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str::<Config>(contents).map_err(|e| e.to_string())
}

/// Reject configurations that would make the engine misbehave
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.history.ttl_hours <= 0 {
        return Err("history.ttl_hours must be positive".to_string());
    }
    if config.history.window_days <= 0 {
        return Err("history.window_days must be positive".to_string());
    }
    if config.history.eviction_first_pass == 0 {
        return Err("history.eviction_first_pass must be at least 1".to_string());
    }
    if config.api.base_url.trim().is_empty() {
        return Err("api.base_url must not be empty".to_string());
    }
    if config.storage.storage_key.trim().is_empty() {
        return Err("storage.storage_key must not be empty".to_string());
    }
    if config.storage.quota_bytes == 0 {
        return Err("storage.quota_bytes must be positive".to_string());
    }
    Ok(())
}

/// Save a configuration to disk as pretty TOML
pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<(), String> {
    let path = path.as_ref();
    let config_str = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
        }
    }

    std::fs::write(path, config_str)
        .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.history.ttl_hours, 24);
        assert_eq!(config.history.window_days, 90);
        assert_eq!(config.history.mirror_ttl_ms, 1000);
        assert_eq!(config.history.eviction_first_pass, 10);
        assert_eq!(config.batch.delay_ms, 1500);
        assert_eq!(config.storage.storage_key, "pool_history_cache");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse_config(
            r#"
            [batch]
            delay_ms = 250

            [api]
            base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch.delay_ms, 250);
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_secs, 20);
        assert_eq!(config.history.ttl_hours, 24);
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let mut config = Config::default();
        config.history.ttl_hours = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.quota_bytes = 4096;
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.storage.quota_bytes, 4096);
    }
}
