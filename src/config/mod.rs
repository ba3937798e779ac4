//! Configuration system
//!
//! Sections are declared with [`config_struct!`](crate::config_struct) in
//! `schemas`, loaded from TOML by `utils`.

mod macros;
mod schemas;
mod utils;

pub use schemas::{ApiConfig, BatchConfig, Config, HistoryConfig, StorageConfig};
pub use utils::{
    load_config_from_path, parse_config, save_config, validate_config,
    CONFIG_FILE_PATH,
};
