/// Command-line arguments for the `pool-history` binary
///
/// Global flags control logging and the config file; subcommands map onto
/// the history service operations.
use crate::config::CONFIG_FILE_PATH;
use crate::logger::{LogTag, LoggerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pool-history", version)]
#[command(about = "Cached pool TVL/APY history and derived risk metrics", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    pub config: PathBuf,

    /// Enable debug output for a log tag (repeatable, "all" for every tag)
    #[arg(long = "debug", value_name = "TAG", global = true)]
    pub debug_tags: Vec<String>,

    /// Show verbose output for every tag
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also append log lines to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable ANSI colors in console output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch pool histories in a rate-limited batch (Ctrl-C cancels)
    Fetch {
        /// Pool ids to fetch
        #[arg(required = true)]
        ids: Vec<String>,

        /// Ignore fresh cached records
        #[arg(short, long)]
        force: bool,
    },

    /// Print metrics, sorted by risk-adjusted yield (all stored pools by default)
    Metrics { ids: Vec<String> },

    /// Show store statistics and which of the given ids are missing or stale
    Status { ids: Vec<String> },

    /// Remove every stored record
    Clear,
}

impl Cli {
    /// Logger settings derived from the global flags
    pub fn logger_config(&self) -> LoggerConfig {
        let mut config = LoggerConfig::default().with_debug_tags(&self.debug_tags);
        if self.verbose {
            config = config.with_debug_tags(["all"]).verbose();
        } else if self.quiet {
            config = config.quiet();
        }
        config.log_file = self.log_file.clone();
        config.colors = !self.no_color;
        config
    }

    /// Debug tag keys that match no known tag
    pub fn unknown_debug_tags(&self) -> Vec<String> {
        self.debug_tags
            .iter()
            .filter(|key| key.as_str() != "all" && LogTag::from_debug_key(key).is_none())
            .cloned()
            .collect()
    }
}
