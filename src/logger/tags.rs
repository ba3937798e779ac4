/// Log tags identifying the subsystem that emitted a message
///
/// The debug key (lowercase) is what `--debug <tag>` matches against.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Store,
    Eviction,
    Fetcher,
    Batch,
    Metrics,
    Api,
}

impl LogTag {
    pub fn all() -> [LogTag; 8] {
        [
            LogTag::System,
            LogTag::Config,
            LogTag::Store,
            LogTag::Eviction,
            LogTag::Fetcher,
            LogTag::Batch,
            LogTag::Metrics,
            LogTag::Api,
        ]
    }

    /// Key used by debug/verbose flag matching
    pub fn to_debug_key(&self) -> String {
        self.to_plain_string().to_lowercase()
    }

    /// Uncolored tag label used in log files
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Store => "STORE",
            LogTag::Eviction => "EVICTION",
            LogTag::Fetcher => "FETCHER",
            LogTag::Batch => "BATCH",
            LogTag::Metrics => "METRICS",
            LogTag::Api => "API",
        }
        .to_string()
    }

    pub fn from_debug_key(key: &str) -> Option<LogTag> {
        let key = key.trim().to_lowercase();
        LogTag::all()
            .into_iter()
            .find(|tag| tag.to_debug_key() == key)
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
