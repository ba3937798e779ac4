// External API clients

pub mod client;
pub mod stats;
pub mod yields;

pub use client::HttpClient;
pub use stats::{ApiStats, ApiStatsTracker};
pub use yields::YieldsClient;
