pub mod apis;
pub mod arguments;
pub mod config;
pub mod errors; // Structured error handling
pub mod history;
pub mod logger;
