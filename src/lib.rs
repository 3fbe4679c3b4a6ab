pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod config;

pub use application::cli::Args;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Snapshot length used when neither the CLI nor the config file sets one.
pub const DEFAULT_SNAPLEN: u32 = 1600;
/// Bounded queue size between the capture task and each engine.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
