pub mod channels;
pub mod cli;
pub mod config;
pub mod types;

pub use channels::{ChannelRecord, ChannelsConfig, ChannelsError, RawPoolSize};
pub use cli::CliConfig;
pub use config::Config;
pub use types::LogLevel;
