use super::{channels::ChannelsConfig, channels::ChannelsError, cli::CliConfig, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: LogLevel,
    pub probe: bool,
    pub channels: ChannelsConfig,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Reads CLI/ENV, then the channels file it points at. Loaded once at
    /// startup; the pool manager never sees configuration changes after that.
    pub async fn load() -> Result<Config, ChannelsError> {
        Self::from_cli(CliConfig::from_args()).await
    }

    pub async fn from_cli(cli: CliConfig) -> Result<Config, ChannelsError> {
        let channels = ChannelsConfig::from_file_async(&cli.channels_file_location).await?;

        Ok(Config {
            log_level: cli.log_level,
            probe: cli.probe,
            channels,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
