use clap::Parser;
use std::path::PathBuf;

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub channels_file_location: PathBuf,
    pub log_level: LogLevel,
    pub probe: bool,
}

impl CliConfig {
    /// Exits the process with clap's usage message on bad arguments.
    pub fn from_args() -> Self {
        Self::from_parsed(Args::parse())
    }

    pub fn try_from_iter<I, S>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        Args::try_parse_from(args).map(Self::from_parsed)
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_parsed(args: Args) -> Self {
        Self {
            channels_file_location: args.config_file,
            log_level: args.log_level,
            probe: args.probe,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "ipcgate", version, about = "IPC channel connection pool")]
struct Args {
    // Must exist; no defaults.
    #[arg(long = "config", env = "IPCGATE_CONFIG_FILE")]
    config_file: PathBuf,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", env = "IPCGATE_LOG", default_value = "info")]
    log_level: LogLevel,

    // Acquire and release one session per channel after startup.
    #[arg(long = "probe")]
    probe: bool,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
