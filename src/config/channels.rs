use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;

use crate::gateway::{PoolError, SessionTimeout, TimeoutPolicy};

// -----------------------------------------------------------------------------
// ----- ChannelsConfig --------------------------------------------------------

/// Everything the pool manager reads from configuration, loaded once.
///
/// File-level problems (I/O, TOML syntax, duplicate channels, unparsable
/// timeouts) fail the load. Problems confined to one channel, such as a
/// missing address or a bad pool size, are kept and reported when that
/// channel's pool is built.
#[derive(Debug, Clone, Default)]
pub struct ChannelsConfig {
    default_timeout: SessionTimeout,
    channels: Vec<ChannelRecord>,
}

// -----------------------------------------------------------------------------
// ----- ChannelsConfig: Static ------------------------------------------------

impl ChannelsConfig {
    pub async fn from_file_async(path: &Path) -> Result<ChannelsConfig, ChannelsError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ChannelsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<ChannelsConfig, ChannelsError> {
        let mut doc: ChannelsFile =
            toml::from_str(raw).map_err(|e| ChannelsError::Toml { source: e })?;

        let default_timeout = match doc.defaults.session_timeout.as_deref() {
            Some(value) => parse_timeout("[defaults]", value)?,
            None => SessionTimeout::Unbounded,
        };

        let mut seen = HashSet::with_capacity(doc.channels.len());
        let mut channels = Vec::with_capacity(doc.channels.len());

        for entry in doc.channels.drain(..) {
            if entry.name.trim().is_empty() {
                return Err(ChannelsError::InvalidField("name".into()));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(ChannelsError::DuplicateChannel { name: entry.name });
            }

            let session_timeout = entry
                .session_timeout
                .as_deref()
                .map(|value| parse_timeout(&entry.name, value))
                .transpose()?;

            let mut timeouts = HashMap::with_capacity(entry.timeouts.len());
            for (service_id, value) in &entry.timeouts {
                let scope = format!("{}.{service_id}", entry.name);
                timeouts.insert(service_id.clone(), parse_timeout(&scope, value)?);
            }

            channels.push(ChannelRecord {
                name: entry.name,
                address: entry.address,
                pool_size: entry.pool_size,
                session_timeout,
                timeouts,
            });
        }

        Ok(ChannelsConfig {
            default_timeout,
            channels,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ChannelsConfig: Public ------------------------------------------------

impl ChannelsConfig {
    pub fn channels(&self) -> &[ChannelRecord] {
        &self.channels
    }

    pub fn get(&self, name: &str) -> Option<&ChannelRecord> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn default_timeout(&self) -> SessionTimeout {
        self.default_timeout
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        let mut policy = TimeoutPolicy::new(self.default_timeout);

        for channel in &self.channels {
            if let Some(timeout) = channel.session_timeout {
                policy = policy.with_channel_default(&channel.name, timeout);
            }
            for (service_id, timeout) in &channel.timeouts {
                policy = policy.with_service(&channel.name, service_id, *timeout);
            }
        }

        policy
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    defaults: DefaultsEntry,

    #[serde(default)]
    channels: Vec<ChannelFileEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DefaultsEntry {
    #[serde(default)]
    session_timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelFileEntry {
    name: String,

    #[serde(default, alias = "endpoint")]
    address: Option<String>,

    #[serde(default)]
    pool_size: Option<RawPoolSize>,

    #[serde(default)]
    session_timeout: Option<String>,

    #[serde(default)]
    timeouts: HashMap<String, String>,
}

/// Pool size as written in the file; validated when the pool is built so a
/// bad value only takes down its own channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPoolSize {
    Number(i64),
    Text(String),
    Other(toml::Value),
}

// -----------------------------------------------------------------------------
// ----- Internal: In-memory record --------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelRecord {
    pub name: String,
    pub address: Option<String>,
    pub pool_size: Option<RawPoolSize>,
    pub session_timeout: Option<SessionTimeout>,
    pub timeouts: HashMap<String, SessionTimeout>,
}

impl ChannelRecord {
    pub fn resolved_pool_size(&self) -> Result<usize, PoolError> {
        let invalid = |reason: String| PoolError::Configuration {
            channel: self.name.clone(),
            reason,
        };

        match &self.pool_size {
            None => Err(invalid("pool_size is missing".to_string())),
            Some(RawPoolSize::Number(n)) if *n >= 1 => usize::try_from(*n)
                .map_err(|_| invalid(format!("pool_size {n} is out of range"))),
            Some(RawPoolSize::Number(n)) => {
                Err(invalid(format!("pool_size must be positive, got {n}")))
            }
            Some(RawPoolSize::Text(text)) => match text.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(invalid(format!(
                    "pool_size '{text}' is not a positive integer"
                ))),
            },
            Some(RawPoolSize::Other(value)) => Err(invalid(format!(
                "pool_size must be an integer, got {value}"
            ))),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn parse_timeout(scope: &str, value: &str) -> Result<SessionTimeout, ChannelsError> {
    SessionTimeout::parse(value).map_err(|source| ChannelsError::InvalidTimeout {
        scope: scope.to_string(),
        value: value.to_string(),
        source,
    })
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ChannelsError {
    #[error("duplicate [[channels]] entry for channel '{name}'")]
    DuplicateChannel { name: String },

    #[error("invalid or missing field '{0}'")]
    InvalidField(String),

    #[error("invalid timeout '{value}' in {scope}: {source}")]
    InvalidTimeout {
        scope: String,
        value: String,
        source: humantime::DurationError,
    },

    #[error("read error for {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
