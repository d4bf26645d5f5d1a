use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::errors::PoolError;
use crate::config::channels::ChannelsConfig;

// -----------------------------------------------------------------------------
// ----- ChannelAddress --------------------------------------------------------

/// Logical channel name plus the endpoint its backend listens on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    name: Arc<str>,
    endpoint: Arc<str>,
}

impl ChannelAddress {
    pub fn new(name: impl Into<Arc<str>>, endpoint: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.endpoint)
    }
}

// -----------------------------------------------------------------------------
// ----- ChannelDirectory ------------------------------------------------------

/// Channel name to address lookup, frozen after construction.
///
/// Channels that appear in the configuration without a usable address are
/// still known here so `resolve` can say exactly what is wrong with them.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    by_name: HashMap<String, Option<ChannelAddress>>,
}

impl ChannelDirectory {
    pub fn from_config(config: &ChannelsConfig) -> Self {
        let by_name = config
            .channels()
            .iter()
            .map(|record| {
                let address = record
                    .address
                    .as_deref()
                    .map(str::trim)
                    .filter(|endpoint| !endpoint.is_empty())
                    .map(|endpoint| ChannelAddress::new(record.name.as_str(), endpoint));
                (record.name.clone(), address)
            })
            .collect();

        Self { by_name }
    }

    pub fn resolve(&self, channel: &str) -> Result<ChannelAddress, PoolError> {
        match self.by_name.get(channel) {
            Some(Some(address)) => Ok(address.clone()),
            Some(None) => Err(PoolError::Configuration {
                channel: channel.to_string(),
                reason: "no address configured".to_string(),
            }),
            None => Err(PoolError::Configuration {
                channel: channel.to_string(),
                reason: "unknown channel".to_string(),
            }),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
