use thiserror::Error;

use crate::transport::TransportError;

// -----------------------------------------------------------------------------
// ----- PoolError -------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("channel '{channel}' is misconfigured: {reason}")]
    Configuration { channel: String, reason: String },

    #[error("channel '{channel}' could not open a connection to {address}: {source}")]
    Transport {
        channel: String,
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("channel '{channel}' refused a session for {service_name}/{service_id}: {source}")]
    SessionCreation {
        channel: String,
        service_name: String,
        service_id: String,
        #[source]
        source: TransportError,
    },

    #[error("channel '{channel}' could not apply the timeout for {service_id}: {source}")]
    ApplyTimeout {
        channel: String,
        service_id: String,
        #[source]
        source: TransportError,
    },

    #[error("channel '{channel}' is unavailable; its pool failed to initialize")]
    ChannelUnavailable { channel: String },

    #[error("pool manager is not initialized")]
    NotInitialized,

    #[error("session setup on '{channel}' stopped before it produced a result")]
    Interrupted { channel: String },

    #[error("cannot acquire a session on '{channel}' for {service_name}/{service_id}: {source}")]
    Acquisition {
        channel: String,
        service_name: String,
        service_id: String,
        #[source]
        source: Box<PoolError>,
    },

    #[error("{} channel(s) failed to initialize: {}", .failures.len(), summarize(.failures))]
    Initialization { failures: Vec<PoolError> },
}

impl PoolError {
    /// The channel this error is about, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            PoolError::Configuration { channel, .. }
            | PoolError::Transport { channel, .. }
            | PoolError::SessionCreation { channel, .. }
            | PoolError::ApplyTimeout { channel, .. }
            | PoolError::ChannelUnavailable { channel }
            | PoolError::Interrupted { channel }
            | PoolError::Acquisition { channel, .. } => Some(channel.as_str()),
            PoolError::NotInitialized | PoolError::Initialization { .. } => None,
        }
    }
}

fn summarize(failures: &[PoolError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
