use std::fmt;
use std::sync::Arc;

use super::directory::ChannelAddress;
use super::errors::PoolError;
use super::timeouts::SessionTimeout;
use crate::transport::{RemoteSession, Transport, TransportError};

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// One physical link to a channel backend.
///
/// Load bookkeeping lives in the owning pool, next to the lock that guards
/// it; a connection only talks to the transport.
pub struct Connection<T: Transport> {
    index: usize,
    address: ChannelAddress,
    transport: Arc<T>,
    link: T::Link,
}

impl<T: Transport> Connection<T> {
    pub async fn open(
        transport: Arc<T>,
        address: ChannelAddress,
        index: usize,
    ) -> Result<Self, PoolError> {
        let link = transport
            .open(&address)
            .await
            .map_err(|source| PoolError::Transport {
                channel: address.name().to_string(),
                address: address.endpoint().to_string(),
                source,
            })?;

        Ok(Self {
            index,
            address,
            transport,
            link,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub async fn new_session(
        &self,
        service_name: &str,
        service_id: &str,
    ) -> Result<RemoteSession, PoolError> {
        self.transport
            .create_session(&self.link, service_name, service_id)
            .await
            .map_err(|source| PoolError::SessionCreation {
                channel: self.address.name().to_string(),
                service_name: service_name.to_string(),
                service_id: service_id.to_string(),
                source,
            })
    }

    pub async fn destroy_session(&self, session: RemoteSession) -> Result<(), TransportError> {
        self.transport.destroy_session(&self.link, session).await
    }

    pub async fn set_timeout(
        &self,
        session: RemoteSession,
        timeout: SessionTimeout,
    ) -> Result<(), TransportError> {
        self.transport.set_timeout(&self.link, session, timeout).await
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.index)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
