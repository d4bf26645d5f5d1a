use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::directory::ChannelAddress;
use super::errors::PoolError;
use super::timeouts::SessionTimeout;
use crate::transport::{RemoteSession, Transport, TransportError};

// -----------------------------------------------------------------------------
// ----- PoolStats -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub endpoint: String,
    pub connections: usize,
    pub sessions: usize,
    pub loads: Vec<usize>,
}

// -----------------------------------------------------------------------------
// ----- ChannelPool -----------------------------------------------------------

/// Fixed set of connections for one channel.
///
/// `loads[i]` counts the sessions open on `connections[i]`. Selection, the
/// session-creating transport call, and every counter change happen while
/// holding `loads`, so two acquirers never act on the same observed count.
pub struct ChannelPool<T: Transport> {
    address: ChannelAddress,
    connections: Vec<Connection<T>>,
    loads: Mutex<Vec<usize>>,
}

impl<T: Transport> ChannelPool<T> {
    pub async fn init(
        transport: Arc<T>,
        address: ChannelAddress,
        size: usize,
    ) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::Configuration {
                channel: address.name().to_string(),
                reason: "pool size must be at least 1".to_string(),
            });
        }

        info!("warming channel {address}: opening {size} connections");

        let mut connections = Vec::with_capacity(size);
        for index in 0..size {
            let conn = Connection::open(transport.clone(), address.clone(), index).await?;
            connections.push(conn);
        }

        Ok(Self {
            address,
            connections,
            loads: Mutex::new(vec![0; size]),
        })
    }

    pub fn name(&self) -> &str {
        self.address.name()
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub async fn loads(&self) -> Vec<usize> {
        self.loads.lock().await.clone()
    }

    pub async fn stats(&self) -> PoolStats {
        let loads = self.loads().await;

        PoolStats {
            name: self.address.name().to_string(),
            endpoint: self.address.endpoint().to_string(),
            connections: self.connections.len(),
            sessions: loads.iter().sum(),
            loads,
        }
    }

    /// Picks the least-loaded connection, opens a session on it and charges
    /// it one unit of load. Returns the session and the connection index.
    pub async fn select_and_acquire(
        &self,
        service_name: &str,
        service_id: &str,
    ) -> Result<(RemoteSession, usize), PoolError> {
        let mut loads = self.loads.lock().await;

        let index = least_loaded(&loads).ok_or_else(|| PoolError::Configuration {
            channel: self.address.name().to_string(),
            reason: "pool has no connections".to_string(),
        })?;

        let session = self.connections[index]
            .new_session(service_name, service_id)
            .await?;
        loads[index] += 1;

        debug!(
            "channel {}: {service_name}/{service_id} -> connection {index} (load {})",
            self.address.name(),
            loads[index]
        );

        Ok((session, index))
    }

    /// Destroys `session` on connection `index` and gives back its unit of
    /// load. Callers release each lease once; a counter already at zero is
    /// left alone.
    pub async fn release(&self, index: usize, session: RemoteSession) {
        let Some(conn) = self.connections.get(index) else {
            warn!(
                "channel {}: release of {session} names connection {index}, pool has {}",
                self.address.name(),
                self.connections.len()
            );
            return;
        };

        let mut loads = self.loads.lock().await;

        // A session the backend already expired still holds its unit of load.
        if let Err(err) = conn.destroy_session(session).await {
            warn!(
                "channel {}: destroying {session} on connection {index} failed: {err}",
                self.address.name()
            );
        }

        match loads[index].checked_sub(1) {
            Some(next) => loads[index] = next,
            None => warn!(
                "channel {}: connection {index} released {session} with no open sessions",
                self.address.name()
            ),
        }
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, Vec<usize>> {
        self.loads.lock().await
    }

    pub async fn apply_timeout(
        &self,
        index: usize,
        session: RemoteSession,
        timeout: SessionTimeout,
    ) -> Result<(), TransportError> {
        match self.connections.get(index) {
            Some(conn) => conn.set_timeout(session, timeout).await,
            None => Err(TransportError::UnknownSession(session)),
        }
    }
}

impl<T: Transport> fmt::Debug for ChannelPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPool")
            .field("address", &self.address)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- Selection -------------------------------------------------------------

/// First idle connection if there is one, else the first connection holding
/// the minimum load. `None` only for an empty slice.
pub(crate) fn least_loaded(loads: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (index, &load) in loads.iter().enumerate() {
        if load == 0 {
            return Some(index);
        }
        match best {
            Some((_, min)) if min <= load => {}
            _ => best = Some((index, load)),
        }
    }

    best.map(|(index, _)| index)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
