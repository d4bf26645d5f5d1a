use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::timeouts::SessionTimeout;
use crate::transport::RemoteSession;

// -----------------------------------------------------------------------------
// ----- SessionKey ------------------------------------------------------------

/// Process-unique identity of a handed-out session. Transport session tokens
/// are only unique per link, so the registry keys on this instead. Keys come
/// from one process-wide counter, so no two registries ever share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

/// Handle returned by `PoolManager::acquire`. Pass it back to `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    key: SessionKey,
    channel: Arc<str>,
    service_name: String,
    service_id: String,
    remote: RemoteSession,
    timeout: SessionTimeout,
}

impl Session {
    pub(crate) fn new(
        key: SessionKey,
        channel: Arc<str>,
        service_name: &str,
        service_id: &str,
        remote: RemoteSession,
        timeout: SessionTimeout,
    ) -> Self {
        Self {
            key,
            channel,
            service_name: service_name.to_string(),
            service_id: service_id.to_string(),
            remote,
            timeout,
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn remote(&self) -> RemoteSession {
        self.remote
    }

    pub fn timeout(&self) -> SessionTimeout {
        self.timeout
    }
}

// -----------------------------------------------------------------------------
// ----- Lease -----------------------------------------------------------------

/// Where an open session lives: its channel and the index of the connection
/// that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub channel: Arc<str>,
    pub connection: usize,
    pub remote: RemoteSession,
}

// -----------------------------------------------------------------------------
// ----- SessionRegistry -------------------------------------------------------

/// Reverse index from open sessions to the connection that owns them.
///
/// Sharded map, so lookups for one channel never wait on another channel's
/// pool lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: DashMap<SessionKey, Lease>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_key(&self) -> SessionKey {
        SessionKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn record(&self, key: SessionKey, lease: Lease) {
        self.entries.insert(key, lease);
    }

    pub fn lookup(&self, key: SessionKey) -> Option<Lease> {
        self.entries.get(&key).map(|entry| entry.value().clone())
    }

    pub fn forget(&self, key: SessionKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Lookup and forget in one step. Of two racing callers exactly one gets
    /// the lease.
    pub fn take(&self, key: SessionKey) -> Option<Lease> {
        self.entries.remove(&key).map(|(_, lease)| lease)
    }

    pub fn contains(&self, key: SessionKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
