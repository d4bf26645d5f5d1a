use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{RemoteSession, Transport, TransportError};
use crate::gateway::{ChannelAddress, SessionTimeout};

// -----------------------------------------------------------------------------
// ----- LoopbackTransport -----------------------------------------------------

/// In-process transport. Every link is accepted unless its endpoint was
/// marked unreachable; sessions live in a shared table so callers can audit
/// what is still open.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    next_link: AtomicU64,
    next_session: AtomicU64,
}

#[derive(Debug, Default)]
struct LoopbackState {
    unreachable: HashSet<String>,
    rejected_services: HashSet<String>,
    failing_timeouts: HashSet<String>,
    session_cap: Option<usize>,
    links_opened: usize,
    per_link: HashMap<u64, usize>,
    live: HashMap<RemoteSession, LiveSession>,
}

#[derive(Debug, Clone)]
struct LiveSession {
    link: u64,
    service_id: String,
    timeout: Option<SessionTimeout>,
}

#[derive(Debug)]
pub struct LoopbackLink {
    id: u64,
}

// -----------------------------------------------------------------------------
// ----- LoopbackTransport: Builder --------------------------------------------

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `open` fails for this endpoint.
    pub fn with_unreachable(mut self, endpoint: impl Into<String>) -> Self {
        self.state.get_mut().unreachable.insert(endpoint.into());
        self
    }

    /// `create_session` fails for this service id.
    pub fn with_rejected_service(mut self, service_id: impl Into<String>) -> Self {
        self.state.get_mut().rejected_services.insert(service_id.into());
        self
    }

    /// `set_timeout` fails for sessions of this service id.
    pub fn with_failing_timeout(mut self, service_id: impl Into<String>) -> Self {
        self.state.get_mut().failing_timeouts.insert(service_id.into());
        self
    }

    /// Links refuse new sessions once this many are open on them.
    pub fn with_session_cap(mut self, cap: usize) -> Self {
        self.state.get_mut().session_cap = Some(cap);
        self
    }
}

// -----------------------------------------------------------------------------
// ----- LoopbackTransport: Audit ----------------------------------------------

impl LoopbackTransport {
    pub fn links_opened(&self) -> usize {
        self.state.lock().links_opened
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn is_live(&self, session: RemoteSession) -> bool {
        self.state.lock().live.contains_key(&session)
    }

    /// Drops `session` the way the backend does once its timeout fires.
    pub fn expire(&self, session: RemoteSession) -> bool {
        let mut state = self.state.lock();
        let Some(live) = state.live.remove(&session) else {
            return false;
        };
        if let Some(count) = state.per_link.get_mut(&live.link) {
            *count = count.saturating_sub(1);
        }
        true
    }

    pub fn timeout_of(&self, session: RemoteSession) -> Option<SessionTimeout> {
        self.state
            .lock()
            .live
            .get(&session)
            .and_then(|live| live.timeout)
    }
}

// -----------------------------------------------------------------------------
// ----- LoopbackTransport: Transport ------------------------------------------

impl Transport for LoopbackTransport {
    type Link = LoopbackLink;

    async fn open(&self, address: &ChannelAddress) -> Result<LoopbackLink, TransportError> {
        let mut state = self.state.lock();
        if state.unreachable.contains(address.endpoint()) {
            return Err(TransportError::Unreachable {
                endpoint: address.endpoint().to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let id = self.next_link.fetch_add(1, Ordering::Relaxed) + 1;
        state.links_opened += 1;
        state.per_link.insert(id, 0);

        Ok(LoopbackLink { id })
    }

    async fn create_session(
        &self,
        link: &LoopbackLink,
        _service_name: &str,
        service_id: &str,
    ) -> Result<RemoteSession, TransportError> {
        let mut state = self.state.lock();
        if state.rejected_services.contains(service_id) {
            return Err(TransportError::Rejected {
                service_id: service_id.to_string(),
                reason: "service refused the session".to_string(),
            });
        }

        let open_on_link = state.per_link.get(&link.id).copied().unwrap_or(0);
        if state.session_cap.is_some_and(|cap| open_on_link >= cap) {
            return Err(TransportError::Rejected {
                service_id: service_id.to_string(),
                reason: format!("backend overloaded ({open_on_link} sessions on link)"),
            });
        }

        let session = RemoteSession(self.next_session.fetch_add(1, Ordering::Relaxed) + 1);
        *state.per_link.entry(link.id).or_insert(0) += 1;
        state.live.insert(
            session,
            LiveSession {
                link: link.id,
                service_id: service_id.to_string(),
                timeout: None,
            },
        );

        Ok(session)
    }

    async fn destroy_session(
        &self,
        link: &LoopbackLink,
        session: RemoteSession,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match state.live.get(&session) {
            Some(live) if live.link == link.id => {}
            _ => return Err(TransportError::UnknownSession(session)),
        }

        state.live.remove(&session);
        if let Some(count) = state.per_link.get_mut(&link.id) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn set_timeout(
        &self,
        link: &LoopbackLink,
        session: RemoteSession,
        timeout: SessionTimeout,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let service_id = match state.live.get(&session) {
            Some(live) if live.link == link.id => live.service_id.clone(),
            _ => return Err(TransportError::UnknownSession(session)),
        };

        if state.failing_timeouts.contains(&service_id) {
            return Err(TransportError::Rejected {
                service_id,
                reason: format!("cannot apply timeout {timeout}"),
            });
        }

        if let Some(live) = state.live.get_mut(&session) {
            live.timeout = Some(timeout);
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
