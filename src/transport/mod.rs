use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::gateway::{ChannelAddress, SessionTimeout};

pub mod loopback;

pub use loopback::{LoopbackLink, LoopbackTransport};

// -----------------------------------------------------------------------------
// ----- Transport -------------------------------------------------------------

/// The IPC library the gateway orchestrates.
///
/// A `Link` is one physical connection to a backend. Sessions are units of
/// work allocated on a link; the transport identifies them by a
/// [`RemoteSession`] token that is only meaningful together with the link
/// that produced it.
pub trait Transport: Send + Sync + 'static {
    type Link: Send + Sync + 'static;

    fn open(
        &self,
        address: &ChannelAddress,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;

    fn create_session(
        &self,
        link: &Self::Link,
        service_name: &str,
        service_id: &str,
    ) -> impl Future<Output = Result<RemoteSession, TransportError>> + Send;

    fn destroy_session(
        &self,
        link: &Self::Link,
        session: RemoteSession,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_timeout(
        &self,
        link: &Self::Link,
        session: RemoteSession,
        timeout: SessionTimeout,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// -----------------------------------------------------------------------------
// ----- RemoteSession ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteSession(pub u64);

impl fmt::Display for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote#{}", self.0)
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("service '{service_id}' rejected the request: {reason}")]
    Rejected { service_id: String, reason: String },

    #[error("unknown session {0}")]
    UnknownSession(RemoteSession),
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
