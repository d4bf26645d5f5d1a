use std::collections::HashMap;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{OnceCell, oneshot};
use tracing::{debug, error, info, warn};

use super::directory::{ChannelAddress, ChannelDirectory};
use super::errors::PoolError;
use super::pool::{ChannelPool, PoolStats};
use super::session::{Lease, Session, SessionKey, SessionRegistry};
use super::timeouts::{SessionTimeout, TimeoutPolicy};
use crate::config::channels::{ChannelRecord, ChannelsConfig};
use crate::transport::Transport;

type Pools<T> = HashMap<String, Arc<ChannelPool<T>>>;

// -----------------------------------------------------------------------------
// ----- PoolManager -----------------------------------------------------------

/// Owns every channel pool and the session registry.
///
/// Starts uninitialized; `initialize` builds the pools once and opens the
/// readiness gate. Channels whose pool cannot be built stay disabled while
/// the rest serve traffic.
pub struct PoolManager<T: Transport> {
    transport: Arc<T>,
    config: ChannelsConfig,
    directory: ChannelDirectory,
    timeouts: TimeoutPolicy,
    pools: OnceCell<Pools<T>>,
    registry: Arc<SessionRegistry>,
}

// -----------------------------------------------------------------------------
// ----- PoolManager: Static ---------------------------------------------------

impl<T: Transport> PoolManager<T> {
    pub fn new(transport: T, config: ChannelsConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    pub fn with_shared_transport(transport: Arc<T>, config: ChannelsConfig) -> Self {
        let directory = ChannelDirectory::from_config(&config);
        let timeouts = config.timeout_policy();

        Self {
            transport,
            config,
            directory,
            timeouts,
            pools: OnceCell::new(),
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PoolManager: Lifecycle ------------------------------------------------

impl<T: Transport> PoolManager<T> {
    /// Builds one pool per configured channel. Only the first call does any
    /// work; it reports every channel that failed, after the healthy ones are
    /// already serving. Later calls return `Ok(())`.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let mut failures = Vec::new();
        let slot = &mut failures;

        self.pools
            .get_or_init(|| async move {
                let (pools, failed) = self.build_pools().await;
                *slot = failed;
                pools
            })
            .await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Initialization { failures })
        }
    }

    pub fn is_ready(&self) -> bool {
        self.pools.initialized()
    }

    async fn build_pools(&self) -> (Pools<T>, Vec<PoolError>) {
        let mut pools = HashMap::with_capacity(self.config.channels().len());
        let mut failures = Vec::new();

        for record in self.config.channels() {
            match self.build_pool(record).await {
                Ok(pool) => {
                    pools.insert(record.name.clone(), Arc::new(pool));
                }
                Err(err) => {
                    error!("channel {} disabled: {err}", record.name);
                    failures.push(err);
                }
            }
        }

        info!(
            "pool manager ready: {} of {} channels up",
            pools.len(),
            self.config.channels().len()
        );

        (pools, failures)
    }

    async fn build_pool(&self, record: &ChannelRecord) -> Result<ChannelPool<T>, PoolError> {
        let address = self.directory.resolve(&record.name)?;
        let size = record.resolved_pool_size()?;
        ChannelPool::init(self.transport.clone(), address, size).await
    }
}

// -----------------------------------------------------------------------------
// ----- PoolManager: Sessions -------------------------------------------------

impl<T: Transport> PoolManager<T> {
    /// Hands out a session on the least-loaded connection of `channel`. Every
    /// failure comes back as [`PoolError::Acquisition`]; nothing is retried.
    pub async fn acquire(
        &self,
        channel: &str,
        service_name: &str,
        service_id: &str,
    ) -> Result<Session, PoolError> {
        self.try_acquire(channel, service_name, service_id)
            .await
            .map_err(|source| PoolError::Acquisition {
                channel: channel.to_string(),
                service_name: service_name.to_string(),
                service_id: service_id.to_string(),
                source: Box::new(source),
            })
    }

    async fn try_acquire(
        &self,
        channel: &str,
        service_name: &str,
        service_id: &str,
    ) -> Result<Session, PoolError> {
        let pools = self.pools.get().ok_or(PoolError::NotInitialized)?;
        let address = self.directory.resolve(channel)?;
        let pool = pools
            .get(address.name())
            .cloned()
            .ok_or_else(|| PoolError::ChannelUnavailable {
                channel: channel.to_string(),
            })?;

        let timeout = self.timeouts.lookup(channel, service_id);
        let (tx, rx) = oneshot::channel();
        let pending = PendingSession {
            rx,
            pool: pool.clone(),
            registry: self.registry.clone(),
        };

        let registry = self.registry.clone();
        let service_name = service_name.to_string();
        let service_id = service_id.to_string();

        // Runs to completion even if the caller is dropped mid-acquire.
        tokio::spawn(async move {
            let outcome = open_session(
                &pool,
                &registry,
                &address,
                &service_name,
                &service_id,
                timeout,
            )
            .await;

            if let Err(Ok(session)) = tx.send(outcome) {
                debug!("{} abandoned by its caller, releasing", session.key());
                reclaim(&pool, &registry, session.key()).await;
            }
        });

        pending.recv(channel).await
    }

    /// Tears `session` down on the connection that created it. Unknown or
    /// already released sessions are ignored.
    pub async fn release(&self, session: &Session) {
        let Some(pools) = self.pools.get() else {
            debug!("release of {} before initialize ignored", session.key());
            return;
        };

        let key = session.key();
        let Some(lease) = self.registry.take(key) else {
            debug!("release of unknown {key} ignored");
            return;
        };

        let Some(pool) = pools.get(&*lease.channel).cloned() else {
            warn!("{key} names channel {} which has no pool", lease.channel);
            return;
        };

        // Runs to completion even if the caller is dropped mid-release.
        let teardown =
            tokio::spawn(async move { pool.release(lease.connection, lease.remote).await });
        if let Err(err) = teardown.await {
            warn!("teardown of {key} did not finish: {err}");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PoolManager: Introspection --------------------------------------------

impl<T: Transport> PoolManager<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn outstanding_sessions(&self) -> usize {
        self.registry.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.directory.names()
    }

    pub fn pool(&self, channel: &str) -> Option<Arc<ChannelPool<T>>> {
        self.pools.get()?.get(channel).cloned()
    }

    pub async fn snapshot(&self) -> Vec<PoolStats> {
        let Some(pools) = self.pools.get() else {
            return Vec::new();
        };

        let mut stats = Vec::with_capacity(pools.len());
        for pool in pools.values() {
            stats.push(pool.stats().await);
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Session setup -----------------------------------------------

/// Receiving end of a spawned acquire. Dropped before the session reaches the
/// caller, it gives the session back.
struct PendingSession<T: Transport> {
    rx: oneshot::Receiver<Result<Session, PoolError>>,
    pool: Arc<ChannelPool<T>>,
    registry: Arc<SessionRegistry>,
}

impl<T: Transport> PendingSession<T> {
    async fn recv(mut self, channel: &str) -> Result<Session, PoolError> {
        (&mut self.rx).await.unwrap_or_else(|_| {
            Err(PoolError::Interrupted {
                channel: channel.to_string(),
            })
        })
    }
}

impl<T: Transport> Drop for PendingSession<T> {
    fn drop(&mut self) {
        self.rx.close();
        let Ok(Ok(session)) = self.rx.try_recv() else {
            return;
        };

        let key = session.key();
        match Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                let registry = self.registry.clone();
                handle.spawn(async move { reclaim(&pool, &registry, key).await });
            }
            Err(_) => warn!("{key} dropped outside the runtime, cannot release it"),
        }
    }
}

async fn reclaim<T: Transport>(
    pool: &ChannelPool<T>,
    registry: &SessionRegistry,
    key: SessionKey,
) {
    if let Some(lease) = registry.take(key) {
        pool.release(lease.connection, lease.remote).await;
    }
}

/// Creates the session, records it and applies its timeout. A failed timeout
/// rolls the session back before the error is returned.
async fn open_session<T: Transport>(
    pool: &ChannelPool<T>,
    registry: &SessionRegistry,
    address: &ChannelAddress,
    service_name: &str,
    service_id: &str,
    timeout: SessionTimeout,
) -> Result<Session, PoolError> {
    let (remote, connection) = pool.select_and_acquire(service_name, service_id).await?;

    let key = registry.next_key();
    registry.record(
        key,
        Lease {
            channel: address.shared_name(),
            connection,
            remote,
        },
    );

    if let Err(source) = pool.apply_timeout(connection, remote, timeout).await {
        registry.forget(key);
        pool.release(connection, remote).await;
        return Err(PoolError::ApplyTimeout {
            channel: address.name().to_string(),
            service_id: service_id.to_string(),
            source,
        });
    }

    Ok(Session::new(
        key,
        address.shared_name(),
        service_name,
        service_id,
        remote,
        timeout,
    ))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LoopbackTransport, RemoteSession};
    use std::time::Duration;

    const CONFIG: &str = r#"
        [defaults]
        session_timeout = "30s"

        [[channels]]
        name = "svc"
        address = "ipc://svc"
        pool_size = 2

        [channels.timeouts]
        bulk-read = "none"
    "#;

    fn manager(transport: LoopbackTransport) -> PoolManager<LoopbackTransport> {
        PoolManager::new(transport, ChannelsConfig::parse(CONFIG).unwrap())
    }

    #[tokio::test]
    async fn acquire_before_initialize_is_refused() {
        let manager = manager(LoopbackTransport::new());
        assert!(!manager.is_ready());

        let err = manager.acquire("svc", "Svc", "get").await.unwrap_err();
        match err {
            PoolError::Acquisition { source, .. } => {
                assert!(matches!(*source, PoolError::NotInitialized));
            }
            other => panic!("expected Acquisition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn initialize_runs_once() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();

        assert!(manager.is_ready());
        assert_eq!(manager.transport().links_opened(), 2);
    }

    #[tokio::test]
    async fn timeout_policy_is_applied_per_service() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();

        let bulk = manager.acquire("svc", "Svc", "bulk-read").await.unwrap();
        let edit = manager.acquire("svc", "Svc", "edit").await.unwrap();

        assert_eq!(bulk.timeout(), SessionTimeout::Unbounded);
        assert_eq!(edit.timeout(), SessionTimeout::After(Duration::from_secs(30)));
        assert_eq!(
            manager.transport().timeout_of(edit.remote()),
            Some(SessionTimeout::After(Duration::from_secs(30)))
        );
    }

    #[tokio::test]
    async fn failed_timeout_rolls_the_session_back() {
        let manager = manager(LoopbackTransport::new().with_failing_timeout("edit"));
        manager.initialize().await.unwrap();

        let err = manager.acquire("svc", "Svc", "edit").await.unwrap_err();
        match err {
            PoolError::Acquisition { source, .. } => {
                assert!(matches!(*source, PoolError::ApplyTimeout { .. }));
            }
            other => panic!("expected Acquisition, got {other:?}"),
        }

        assert_eq!(manager.outstanding_sessions(), 0);
        assert_eq!(manager.transport().live_sessions(), 0);
        assert_eq!(manager.pool("svc").unwrap().loads().await, vec![0, 0]);
    }

    #[tokio::test]
    async fn rejected_session_is_wrapped_with_context() {
        let manager = manager(LoopbackTransport::new().with_rejected_service("export"));
        manager.initialize().await.unwrap();

        let err = manager.acquire("svc", "Export", "export").await.unwrap_err();
        match &err {
            PoolError::Acquisition {
                channel,
                service_name,
                service_id,
                source,
            } => {
                assert_eq!(channel, "svc");
                assert_eq!(service_name, "Export");
                assert_eq!(service_id, "export");
                assert!(matches!(**source, PoolError::SessionCreation { .. }));
            }
            other => panic!("expected Acquisition, got {other:?}"),
        }
        assert_eq!(err.channel(), Some("svc"));
        assert_eq!(manager.outstanding_sessions(), 0);
    }

    #[tokio::test]
    async fn unknown_channel_is_a_configuration_error() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();

        let err = manager.acquire("nope", "Svc", "get").await.unwrap_err();
        match err {
            PoolError::Acquisition { source, .. } => {
                assert!(matches!(*source, PoolError::Configuration { .. }));
            }
            other => panic!("expected Acquisition, got {other:?}"),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn release_of_expired_session_frees_its_connection() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();

        let session = manager.acquire("svc", "Svc", "get").await.unwrap();
        assert!(manager.transport().expire(session.remote()));

        manager.release(&session).await;
        assert_eq!(manager.outstanding_sessions(), 0);
        assert_eq!(manager.pool("svc").unwrap().loads().await, vec![0, 0]);
    }

    #[tokio::test]
    async fn cancelled_release_still_tears_the_session_down() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();
        let session = manager.acquire("svc", "Svc", "get").await.unwrap();
        let pool = manager.pool("svc").unwrap();

        let held = pool.hold().await;
        let cut = tokio::time::timeout(Duration::from_millis(20), manager.release(&session)).await;
        assert!(cut.is_err());
        drop(held);
        settle().await;

        manager.release(&session).await;
        assert_eq!(pool.loads().await, vec![0, 0]);
        assert_eq!(manager.outstanding_sessions(), 0);
        assert_eq!(manager.transport().live_sessions(), 0);
    }

    #[tokio::test]
    async fn cancelled_acquire_gives_its_session_back() {
        let manager = manager(LoopbackTransport::new());
        manager.initialize().await.unwrap();
        let pool = manager.pool("svc").unwrap();

        let held = pool.hold().await;
        let cut = tokio::time::timeout(
            Duration::from_millis(20),
            manager.acquire("svc", "Svc", "get"),
        )
        .await;
        assert!(cut.is_err());
        drop(held);
        settle().await;

        assert_eq!(pool.loads().await, vec![0, 0]);
        assert_eq!(manager.outstanding_sessions(), 0);
        assert_eq!(manager.transport().live_sessions(), 0);

        // The abandoned session was created and destroyed; the next one is
        // the second ever and lands on the idle first connection.
        let next = manager.acquire("svc", "Svc", "get").await.unwrap();
        assert_eq!(next.remote(), RemoteSession(2));
        assert_eq!(manager.registry().lookup(next.key()).unwrap().connection, 0);
    }

    #[tokio::test]
    async fn session_from_another_manager_is_ignored() {
        let first = manager(LoopbackTransport::new());
        let second = manager(LoopbackTransport::new());
        first.initialize().await.unwrap();
        second.initialize().await.unwrap();

        let foreign = first.acquire("svc", "Svc", "get").await.unwrap();
        let local = second.acquire("svc", "Svc", "get").await.unwrap();

        second.release(&foreign).await;
        assert!(second.registry().contains(local.key()));
        assert!(second.transport().is_live(local.remote()));
        assert_eq!(second.pool("svc").unwrap().loads().await, vec![1, 0]);
    }

    #[tokio::test]
    async fn release_before_initialize_is_a_no_op() {
        let ready = manager(LoopbackTransport::new());
        ready.initialize().await.unwrap();
        let session = ready.acquire("svc", "Svc", "get").await.unwrap();

        let cold = manager(LoopbackTransport::new());
        cold.release(&session).await;
        assert!(!cold.is_ready());
        assert_eq!(ready.outstanding_sessions(), 1);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
