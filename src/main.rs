use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use ipcgate::admin::format_pool_stats;
use ipcgate::gateway::PoolError;
use ipcgate::{Config, LoopbackTransport, PoolManager};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "ipcgate";
const PROBE_SERVICE_NAME: &str = "Probe";
const PROBE_SERVICE_ID: &str = "probe";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = Config::load()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    init_tracing(&config);

    let manager = PoolManager::new(LoopbackTransport::new(), config.channels.clone());

    setup(&manager).await;

    if config.probe {
        probe(&manager).await;
    }

    run_forever(&manager).await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(config.log_level.as_str())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

async fn setup(manager: &PoolManager<LoopbackTransport>) {
    // Failed channels stay disabled; the rest keep serving.
    if let Err(err) = manager.initialize().await {
        match err {
            PoolError::Initialization { failures } => {
                for failure in failures {
                    error!("{APP_NAME}: {failure}");
                }
            }
            other => error!("{APP_NAME}: {other}"),
        }
    }

    info!(
        "{APP_NAME} pools:\n{}",
        format_pool_stats(&manager.snapshot().await)
    );
}

async fn probe(manager: &PoolManager<LoopbackTransport>) {
    for channel in manager.channel_names() {
        match manager
            .acquire(channel, PROBE_SERVICE_NAME, PROBE_SERVICE_ID)
            .await
        {
            Ok(session) => {
                info!("probe {channel}: {} ok", session.key());
                manager.release(&session).await;
            }
            Err(err) => warn!("probe {channel}: {err}"),
        }
    }

    info!(
        "{APP_NAME} pools after probe:\n{}",
        format_pool_stats(&manager.snapshot().await)
    );
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever(manager: &PoolManager<LoopbackTransport>) -> std::io::Result<()> {
    info!(
        "{APP_NAME} serving {} channel(s); ctrl-c to stop",
        manager.snapshot().await.len()
    );

    signal::ctrl_c().await?;

    info!(
        "{APP_NAME} shutting down with {} outstanding session(s)",
        manager.outstanding_sessions()
    );
    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
