use std::sync::Arc;

use ipcgate::config::ChannelsConfig;
use ipcgate::{LoopbackTransport, PoolManager};

pub type Manager = PoolManager<LoopbackTransport>;

// Builds a `[[channels]]` entry; `pool_size` is written verbatim so tests can
// feed it non-numeric values.
pub fn channel(name: &str, pool_size: &str) -> String {
    format!(
        r#"
        [[channels]]
        name = "{name}"
        address = "ipc://{name}"
        pool_size = {pool_size}
        "#
    )
}

#[allow(dead_code)]
pub fn config(entries: &[String]) -> ChannelsConfig {
    ChannelsConfig::parse(&entries.concat()).expect("valid channels config")
}

pub async fn ready_manager(transport: LoopbackTransport, entries: &[String]) -> Arc<Manager> {
    let manager = Arc::new(PoolManager::new(transport, config(entries)));
    manager.initialize().await.expect("initialize");
    manager
}

#[allow(dead_code)]
pub async fn loads(manager: &Manager, channel: &str) -> Vec<usize> {
    manager
        .pool(channel)
        .expect("channel has a pool")
        .loads()
        .await
}
