pub mod connection;
pub mod directory;
pub mod errors;
pub mod manager;
pub mod pool;
pub mod session;
pub mod timeouts;

pub use connection::Connection;
pub use directory::{ChannelAddress, ChannelDirectory};
pub use errors::PoolError;
pub use manager::PoolManager;
pub use pool::{ChannelPool, PoolStats};
pub use session::{Lease, Session, SessionKey, SessionRegistry};
pub use timeouts::{SessionTimeout, TimeoutPolicy};

// Session lifecycle between request handlers and channel backends; transport
// specifics stay in `transport`.
