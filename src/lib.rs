pub mod admin;
pub mod config;
pub mod gateway;
pub mod transport;

pub use config::Config;
pub use gateway::{PoolError, PoolManager, Session};
pub use transport::{LoopbackTransport, Transport};
