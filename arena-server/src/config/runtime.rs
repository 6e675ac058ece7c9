//! Runtime configuration re-exports and the server-only settings.
//!
//! The pipeline's reloadable types are defined in `arena_core::config`.
//! Everything here is read once at startup.

pub use arena_core::config::{
    DexConfig, DexRegistry, DispatcherConfig, GatewayConfig, IndexerConfig, SharedConfig,
};

pub use super::file::StoreBackend;
use std::net::SocketAddr;

/// Settings that only take effect on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub store: StoreBackend,
    pub max_connections: u32,
    /// Run the ingestion endpoint, the enricher and the dispatch queue.
    pub indexer_enabled: bool,
    /// Run the webhook receiver and the real-time gateway.
    pub gateway_enabled: bool,
}
