//! TOML file configuration structures.
//!
//! These structs directly map to the `arena-config.toml` file format.

use alloy_primitives::Address;
use arena_core::config::{DEFAULT_DEDUPE_CAPACITY, DexKind};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    /// Absent means "deliver to this process's own webhook receiver".
    #[serde(default)]
    pub dispatcher: Option<DispatcherConfig>,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

/// Entity store section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

/// Indexer side: chain event ingestion and enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// HMAC key for `POST /events`. Ingestion is unauthenticated when absent.
    #[serde(default)]
    pub ingest_secret: Option<String>,
    #[serde(default, rename = "dex")]
    pub dexes: Vec<DexConfig>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ingest_secret: None,
            dexes: Vec::new(),
        }
    }
}

/// A DEX contract whose position calls can be re-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    pub address: Address,
    pub kind: DexKind,
    #[serde(default)]
    pub native_collateral: bool,
}

/// Outbound webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub endpoint: Url,
    /// HMAC key. Webhooks go out unsigned when absent.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Control plane: webhook receiver and real-time fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub max_webhook_age_secs: Option<u64>,
    #[serde(default = "default_dedupe_capacity")]
    pub dedupe_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_secret: None,
            max_webhook_age_secs: None,
            dedupe_capacity: default_dedupe_capacity(),
        }
    }
}

fn default_dedupe_capacity() -> usize {
    DEFAULT_DEDUPE_CAPACITY
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[store]
backend = "memory"

[indexer]
ingest_secret = "ingest"

[[indexer.dex]]
address = "0x00000000000000000000000000000000000000dd"
kind = "perpetual_v1"
native_collateral = true

[dispatcher]
endpoint = "https://control.example.com/webhooks/indexer"
secret = "shared"
timeout_secs = 5

[gateway]
webhook_secret = "shared"
max_webhook_age_secs = 300
dedupe_capacity = 128
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.indexer.enabled);
        assert_eq!(config.indexer.dexes.len(), 1);
        assert!(config.indexer.dexes[0].native_collateral);
        let dispatcher = config.dispatcher.unwrap();
        assert_eq!(dispatcher.timeout_secs, 5);
        assert_eq!(config.gateway.max_webhook_age_secs, Some(300));
        assert_eq!(config.gateway.dedupe_capacity, 128);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.max_connections, 10);
        assert!(config.indexer.enabled);
        assert!(config.gateway.enabled);
        assert!(config.dispatcher.is_none());
        assert_eq!(config.gateway.dedupe_capacity, DEFAULT_DEDUPE_CAPACITY);
    }

    #[test]
    fn test_unknown_dex_kind_is_rejected() {
        let toml_str = r#"
[[indexer.dex]]
address = "0x00000000000000000000000000000000000000dd"
kind = "orderbook"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
