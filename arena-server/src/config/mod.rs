//! Configuration module for arena-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::{
    DexConfig as FileDexConfig, DispatcherConfig as FileDispatcherConfig, FileConfig,
    GatewayConfig as FileGatewayConfig, IndexerConfig as FileIndexerConfig,
};
use crate::config::runtime::{
    DexConfig, DexRegistry, DispatcherConfig, GatewayConfig, IndexerConfig, ServerConfig,
    SharedConfig,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub indexer: IndexerConfig,
    pub dispatcher: DispatcherConfig,
    pub gateway: GatewayConfig,
}

impl LoadedConfig {
    /// Wrap the reloadable sections into their config stores.
    pub fn into_shared(self) -> (ServerConfig, SharedConfig) {
        (
            self.server,
            SharedConfig::new(self.indexer, self.dispatcher, self.gateway),
        )
    }

    /// Push reloaded sections into already running config stores.
    pub async fn apply_to(self, shared: &SharedConfig) {
        let indexer = shared.indexer.update(self.indexer).await;
        let dispatcher = shared.dispatcher.update(self.dispatcher).await;
        let gateway = shared.gateway.update(self.gateway).await;
        tracing::debug!(indexer, dispatcher, gateway, "Config store versions bumped");
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read the TOML file, apply CLI overrides, validate and build the
    /// runtime configuration.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if !config.indexer.enabled && !config.gateway.enabled {
        return Err(ConfigError::ValidationError(
            "both [indexer] and [gateway] are disabled".into(),
        ));
    }
    if config.store.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "store.max_connections must be positive".into(),
        ));
    }
    if config.gateway.dedupe_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "gateway.dedupe_capacity must be positive".into(),
        ));
    }
    if let Some(dispatcher) = &config.dispatcher
        && dispatcher.timeout_secs == 0
    {
        return Err(ConfigError::ValidationError(
            "dispatcher.timeout_secs must be positive".into(),
        ));
    }

    let mut seen = HashSet::new();
    for dex in &config.indexer.dexes {
        if !seen.insert(dex.address) {
            return Err(ConfigError::ValidationError(format!(
                "dex {} is configured more than once",
                dex.address
            )));
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let listen = file_config.server.listen;
    let dispatcher = match file_config.dispatcher {
        Some(dispatcher) => convert_dispatcher(dispatcher),
        None => DispatcherConfig::new(local_webhook_endpoint(listen)?),
    };

    Ok(LoadedConfig {
        server: ServerConfig {
            listen,
            store: file_config.store.backend,
            max_connections: file_config.store.max_connections,
            indexer_enabled: file_config.indexer.enabled,
            gateway_enabled: file_config.gateway.enabled,
        },
        indexer: convert_indexer(file_config.indexer),
        dispatcher,
        gateway: convert_gateway(file_config.gateway),
    })
}

/// The webhook receiver of this very process, used when no `[dispatcher]`
/// section is given.
fn local_webhook_endpoint(listen: SocketAddr) -> Result<Url, ConfigError> {
    let host = if listen.ip().is_unspecified() {
        "127.0.0.1".to_owned()
    } else {
        match listen {
            SocketAddr::V4(v4) => v4.ip().to_string(),
            SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        }
    };
    let endpoint = format!("http://{host}:{}/webhooks/indexer", listen.port());
    Url::parse(&endpoint).map_err(|e| ConfigError::ValidationError(e.to_string()))
}

fn secret_bytes(secret: Option<String>) -> Option<Box<[u8]>> {
    secret
        .filter(|s| !s.is_empty())
        .map(|s| s.into_bytes().into_boxed_slice())
}

fn convert_indexer(i: FileIndexerConfig) -> IndexerConfig {
    IndexerConfig {
        ingest_secret: secret_bytes(i.ingest_secret),
        dexes: DexRegistry::new(i.dexes.into_iter().map(convert_dex)),
    }
}

fn convert_dex(d: FileDexConfig) -> DexConfig {
    DexConfig {
        address: d.address,
        kind: d.kind,
        native_collateral: d.native_collateral,
    }
}

fn convert_dispatcher(d: FileDispatcherConfig) -> DispatcherConfig {
    DispatcherConfig {
        endpoint: d.endpoint,
        secret: secret_bytes(d.secret),
        timeout: Duration::from_secs(d.timeout_secs),
    }
}

fn convert_gateway(g: FileGatewayConfig) -> GatewayConfig {
    GatewayConfig {
        webhook_secret: secret_bytes(g.webhook_secret),
        max_webhook_age: g.max_webhook_age_secs.map(Duration::from_secs),
        dedupe_capacity: g.dedupe_capacity,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::StoreBackend;
    use alloy_primitives::address;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("unused.toml", None)
    }

    #[test]
    fn converts_sections_into_runtime_types() {
        let loaded = loader()
            .load_str(
                r#"
[store]
backend = "memory"

[indexer]
ingest_secret = "ingest"

[[indexer.dex]]
address = "0x00000000000000000000000000000000000000dd"
kind = "perpetual_v1"

[dispatcher]
endpoint = "https://control.example.com/webhooks/indexer"
secret = ""
timeout_secs = 3

[gateway]
webhook_secret = "shared"
max_webhook_age_secs = 60
"#,
            )
            .unwrap();

        assert_eq!(loaded.server.store, StoreBackend::Memory);
        assert_eq!(loaded.indexer.ingest_secret.as_deref(), Some(&b"ingest"[..]));
        assert!(
            loaded
                .indexer
                .dexes
                .get(&address!("00000000000000000000000000000000000000dd"))
                .is_some()
        );
        // An empty secret means unsigned.
        assert!(!loaded.dispatcher.is_signed());
        assert_eq!(loaded.dispatcher.timeout, Duration::from_secs(3));
        assert_eq!(loaded.gateway.max_webhook_age, Some(Duration::from_secs(60)));
    }

    #[test]
    fn missing_dispatcher_targets_own_receiver() {
        let loaded = ConfigLoader::new("unused.toml", Some("0.0.0.0:9000".parse().unwrap()))
            .load_str("")
            .unwrap();
        assert_eq!(loaded.server.listen.port(), 9000);
        assert_eq!(
            loaded.dispatcher.endpoint.as_str(),
            "http://127.0.0.1:9000/webhooks/indexer"
        );
    }

    #[test]
    fn rejects_invalid_configs() {
        let cases = [
            "[indexer]\nenabled = false\n[gateway]\nenabled = false\n",
            "[gateway]\ndedupe_capacity = 0\n",
            "[dispatcher]\nendpoint = \"http://localhost/\"\ntimeout_secs = 0\n",
            r#"
[[indexer.dex]]
address = "0x00000000000000000000000000000000000000dd"
kind = "perpetual_v1"

[[indexer.dex]]
address = "0x00000000000000000000000000000000000000dd"
kind = "perpetual_v1"
"#,
        ];
        for case in cases {
            let err = loader().load_str(case).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{case}");
        }
    }
}
