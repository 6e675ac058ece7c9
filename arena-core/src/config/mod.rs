//! Runtime configuration types.
//!
//! These are the validated values the pipeline runs with. Parsing the TOML
//! file and turning it into these types is the server crate's job.

mod config_store;
mod dispatcher;
mod gateway;
mod indexer;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use dispatcher::{DEFAULT_DISPATCH_TIMEOUT, DispatcherConfig};
pub use gateway::{DEFAULT_DEDUPE_CAPACITY, GatewayConfig};
pub use indexer::{DexConfig, DexKind, DexRegistry, IndexerConfig};

/// Reloadable sections, each behind its own store so a reload of one does
/// not block readers of another.
#[derive(Clone)]
pub struct SharedConfig {
    pub indexer: ConfigStore<IndexerConfig>,
    pub dispatcher: ConfigStore<DispatcherConfig>,
    pub gateway: ConfigStore<GatewayConfig>,
}

impl SharedConfig {
    pub fn new(
        indexer: IndexerConfig,
        dispatcher: DispatcherConfig,
        gateway: GatewayConfig,
    ) -> Self {
        Self {
            indexer: ConfigStore::new(indexer),
            dispatcher: ConfigStore::new(dispatcher),
            gateway: ConfigStore::new(gateway),
        }
    }
}
