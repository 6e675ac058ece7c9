//! Indexer-side configuration: ingestion and the DEX contracts whose calls
//! can be re-encoded.

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// ABI family of a DEX contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexKind {
    /// `openPosition(address,bool,uint256,uint256)` / `closePosition(uint256)`.
    PerpetualV1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexConfig {
    pub address: Address,
    pub kind: DexKind,
    /// Collateral is sent as native value with `openPosition`.
    pub native_collateral: bool,
}

/// DEX contracts keyed by address.
#[derive(Debug, Clone, Default)]
pub struct DexRegistry {
    dexes: HashMap<Address, DexConfig>,
}

impl DexRegistry {
    pub fn new(dexes: impl IntoIterator<Item = DexConfig>) -> Self {
        Self {
            dexes: dexes.into_iter().map(|d| (d.address, d)).collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&DexConfig> {
        self.dexes.get(address)
    }

    pub fn len(&self) -> usize {
        self.dexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dexes.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexerConfig {
    /// When set, `POST /events` bodies must carry a valid signature.
    pub ingest_secret: Option<Box<[u8]>>,
    pub dexes: DexRegistry,
}
