//! The entity store seen by the enrichment pipeline.
//!
//! The pipeline only needs "all records where field X equals value" reads and
//! idempotent inserts, so it talks to an [`EntityStore`] trait object. The
//! PostgreSQL implementation forwards to the query objects in
//! [`crate::entities`]; [`MemoryStore`] backs tests and single-process
//! deployments that do not need durability.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::entities::balance_snapshot::{GetBalanceSnapshotsByVault, InsertBalanceSnapshot};
use crate::entities::chain_event_record::{GetLastEventKey, InsertChainEvent};
use crate::entities::position_open::{GetPositionOpens, InsertPositionOpen};
use crate::entities::vault_binding::{GetVaultBindingsByAddress, InsertVaultBinding};
use crate::entities::{
    ChainEventRecord, PositionOpenRecord, VaultBalanceSnapshot, VaultBinding, normalize_address,
};
use crate::events::EventKey;
use crate::framework::DatabaseProcessor;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Shared handle used by every pipeline stage.
pub type SharedStore = Arc<dyn EntityStore>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Bindings of a vault address, insertion ordered.
    async fn vault_bindings_by_address(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBinding>, StoreError>;

    /// Balance snapshots of a vault, insertion ordered.
    async fn balance_snapshots_by_vault(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBalanceSnapshot>, StoreError>;

    /// Recorded opens of `position_id` by `vault`, insertion ordered.
    async fn position_opens_by(
        &self,
        position_id: U256,
        vault: &Address,
    ) -> Result<Vec<PositionOpenRecord>, StoreError>;

    /// Persist a raw event. `Ok(false)` when it was already stored.
    async fn insert_chain_event(&self, record: ChainEventRecord) -> Result<bool, StoreError>;

    async fn insert_vault_binding(&self, binding: VaultBinding) -> Result<bool, StoreError>;

    async fn insert_balance_snapshot(
        &self,
        snapshot: VaultBalanceSnapshot,
    ) -> Result<bool, StoreError>;

    async fn insert_position_open(&self, record: PositionOpenRecord) -> Result<bool, StoreError>;

    /// Highest persisted ordering key of a chain.
    async fn last_event_key(&self, chain_id: u64) -> Result<Option<EventKey>, StoreError>;
}

// -- PostgreSQL ---------------------------------------------------------

#[async_trait]
impl EntityStore for DatabaseProcessor {
    async fn vault_bindings_by_address(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBinding>, StoreError> {
        Ok(self
            .process(GetVaultBindingsByAddress {
                vault_address: *vault,
            })
            .await?)
    }

    async fn balance_snapshots_by_vault(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBalanceSnapshot>, StoreError> {
        Ok(self
            .process(GetBalanceSnapshotsByVault {
                vault_address: *vault,
            })
            .await?)
    }

    async fn position_opens_by(
        &self,
        position_id: U256,
        vault: &Address,
    ) -> Result<Vec<PositionOpenRecord>, StoreError> {
        Ok(self
            .process(GetPositionOpens {
                position_id,
                vault_address: *vault,
            })
            .await?)
    }

    async fn insert_chain_event(&self, record: ChainEventRecord) -> Result<bool, StoreError> {
        Ok(self.process(InsertChainEvent { record }).await?)
    }

    async fn insert_vault_binding(&self, binding: VaultBinding) -> Result<bool, StoreError> {
        Ok(self.process(InsertVaultBinding { binding }).await?)
    }

    async fn insert_balance_snapshot(
        &self,
        snapshot: VaultBalanceSnapshot,
    ) -> Result<bool, StoreError> {
        Ok(self.process(InsertBalanceSnapshot { snapshot }).await?)
    }

    async fn insert_position_open(&self, record: PositionOpenRecord) -> Result<bool, StoreError> {
        Ok(self.process(InsertPositionOpen { record }).await?)
    }

    async fn last_event_key(&self, chain_id: u64) -> Result<Option<EventKey>, StoreError> {
        Ok(self.process(GetLastEventKey { chain_id }).await?)
    }
}

// -- In-memory ----------------------------------------------------------

/// A process-local store with the same idempotency rules as the database.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    chain_events: HashMap<String, ChainEventRecord>,
    last_keys: HashMap<u64, EventKey>,
    vault_bindings: Vec<VaultBinding>,
    balance_snapshots: Vec<VaultBalanceSnapshot>,
    position_opens: Vec<PositionOpenRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    pub async fn chain_event_count(&self) -> usize {
        self.inner.read().await.chain_events.len()
    }
}

fn same_address(a: &Address, b: &Address) -> bool {
    normalize_address(a) == normalize_address(b)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn vault_bindings_by_address(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBinding>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .vault_bindings
            .iter()
            .filter(|b| same_address(&b.vault_address, vault))
            .cloned()
            .collect())
    }

    async fn balance_snapshots_by_vault(
        &self,
        vault: &Address,
    ) -> Result<Vec<VaultBalanceSnapshot>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .balance_snapshots
            .iter()
            .filter(|s| same_address(&s.vault_address, vault))
            .cloned()
            .collect())
    }

    async fn position_opens_by(
        &self,
        position_id: U256,
        vault: &Address,
    ) -> Result<Vec<PositionOpenRecord>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .position_opens
            .iter()
            .filter(|p| p.position_id == position_id && same_address(&p.vault_address, vault))
            .cloned()
            .collect())
    }

    async fn insert_chain_event(&self, record: ChainEventRecord) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        if tables.chain_events.contains_key(&record.event_id) {
            return Ok(false);
        }
        let key = record.key();
        tables
            .last_keys
            .entry(record.chain_id)
            .and_modify(|last| *last = (*last).max(key))
            .or_insert(key);
        tables.chain_events.insert(record.event_id.clone(), record);
        Ok(true)
    }

    async fn insert_vault_binding(&self, binding: VaultBinding) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        if tables
            .vault_bindings
            .iter()
            .any(|b| b.event_id == binding.event_id)
        {
            return Ok(false);
        }
        tables.vault_bindings.push(binding);
        Ok(true)
    }

    async fn insert_balance_snapshot(
        &self,
        snapshot: VaultBalanceSnapshot,
    ) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        if tables
            .balance_snapshots
            .iter()
            .any(|s| s.event_id == snapshot.event_id)
        {
            return Ok(false);
        }
        tables.balance_snapshots.push(snapshot);
        Ok(true)
    }

    async fn insert_position_open(&self, record: PositionOpenRecord) -> Result<bool, StoreError> {
        let mut tables = self.inner.write().await;
        if tables
            .position_opens
            .iter()
            .any(|p| p.event_id == record.event_id)
        {
            return Ok(false);
        }
        tables.position_opens.push(record);
        Ok(true)
    }

    async fn last_event_key(&self, chain_id: u64) -> Result<Option<EventKey>, StoreError> {
        Ok(self.inner.read().await.last_keys.get(&chain_id).copied())
    }
}

/// A store whose every call fails, for exercising the degrade paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore;

#[cfg(test)]
impl UnavailableStore {
    fn error() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }
}

#[cfg(test)]
#[async_trait]
impl EntityStore for UnavailableStore {
    async fn vault_bindings_by_address(
        &self,
        _vault: &Address,
    ) -> Result<Vec<VaultBinding>, StoreError> {
        Err(Self::error())
    }

    async fn balance_snapshots_by_vault(
        &self,
        _vault: &Address,
    ) -> Result<Vec<VaultBalanceSnapshot>, StoreError> {
        Err(Self::error())
    }

    async fn position_opens_by(
        &self,
        _position_id: U256,
        _vault: &Address,
    ) -> Result<Vec<PositionOpenRecord>, StoreError> {
        Err(Self::error())
    }

    async fn insert_chain_event(&self, _record: ChainEventRecord) -> Result<bool, StoreError> {
        Err(Self::error())
    }

    async fn insert_vault_binding(&self, _binding: VaultBinding) -> Result<bool, StoreError> {
        Err(Self::error())
    }

    async fn insert_balance_snapshot(
        &self,
        _snapshot: VaultBalanceSnapshot,
    ) -> Result<bool, StoreError> {
        Err(Self::error())
    }

    async fn insert_position_open(&self, _record: PositionOpenRecord) -> Result<bool, StoreError> {
        Err(Self::error())
    }

    async fn last_event_key(&self, _chain_id: u64) -> Result<Option<EventKey>, StoreError> {
        Err(Self::error())
    }
}
