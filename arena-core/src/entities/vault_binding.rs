use alloy_primitives::Address;
use kanau::processor::Processor;

use crate::entities::{normalize_address, parse_address};
use crate::framework::{DatabaseProcessor, from_db_int, to_db_int};

/// A vault provisioned for a monachad in a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultBinding {
    /// The `MonachadJoined` log this binding was projected from.
    pub event_id: String,
    pub vault_address: Address,
    pub monachad_address: Address,
    pub match_id: String,
    pub block_number: u64,
}

/// What the enricher needs to know about a resolved vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultContext {
    pub vault_address: Address,
    pub monachad_address: Address,
    pub match_id: String,
}

impl From<VaultBinding> for VaultContext {
    fn from(binding: VaultBinding) -> Self {
        Self {
            vault_address: binding.vault_address,
            monachad_address: binding.monachad_address,
            match_id: binding.match_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VaultBindingRow {
    event_id: String,
    vault_address: String,
    monachad_address: String,
    match_id: String,
    block_number: i64,
}

impl TryFrom<VaultBindingRow> for VaultBinding {
    type Error = sqlx::Error;

    fn try_from(row: VaultBindingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: row.event_id,
            vault_address: parse_address("vault_address", &row.vault_address)?,
            monachad_address: parse_address("monachad_address", &row.monachad_address)?,
            match_id: row.match_id,
            block_number: from_db_int("block_number", row.block_number)?,
        })
    }
}

#[derive(Debug, Clone)]
/// All bindings recorded for a vault address, in insertion order.
pub struct GetVaultBindingsByAddress {
    pub vault_address: Address,
}

impl Processor<GetVaultBindingsByAddress> for DatabaseProcessor {
    type Output = Vec<VaultBinding>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetVaultBindingsByAddress")]
    async fn process(
        &self,
        query: GetVaultBindingsByAddress,
    ) -> Result<Vec<VaultBinding>, sqlx::Error> {
        let rows = sqlx::query_as::<_, VaultBindingRow>(
            r#"
            SELECT event_id, vault_address, monachad_address, match_id, block_number
            FROM vault_bindings
            WHERE vault_address = $1
            ORDER BY id ASC
            "#,
        )
        .bind(normalize_address(&query.vault_address))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VaultBinding::try_from).collect()
    }
}

#[derive(Debug, Clone)]
/// Insert a binding. Returns `false` when its source event was already
/// projected.
pub struct InsertVaultBinding {
    pub binding: VaultBinding,
}

impl Processor<InsertVaultBinding> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertVaultBinding")]
    async fn process(&self, insert: InsertVaultBinding) -> Result<bool, sqlx::Error> {
        let binding = insert.binding;
        let result = sqlx::query(
            r#"
            INSERT INTO vault_bindings
                (event_id, vault_address, monachad_address, match_id, block_number)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(binding.event_id)
        .bind(normalize_address(&binding.vault_address))
        .bind(normalize_address(&binding.monachad_address))
        .bind(binding.match_id)
        .bind(to_db_int(binding.block_number)?)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
