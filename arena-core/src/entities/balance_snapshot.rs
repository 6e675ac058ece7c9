use alloy_primitives::{Address, I256, Sign, U256};
use kanau::processor::Processor;
use tracing::warn;

use crate::entities::{normalize_address, parse_address, parse_i256, parse_u256};
use crate::events::{BalanceChangeType, VaultBalanceChanged};
use crate::framework::{DatabaseProcessor, decode_error, from_db_int, to_db_int};

/// One observed balance change of a vault. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultBalanceSnapshot {
    pub event_id: String,
    pub vault_address: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub pre_balance: U256,
    pub post_balance: U256,
    /// `post_balance - pre_balance`.
    pub delta: I256,
    pub change_type: BalanceChangeType,
}

impl VaultBalanceSnapshot {
    pub fn from_event(
        event_id: String,
        block_number: u64,
        block_timestamp: u64,
        params: &VaultBalanceChanged,
    ) -> Self {
        let pre_balance = params.pre_balance.into_inner();
        let post_balance = params.post_balance.into_inner();
        Self {
            event_id,
            vault_address: params.vault,
            block_number,
            block_timestamp,
            pre_balance,
            post_balance,
            delta: balance_delta(pre_balance, post_balance),
            change_type: params.change_type,
        }
    }

    /// Ordering used to pick the latest snapshot: block first, then timestamp.
    pub fn recency(&self) -> (u64, u64) {
        (self.block_number, self.block_timestamp)
    }
}

/// Signed difference `post - pre`.
///
/// Magnitudes beyond the `I256` range saturate at `I256::MAX` / `I256::MIN`
/// with a warning; the balances themselves are stored exactly.
pub fn balance_delta(pre: U256, post: U256) -> I256 {
    let (sign, magnitude, bound) = if post >= pre {
        (Sign::Positive, post - pre, I256::MAX)
    } else {
        (Sign::Negative, pre - post, I256::MIN)
    };
    I256::checked_from_sign_and_abs(sign, magnitude).unwrap_or_else(|| {
        warn!(%pre, %post, "Balance delta out of range, saturating");
        bound
    })
}

#[derive(Debug, sqlx::FromRow)]
struct VaultBalanceSnapshotRow {
    event_id: String,
    vault_address: String,
    block_number: i64,
    block_timestamp: i64,
    pre_balance: String,
    post_balance: String,
    delta: String,
    change_type: String,
}

impl TryFrom<VaultBalanceSnapshotRow> for VaultBalanceSnapshot {
    type Error = sqlx::Error;

    fn try_from(row: VaultBalanceSnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: row.event_id,
            vault_address: parse_address("vault_address", &row.vault_address)?,
            block_number: from_db_int("block_number", row.block_number)?,
            block_timestamp: from_db_int("block_timestamp", row.block_timestamp)?,
            pre_balance: parse_u256("pre_balance", &row.pre_balance)?,
            post_balance: parse_u256("post_balance", &row.post_balance)?,
            delta: parse_i256("delta", &row.delta)?,
            change_type: row
                .change_type
                .parse()
                .map_err(|e: String| decode_error("change_type", e))?,
        })
    }
}

#[derive(Debug, Clone)]
/// All snapshots of a vault, in insertion order.
pub struct GetBalanceSnapshotsByVault {
    pub vault_address: Address,
}

impl Processor<GetBalanceSnapshotsByVault> for DatabaseProcessor {
    type Output = Vec<VaultBalanceSnapshot>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBalanceSnapshotsByVault")]
    async fn process(
        &self,
        query: GetBalanceSnapshotsByVault,
    ) -> Result<Vec<VaultBalanceSnapshot>, sqlx::Error> {
        let rows = sqlx::query_as::<_, VaultBalanceSnapshotRow>(
            r#"
            SELECT
                event_id,
                vault_address,
                block_number,
                block_timestamp,
                pre_balance::text AS pre_balance,
                post_balance::text AS post_balance,
                delta::text AS delta,
                change_type
            FROM vault_balance_snapshots
            WHERE vault_address = $1
            ORDER BY id ASC
            "#,
        )
        .bind(normalize_address(&query.vault_address))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VaultBalanceSnapshot::try_from).collect()
    }
}

#[derive(Debug, Clone)]
/// Append a snapshot. Returns `false` when its source event was already
/// projected.
pub struct InsertBalanceSnapshot {
    pub snapshot: VaultBalanceSnapshot,
}

impl Processor<InsertBalanceSnapshot> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertBalanceSnapshot")]
    async fn process(&self, insert: InsertBalanceSnapshot) -> Result<bool, sqlx::Error> {
        let snapshot = insert.snapshot;
        let result = sqlx::query(
            r#"
            INSERT INTO vault_balance_snapshots
                (event_id, vault_address, block_number, block_timestamp,
                 pre_balance, post_balance, delta, change_type)
            VALUES ($1, $2, $3, $4, $5::numeric, $6::numeric, $7::numeric, $8)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(snapshot.event_id)
        .bind(normalize_address(&snapshot.vault_address))
        .bind(to_db_int(snapshot.block_number)?)
        .bind(to_db_int(snapshot.block_timestamp)?)
        .bind(snapshot.pre_balance.to_string())
        .bind(snapshot.post_balance.to_string())
        .bind(snapshot.delta.to_string())
        .bind(snapshot.change_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
