use alloy_primitives::{Address, U256};
use kanau::processor::Processor;

use crate::entities::{normalize_address, parse_address, parse_u256};
use crate::framework::{DatabaseProcessor, decode_error, from_db_int, to_db_int};

/// A recorded `PositionOpened`, kept so the matching close can inherit its
/// sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionOpenRecord {
    pub event_id: String,
    pub position_id: U256,
    /// The trader that opened the position. For resolved vaults this is the
    /// vault itself.
    pub vault_address: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub size_to_portfolio_bps: Option<u16>,
}

impl PositionOpenRecord {
    pub fn recency(&self) -> (u64, u64) {
        (self.block_number, self.block_timestamp)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PositionOpenRow {
    event_id: String,
    position_id: String,
    vault_address: String,
    block_number: i64,
    block_timestamp: i64,
    size_to_portfolio_bps: Option<i32>,
}

impl TryFrom<PositionOpenRow> for PositionOpenRecord {
    type Error = sqlx::Error;

    fn try_from(row: PositionOpenRow) -> Result<Self, Self::Error> {
        let size_to_portfolio_bps = row
            .size_to_portfolio_bps
            .map(|bps| u16::try_from(bps).map_err(|e| decode_error("size_to_portfolio_bps", e)))
            .transpose()?;
        Ok(Self {
            event_id: row.event_id,
            position_id: parse_u256("position_id", &row.position_id)?,
            vault_address: parse_address("vault_address", &row.vault_address)?,
            block_number: from_db_int("block_number", row.block_number)?,
            block_timestamp: from_db_int("block_timestamp", row.block_timestamp)?,
            size_to_portfolio_bps,
        })
    }
}

#[derive(Debug, Clone)]
/// Opens of one position by one vault, in insertion order.
pub struct GetPositionOpens {
    pub position_id: U256,
    pub vault_address: Address,
}

impl Processor<GetPositionOpens> for DatabaseProcessor {
    type Output = Vec<PositionOpenRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPositionOpens")]
    async fn process(&self, query: GetPositionOpens) -> Result<Vec<PositionOpenRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PositionOpenRow>(
            r#"
            SELECT
                event_id,
                position_id::text AS position_id,
                vault_address,
                block_number,
                block_timestamp,
                size_to_portfolio_bps
            FROM position_opens
            WHERE position_id = $1::numeric AND vault_address = $2
            ORDER BY id ASC
            "#,
        )
        .bind(query.position_id.to_string())
        .bind(normalize_address(&query.vault_address))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PositionOpenRecord::try_from).collect()
    }
}

#[derive(Debug, Clone)]
pub struct InsertPositionOpen {
    pub record: PositionOpenRecord,
}

impl Processor<InsertPositionOpen> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPositionOpen")]
    async fn process(&self, insert: InsertPositionOpen) -> Result<bool, sqlx::Error> {
        let record = insert.record;
        let result = sqlx::query(
            r#"
            INSERT INTO position_opens
                (event_id, position_id, vault_address, block_number, block_timestamp,
                 size_to_portfolio_bps)
            VALUES ($1, $2::numeric, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id)
        .bind(record.position_id.to_string())
        .bind(normalize_address(&record.vault_address))
        .bind(to_db_int(record.block_number)?)
        .bind(to_db_int(record.block_timestamp)?)
        .bind(record.size_to_portfolio_bps.map(i32::from))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
