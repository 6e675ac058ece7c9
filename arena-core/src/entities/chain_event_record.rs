use alloy_primitives::{Address, B256};
use kanau::processor::Processor;
use serde_json::Value;

use crate::entities::normalize_address;
use crate::events::{ChainEvent, EventKey};
use crate::framework::{DatabaseProcessor, from_db_int, to_db_int};

/// The raw chain log as persisted, independent of enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEventRecord {
    pub event_id: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_hash: B256,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub src_address: Address,
    pub event_name: &'static str,
    pub params: Value,
}

impl From<&ChainEvent> for ChainEventRecord {
    fn from(event: &ChainEvent) -> Self {
        Self {
            event_id: event.event_id(),
            chain_id: event.chain_id,
            block_number: event.block_number,
            block_timestamp: event.block_timestamp,
            block_hash: event.block_hash,
            log_index: event.log_index,
            transaction_hash: event.transaction_hash,
            src_address: event.src_address,
            event_name: event.name(),
            params: event.kind.params_json(),
        }
    }
}

impl ChainEventRecord {
    pub fn key(&self) -> EventKey {
        EventKey {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }
}

#[derive(Debug, Clone)]
/// Persist a raw event. Returns `false` when the event id was already stored.
pub struct InsertChainEvent {
    pub record: ChainEventRecord,
}

impl Processor<InsertChainEvent> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertChainEvent")]
    async fn process(&self, insert: InsertChainEvent) -> Result<bool, sqlx::Error> {
        let record = insert.record;
        let result = sqlx::query(
            r#"
            INSERT INTO chain_events
                (event_id, chain_id, block_number, block_timestamp, block_hash, log_index,
                 transaction_hash, src_address, event_name, params)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id)
        .bind(to_db_int(record.chain_id)?)
        .bind(to_db_int(record.block_number)?)
        .bind(to_db_int(record.block_timestamp)?)
        .bind(record.block_hash.to_string())
        .bind(to_db_int(record.log_index)?)
        .bind(record.transaction_hash.to_string())
        .bind(normalize_address(&record.src_address))
        .bind(record.event_name)
        .bind(record.params)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Highest `(block_number, log_index)` persisted for a chain.
pub struct GetLastEventKey {
    pub chain_id: u64,
}

impl Processor<GetLastEventKey> for DatabaseProcessor {
    type Output = Option<EventKey>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLastEventKey")]
    async fn process(&self, query: GetLastEventKey) -> Result<Option<EventKey>, sqlx::Error> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT block_number, log_index
            FROM chain_events
            WHERE chain_id = $1
            ORDER BY block_number DESC, log_index DESC
            LIMIT 1
            "#,
        )
        .bind(to_db_int(query.chain_id)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(block_number, log_index)| {
            Ok(EventKey {
                block_number: from_db_int("block_number", block_number)?,
                log_index: from_db_int("log_index", log_index)?,
            })
        })
        .transpose()
    }
}
