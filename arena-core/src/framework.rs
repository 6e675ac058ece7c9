use sqlx::PgPool;

/// Executes entity-store query objects against PostgreSQL.
///
/// Every query is a plain struct with a `kanau::processor::Processor` impl on
/// this type, so call sites read `processor.process(GetSomething { .. })`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a `u64` chain height or index into a `BIGINT` column.
pub(crate) fn to_db_int(value: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Map a `BIGINT` column back into a `u64` chain height or index.
pub(crate) fn from_db_int(column: &'static str, value: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| decode_error(column, e))
}

/// Build a `sqlx::Error::Decode` for a column that did not hold what we expected.
pub(crate) fn decode_error(column: &'static str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(RowDecodeError {
        column,
        reason: reason.to_string(),
    }))
}

#[derive(Debug, thiserror::Error)]
#[error("column `{column}`: {reason}")]
pub struct RowDecodeError {
    pub column: &'static str,
    pub reason: String,
}
