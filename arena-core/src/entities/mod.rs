pub mod balance_snapshot;
pub mod chain_event_record;
pub mod position_open;
pub mod vault_binding;

pub use balance_snapshot::VaultBalanceSnapshot;
pub use chain_event_record::ChainEventRecord;
pub use position_open::PositionOpenRecord;
pub use vault_binding::{VaultBinding, VaultContext};

use alloy_primitives::{Address, I256, U256};

use crate::framework::decode_error;

/// Lower-case `0x`-prefixed hex, the form every address is stored and
/// compared in.
pub fn normalize_address(address: &Address) -> String {
    address.to_string().to_lowercase()
}

/// Parse a stored address column.
pub(crate) fn parse_address(column: &'static str, value: &str) -> Result<Address, sqlx::Error> {
    value.parse::<Address>().map_err(|e| decode_error(column, e))
}

/// Parse a `NUMERIC(78,0)` column read back as text.
pub(crate) fn parse_u256(column: &'static str, value: &str) -> Result<U256, sqlx::Error> {
    U256::from_str_radix(value, 10).map_err(|e| decode_error(column, e))
}

/// Parse a signed `NUMERIC` column read back as text.
pub(crate) fn parse_i256(column: &'static str, value: &str) -> Result<I256, sqlx::Error> {
    I256::from_dec_str(value).map_err(|e| decode_error(column, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn normalizes_to_lower_case() {
        let addr = address!("00000000000000000000000000000000000000AA");
        assert_eq!(
            normalize_address(&addr),
            "0x00000000000000000000000000000000000000aa"
        );
    }

    #[test]
    fn parses_numeric_text() {
        assert_eq!(parse_u256("v", "1000000").unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_i256("d", "-5").unwrap(), I256::try_from(-5i64).unwrap());
        assert!(parse_u256("v", "-5").is_err());
    }
}
