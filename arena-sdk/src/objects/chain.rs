//! Wire shape of a chain event as pushed by the upstream indexer.
//!
//! Parameters stay untyped here; `arena-core` turns them into one strongly
//! typed variant per declared event name.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::quantity::u64_string;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    #[serde(with = "u64_string")]
    pub number: u64,
    #[serde(with = "u64_string")]
    pub timestamp: u64,
    pub hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub hash: B256,
}

/// One decoded log, exactly as the upstream indexer hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEventWire {
    #[serde(with = "u64_string")]
    pub chain_id: u64,
    pub block: BlockRef,
    #[serde(with = "u64_string")]
    pub log_index: u64,
    pub transaction: TransactionRef,
    pub src_address: Address,
    pub event_name: String,
    #[serde(default)]
    pub params: Value,
}

/// Response of `POST /events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numeric_and_string_heights() {
        let wire: ChainEventWire = serde_json::from_value(json!({
            "chainId": 10143,
            "block": {
                "number": "101",
                "timestamp": 1700000000,
                "hash": format!("0x{}", "ab".repeat(32)),
            },
            "logIndex": 3,
            "transaction": { "hash": format!("0x{}", "cd".repeat(32)) },
            "srcAddress": "0x00000000000000000000000000000000000000dd",
            "eventName": "PositionOpened",
            "params": { "positionId": "9" }
        }))
        .unwrap();
        assert_eq!(wire.chain_id, 10143);
        assert_eq!(wire.block.number, 101);
        assert_eq!(wire.log_index, 3);
        assert_eq!(wire.params["positionId"], "9");
    }
}
