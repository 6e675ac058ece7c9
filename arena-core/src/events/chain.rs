//! Typed chain events.
//!
//! The upstream indexer hands over decoded logs as [`ChainEventWire`]; each
//! declared event name maps to exactly one [`ChainEventKind`] variant with its
//! own parameter struct, so downstream code dispatches on the tag instead of
//! probing fields.

use alloy_primitives::{Address, B256};
use arena_sdk::Quantity;
use arena_sdk::objects::{ChainEventWire, SourceEventRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while turning a wire event into a typed one.
#[derive(Debug, Error)]
pub enum ChainEventError {
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    #[error("invalid params for {event}: {source}")]
    InvalidParams {
        event: String,
        source: serde_json::Error,
    },
}

/// Ordering key of an event within one chain.
///
/// Derived `Ord` compares `block_number` first, then `log_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub block_number: u64,
    pub log_index: u64,
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

// ---------------------------------------------------------------------------
// Parameter sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionOpened {
    pub position_id: Quantity,
    pub trader: Address,
    pub market: Address,
    pub is_long: bool,
    pub collateral: Quantity,
    pub leverage: Quantity,
    pub entry_price: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionClosed {
    pub position_id: Quantity,
    pub trader: Address,
    pub exit_price: Quantity,
    pub payout: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCreated {
    pub match_id: Quantity,
    pub creator: Address,
    pub entry_margin: Quantity,
    pub duration: Quantity,
    pub max_monachads: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonachadJoined {
    pub match_id: Quantity,
    pub monachad: Address,
    pub vault: Address,
    pub entry_margin: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupporterJoined {
    pub match_id: Quantity,
    pub supporter: Address,
    pub monachad: Address,
    pub amount: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStarted {
    pub match_id: Quantity,
    pub start_time: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCompleted {
    pub match_id: Quantity,
    pub winner: Address,
    pub prize_pool: Quantity,
}

/// Why a vault's balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceChangeType {
    Deposit,
    Withdrawal,
    PositionOpened,
    PositionClosed,
    Settlement,
}

impl BalanceChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceChangeType::Deposit => "deposit",
            BalanceChangeType::Withdrawal => "withdrawal",
            BalanceChangeType::PositionOpened => "position_opened",
            BalanceChangeType::PositionClosed => "position_closed",
            BalanceChangeType::Settlement => "settlement",
        }
    }
}

impl std::str::FromStr for BalanceChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(BalanceChangeType::Deposit),
            "withdrawal" => Ok(BalanceChangeType::Withdrawal),
            "position_opened" => Ok(BalanceChangeType::PositionOpened),
            "position_closed" => Ok(BalanceChangeType::PositionClosed),
            "settlement" => Ok(BalanceChangeType::Settlement),
            other => Err(format!("unknown balance change type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalanceChanged {
    pub vault: Address,
    pub pre_balance: Quantity,
    pub post_balance: Quantity,
    pub change_type: BalanceChangeType,
}

// ---------------------------------------------------------------------------
// ChainEventKind
// ---------------------------------------------------------------------------

/// One variant per declared chain-event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventName", content = "params")]
pub enum ChainEventKind {
    PositionOpened(PositionOpened),
    PositionClosed(PositionClosed),
    MatchCreated(MatchCreated),
    MonachadJoined(MonachadJoined),
    SupporterJoined(SupporterJoined),
    MatchStarted(MatchStarted),
    MatchCompleted(MatchCompleted),
    VaultBalanceChanged(VaultBalanceChanged),
}

impl ChainEventKind {
    pub const NAMES: [&'static str; 8] = [
        "PositionOpened",
        "PositionClosed",
        "MatchCreated",
        "MonachadJoined",
        "SupporterJoined",
        "MatchStarted",
        "MatchCompleted",
        "VaultBalanceChanged",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChainEventKind::PositionOpened(_) => "PositionOpened",
            ChainEventKind::PositionClosed(_) => "PositionClosed",
            ChainEventKind::MatchCreated(_) => "MatchCreated",
            ChainEventKind::MonachadJoined(_) => "MonachadJoined",
            ChainEventKind::SupporterJoined(_) => "SupporterJoined",
            ChainEventKind::MatchStarted(_) => "MatchStarted",
            ChainEventKind::MatchCompleted(_) => "MatchCompleted",
            ChainEventKind::VaultBalanceChanged(_) => "VaultBalanceChanged",
        }
    }

    /// Build the typed variant for `name` from its raw params.
    pub fn from_parts(name: &str, params: Value) -> Result<Self, ChainEventError> {
        if !Self::NAMES.contains(&name) {
            return Err(ChainEventError::UnknownEvent(name.to_owned()));
        }
        let tagged = serde_json::json!({ "eventName": name, "params": params });
        serde_json::from_value(tagged).map_err(|source| ChainEventError::InvalidParams {
            event: name.to_owned(),
            source,
        })
    }

    /// The params object alone, with quantities as decimal strings.
    pub fn params_json(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove("params").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainEvent
// ---------------------------------------------------------------------------

/// An immutable, typed on-chain log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEvent {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_hash: B256,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub src_address: Address,
    pub kind: ChainEventKind,
}

impl ChainEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }

    /// `"{chainId}_{blockNumber}_{logIndex}"`, unique per log.
    pub fn event_id(&self) -> String {
        format!("{}_{}_{}", self.chain_id, self.block_number, self.log_index)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn source_ref(&self) -> SourceEventRef {
        SourceEventRef {
            event_id: self.event_id(),
            chain_id: self.chain_id,
            block_number: self.block_number,
            block_timestamp: self.block_timestamp,
            log_index: self.log_index,
            transaction_hash: self.transaction_hash,
        }
    }
}

impl TryFrom<ChainEventWire> for ChainEvent {
    type Error = ChainEventError;

    fn try_from(wire: ChainEventWire) -> Result<Self, Self::Error> {
        let kind = ChainEventKind::from_parts(&wire.event_name, wire.params)?;
        Ok(Self {
            chain_id: wire.chain_id,
            block_number: wire.block.number,
            block_timestamp: wire.block.timestamp,
            block_hash: wire.block.hash,
            log_index: wire.log_index,
            transaction_hash: wire.transaction.hash,
            src_address: wire.src_address,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_sdk::objects::{BlockRef, TransactionRef};
    use serde_json::json;

    fn wire(name: &str, params: Value) -> ChainEventWire {
        ChainEventWire {
            chain_id: 10143,
            block: BlockRef {
                number: 101,
                timestamp: 1_700_000_000,
                hash: B256::repeat_byte(1),
            },
            log_index: 4,
            transaction: TransactionRef {
                hash: B256::repeat_byte(2),
            },
            src_address: Address::repeat_byte(0xdd),
            event_name: name.to_owned(),
            params,
        }
    }

    #[test]
    fn builds_typed_position_opened() {
        let event = ChainEvent::try_from(wire(
            "PositionOpened",
            json!({
                "positionId": "9",
                "trader": "0x00000000000000000000000000000000000000aa",
                "market": "0x00000000000000000000000000000000000000ee",
                "isLong": true,
                "collateral": 250000,
                "leverage": "5",
                "entryPrice": "3000000000"
            }),
        ))
        .unwrap();

        assert_eq!(event.event_id(), "10143_101_4");
        assert_eq!(event.name(), "PositionOpened");
        let ChainEventKind::PositionOpened(params) = &event.kind else {
            panic!("expected PositionOpened");
        };
        assert_eq!(params.collateral, Quantity::from(250_000u64));
        assert!(params.is_long);
    }

    #[test]
    fn rejects_unknown_names_and_bad_params() {
        let err = ChainEvent::try_from(wire("Transfer", json!({}))).unwrap_err();
        assert!(matches!(err, ChainEventError::UnknownEvent(name) if name == "Transfer"));

        let err = ChainEvent::try_from(wire("MatchStarted", json!({ "matchId": "1" }))).unwrap_err();
        assert!(matches!(err, ChainEventError::InvalidParams { .. }));
    }

    #[test]
    fn params_json_uses_decimal_strings() {
        let kind = ChainEventKind::MatchStarted(MatchStarted {
            match_id: Quantity::from(1u64),
            start_time: Quantity::from(1_700_000_000u64),
        });
        assert_eq!(
            kind.params_json(),
            json!({ "matchId": "1", "startTime": "1700000000" })
        );
    }

    #[test]
    fn event_keys_order_by_block_then_log() {
        let a = EventKey { block_number: 5, log_index: 9 };
        let b = EventKey { block_number: 6, log_index: 0 };
        let c = EventKey { block_number: 6, log_index: 1 };
        assert!(a < b && b < c);
    }
}
