//! Webhook payloads sent from the indexer to the control plane.

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Quantity;
use crate::quantity::u64_string;
use crate::signature::{SignedPayload, canonical_json};

/// Kind of notification carried by a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    TradeOpened,
    TradeClosed,
    MatchCreated,
    MonachadJoined,
    SupporterJoined,
    MatchStarted,
    MatchCompleted,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::TradeOpened => "trade_opened",
            WebhookEventType::TradeClosed => "trade_closed",
            WebhookEventType::MatchCreated => "match_created",
            WebhookEventType::MonachadJoined => "monachad_joined",
            WebhookEventType::SupporterJoined => "supporter_joined",
            WebhookEventType::MatchStarted => "match_started",
            WebhookEventType::MatchCompleted => "match_completed",
        }
    }

    /// Trade notifications become `tradeExecuted` pushes; everything else is
    /// a match lifecycle update.
    pub fn is_trade(&self) -> bool {
        matches!(
            self,
            WebhookEventType::TradeOpened | WebhookEventType::TradeClosed
        )
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields identifying the chain log a webhook was derived from.
///
/// `event_id` is `"{chainId}_{blockNumber}_{logIndex}"` and is what the
/// control plane deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEventRef {
    pub event_id: String,
    #[serde(with = "u64_string")]
    pub chain_id: u64,
    #[serde(with = "u64_string")]
    pub block_number: u64,
    #[serde(with = "u64_string")]
    pub block_timestamp: u64,
    #[serde(with = "u64_string")]
    pub log_index: u64,
    pub transaction_hash: B256,
}

/// Trade details that are not part of the relayed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMetadata {
    pub position_id: Quantity,
    pub vault_address: Address,
    /// `null` when no balance snapshot existed at or before the trade.
    pub size_to_portfolio_bps: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_long: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<Quantity>,
}

/// Body fields of a `trade_opened` / `trade_closed` webhook.
///
/// The control plane only relays `(target, value, data)`; it never needs to
/// know which DEX produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePayload {
    #[serde(flatten)]
    pub source: SourceEventRef,
    pub monachad_address: Address,
    pub match_id: String,
    pub target: Address,
    pub value: Quantity,
    pub data: Bytes,
    pub metadata: TradeMetadata,
}

/// Body fields of a match lifecycle webhook.
///
/// `details` carries the event's own parameters, already rendered with
/// decimal-string quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecyclePayload {
    #[serde(flatten)]
    pub source: SourceEventRef,
    pub match_id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Errors produced while reading a received webhook body.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("webhook body is not a JSON object")]
    NotAnObject,
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
}

/// The canonical webhook body: `{eventType, timestamp, ...fields}`.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEnvelope {
    pub event_type: WebhookEventType,
    /// Epoch milliseconds at which the envelope was built.
    pub timestamp: i64,
    pub fields: Map<String, Value>,
}

impl WebhookEnvelope {
    pub const EVENT_TYPE_KEY: &'static str = "eventType";
    pub const TIMESTAMP_KEY: &'static str = "timestamp";
    pub const NESTED_PAYLOAD_KEY: &'static str = "payload";

    /// Build an envelope around `payload`.
    ///
    /// Objects are merged flat into the envelope; any other JSON value is
    /// nested under `payload`.
    pub fn new(event_type: WebhookEventType, timestamp: i64, payload: Value) -> Self {
        let fields = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert(Self::NESTED_PAYLOAD_KEY.to_owned(), other);
                map
            }
        };
        Self {
            event_type,
            timestamp,
            fields,
        }
    }

    /// Flatten into a single JSON object. Envelope keys win over payload keys
    /// of the same name.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(
            Self::EVENT_TYPE_KEY.to_owned(),
            Value::String(self.event_type.as_str().to_owned()),
        );
        map.insert(Self::TIMESTAMP_KEY.to_owned(), Value::from(self.timestamp));
        Value::Object(map)
    }

    pub fn canonical_json(&self) -> String {
        canonical_json(&self.to_value())
    }

    /// Canonicalize and sign (when a secret is given).
    pub fn sign(&self, secret: Option<&[u8]>) -> SignedPayload {
        SignedPayload::new(&self.to_value(), secret)
    }

    /// Parse a received body back into an envelope.
    pub fn from_json(body: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(body)?;
        let Value::Object(mut fields) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let event_type = fields
            .remove(Self::EVENT_TYPE_KEY)
            .ok_or(EnvelopeError::MissingField(Self::EVENT_TYPE_KEY))
            .and_then(|v| {
                serde_json::from_value::<WebhookEventType>(v)
                    .map_err(|_| EnvelopeError::MissingField(Self::EVENT_TYPE_KEY))
            })?;
        let timestamp = fields
            .remove(Self::TIMESTAMP_KEY)
            .and_then(|v| v.as_i64())
            .ok_or(EnvelopeError::MissingField(Self::TIMESTAMP_KEY))?;
        Ok(Self {
            event_type,
            timestamp,
            fields,
        })
    }

    /// Idempotency key, when the payload carries one.
    pub fn event_id(&self) -> Option<&str> {
        self.fields.get("eventId").and_then(Value::as_str)
    }

    /// The match this envelope belongs to, when the payload carries one.
    pub fn match_id(&self) -> Option<&str> {
        self.fields.get("matchId").and_then(Value::as_str)
    }
}
