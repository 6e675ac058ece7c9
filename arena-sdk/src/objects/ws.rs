//! Real-time protocol spoken over `GET /ws`.
//!
//! Every frame is a JSON text frame tagged by `event`:
//!
//! ```json
//! {"event":"subscribeToMatch","data":{"matchId":"1"}}
//! {"event":"subscribed","data":{"success":true,"matchId":"1","subscribers":2}}
//! {"event":"tradeExecuted","data":{ ...trade fields... }}
//! {"event":"batchTradesExecuted","data":{"matchId":"1","trades":[...],"count":2}}
//! {"event":"matchUpdated","data":{"matchId":"1","eventType":"match_started", ...}}
//! ```
//!
//! A connection only ever receives pushes for matches it subscribed to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    SubscribeToMatch(MatchRef),
    UnsubscribeFromMatch(MatchRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRef {
    pub match_id: String,
}

/// Acknowledgement for a subscribe / unsubscribe request.
///
/// `subscribers` is the size of the match's subscriber set right after the
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAck {
    pub success: bool,
    pub match_id: String,
    pub subscribers: usize,
}

/// Several trades of one match delivered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeBatch {
    pub match_id: String,
    pub trades: Vec<Value>,
    pub count: usize,
}

impl TradeBatch {
    pub fn new(match_id: String, trades: Vec<Value>) -> Self {
        let count = trades.len();
        Self {
            match_id,
            trades,
            count,
        }
    }
}

/// A lifecycle change of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdate {
    pub match_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Server-to-client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Subscribed(SubscriptionAck),
    Unsubscribed(SubscriptionAck),
    TradeExecuted(Value),
    BatchTradesExecuted(TradeBatch),
    MatchUpdated(MatchUpdate),
    Error { reason: String },
}

impl ServerMessage {
    /// The push event name, as seen by clients.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Subscribed(_) => "subscribed",
            ServerMessage::Unsubscribed(_) => "unsubscribed",
            ServerMessage::TradeExecuted(_) => "tradeExecuted",
            ServerMessage::BatchTradesExecuted(_) => "batchTradesExecuted",
            ServerMessage::MatchUpdated(_) => "matchUpdated",
            ServerMessage::Error { .. } => "error",
        }
    }
}
