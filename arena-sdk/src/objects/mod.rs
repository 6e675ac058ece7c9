pub mod chain;
pub mod webhook;
pub mod ws;

pub use chain::{BlockRef, ChainEventWire, IngestResponse, TransactionRef};
pub use webhook::{
    EnvelopeError, LifecyclePayload, SourceEventRef, TradeMetadata, TradePayload,
    WebhookEnvelope, WebhookEventType,
};
pub use ws::{ClientMessage, MatchRef, MatchUpdate, ServerMessage, SubscriptionAck, TradeBatch};
