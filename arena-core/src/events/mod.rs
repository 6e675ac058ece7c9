//! Event types and channel plumbing.
//!
//! # Event Flow
//!
//! 1. `POST /events` → [`ChainEvent`] → `EventEnricher`
//! 2. `EventEnricher` emits [`DispatchRequest`] → `DispatchQueue`
//! 3. `DispatchQueue` POSTs the signed webhook to the control plane
//! 4. The control plane publishes [`PipelineEvent`] on the bus → `FanoutGateway`

pub mod chain;
pub mod channels;
pub mod types;

pub use chain::{
    BalanceChangeType, ChainEvent, ChainEventError, ChainEventKind, EventKey, MatchCompleted,
    MatchCreated, MatchStarted, MonachadJoined, PositionClosed, PositionOpened, SupporterJoined,
    VaultBalanceChanged,
};
pub use channels::{
    ChainEventReceiver, ChainEventSender, DEFAULT_CHANNEL_BUFFER, DispatchReceiver,
    DispatchSender, PIPELINE_BUS_CAPACITY, PipelineBus, PipelineBusReceiver, chain_event_channel,
    dispatch_channel, pipeline_bus,
};
pub use types::{DispatchRequest, PipelineEvent};
