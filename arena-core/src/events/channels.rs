//! Channel factories for the pipeline stages.

use super::chain::ChainEvent;
use super::types::{DispatchRequest, PipelineEvent};
use tokio::sync::{broadcast, mpsc};

/// Buffer of the point-to-point stage channels.
///
/// Large enough to absorb an ingestion batch while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Capacity of the control-plane bus. Slow consumers past this lag and skip.
pub const PIPELINE_BUS_CAPACITY: usize = 1024;

pub type ChainEventSender = mpsc::Sender<ChainEvent>;
pub type ChainEventReceiver = mpsc::Receiver<ChainEvent>;

pub type DispatchSender = mpsc::Sender<DispatchRequest>;
pub type DispatchReceiver = mpsc::Receiver<DispatchRequest>;

pub type PipelineBus = broadcast::Sender<PipelineEvent>;
pub type PipelineBusReceiver = broadcast::Receiver<PipelineEvent>;

/// Ingestion → enricher.
pub fn chain_event_channel() -> (ChainEventSender, ChainEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Enricher → dispatch queue.
pub fn dispatch_channel() -> (DispatchSender, DispatchReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Webhook receiver → fan-out gateway (and any other subscriber).
pub fn pipeline_bus() -> PipelineBus {
    let (tx, _) = broadcast::channel(PIPELINE_BUS_CAPACITY);
    tx
}
