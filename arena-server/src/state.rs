//! Application state shared across all request handlers.

use arena_core::config::SharedConfig;
use arena_core::events::{ChainEventSender, PipelineBus};
use arena_core::fanout::{FanoutGateway, RecentEvents};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Reloadable configuration sections.
    pub config: SharedConfig,
    /// Feeds the enricher. `None` when the indexer side is disabled.
    pub chain_tx: Option<ChainEventSender>,
    /// Live real-time connections and their subscriptions.
    pub gateway: FanoutGateway,
    /// Control-plane bus the webhook receiver publishes to.
    pub bus: PipelineBus,
    /// Event ids already accepted by the webhook receiver.
    pub recent: Arc<Mutex<RecentEvents>>,
    /// Flips to `true` once the process is shutting down.
    pub shutdown_rx: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        config: SharedConfig,
        chain_tx: Option<ChainEventSender>,
        gateway: FanoutGateway,
        bus: PipelineBus,
        dedupe_capacity: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            chain_tx,
            gateway,
            bus,
            recent: Arc::new(Mutex::new(RecentEvents::new(dedupe_capacity))),
            shutdown_rx,
        }
    }
}
