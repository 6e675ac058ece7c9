//! EventEnricher processor.
//!
//! The EventEnricher is responsible for:
//! - Receiving typed chain events, one at a time, in chain order
//! - Persisting every raw event and its projections
//! - Resolving vaults, sizing opens and carrying sizing forward to closes
//! - Handing finished notifications to the dispatch queue in order

use std::collections::HashMap;
use std::convert::Infallible;

use arena_sdk::objects::{LifecyclePayload, WebhookEventType};
use kanau::processor::Processor;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::position_sizer::PositionSizer;
use super::trade_action::{EncodeError, EnrichedTradeAction, encode_close, encode_open};
use super::vault_resolver::VaultResolver;
use crate::config::{ConfigStore, IndexerConfig};
use crate::entities::{
    ChainEventRecord, PositionOpenRecord, VaultBalanceSnapshot, VaultBinding, normalize_address,
};
use crate::events::{
    ChainEvent, ChainEventKind, ChainEventReceiver, DispatchRequest, DispatchSender, EventKey,
    PositionClosed, PositionOpened,
};
use crate::store::SharedStore;

/// Why an event produced no webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The event id was already persisted.
    AlreadyProcessed,
    /// The trader is not a copy-trading vault.
    NotAVault,
    /// The event kind has no webhook.
    NoWebhook,
    /// The DEX call could not be encoded.
    Encoding(EncodeError),
    /// The webhook body could not be rendered.
    Payload(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Notify(DispatchRequest),
    Skipped(SkipReason),
}

/// Drops events that do not advance their chain's `(block, logIndex)` key.
#[derive(Debug, Default)]
pub struct OrderingGuard {
    last: HashMap<u64, Option<EventKey>>,
}

impl OrderingGuard {
    pub fn is_seeded(&self, chain_id: u64) -> bool {
        self.last.contains_key(&chain_id)
    }

    /// Set the starting point of a chain, usually the last persisted key.
    pub fn seed(&mut self, chain_id: u64, last: Option<EventKey>) {
        self.last.insert(chain_id, last);
    }

    /// Record `key` and return `Ok` if it is strictly after the last one;
    /// otherwise return the last key unchanged.
    pub fn admit(&mut self, chain_id: u64, key: EventKey) -> Result<(), EventKey> {
        let slot = self.last.entry(chain_id).or_insert(None);
        if let Some(last) = *slot
            && key <= last
        {
            return Err(last);
        }
        *slot = Some(key);
        Ok(())
    }
}

/// The enrichment stage: stateless per event apart from the store.
#[derive(Clone)]
pub struct EventEnricher {
    store: SharedStore,
    resolver: VaultResolver,
    sizer: PositionSizer,
    config: ConfigStore<IndexerConfig>,
}

impl EventEnricher {
    pub fn new(store: SharedStore, config: ConfigStore<IndexerConfig>) -> Self {
        Self {
            resolver: VaultResolver::new(store.clone()),
            sizer: PositionSizer::new(store.clone()),
            store,
            config,
        }
    }

    /// Persist `event` and work out the webhook it produces, if any.
    ///
    /// Never fails: store errors degrade the enrichment and are logged.
    pub async fn enrich(&self, event: &ChainEvent) -> EnrichmentOutcome {
        let event_id = event.event_id();

        match self
            .store
            .insert_chain_event(ChainEventRecord::from(event))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(event_id = %event_id, "Chain event already persisted");
                return EnrichmentOutcome::Skipped(SkipReason::AlreadyProcessed);
            }
            Err(e) => {
                error!(event_id = %event_id, error = %e, "Failed to persist chain event");
            }
        }

        match &event.kind {
            ChainEventKind::PositionOpened(params) => self.enrich_open(event, params).await,
            ChainEventKind::PositionClosed(params) => self.enrich_close(event, params).await,
            ChainEventKind::VaultBalanceChanged(params) => {
                let snapshot = VaultBalanceSnapshot::from_event(
                    event_id.clone(),
                    event.block_number,
                    event.block_timestamp,
                    params,
                );
                if let Err(e) = self.store.insert_balance_snapshot(snapshot).await {
                    error!(event_id = %event_id, error = %e, "Failed to record balance snapshot");
                }
                EnrichmentOutcome::Skipped(SkipReason::NoWebhook)
            }
            ChainEventKind::MonachadJoined(params) => {
                let binding = VaultBinding {
                    event_id: event_id.clone(),
                    vault_address: params.vault,
                    monachad_address: params.monachad,
                    match_id: params.match_id.to_string(),
                    block_number: event.block_number,
                };
                if let Err(e) = self.store.insert_vault_binding(binding).await {
                    error!(event_id = %event_id, error = %e, "Failed to record vault binding");
                }
                lifecycle(event, WebhookEventType::MonachadJoined)
            }
            ChainEventKind::MatchCreated(_) => lifecycle(event, WebhookEventType::MatchCreated),
            ChainEventKind::SupporterJoined(_) => {
                lifecycle(event, WebhookEventType::SupporterJoined)
            }
            ChainEventKind::MatchStarted(_) => lifecycle(event, WebhookEventType::MatchStarted),
            ChainEventKind::MatchCompleted(_) => {
                lifecycle(event, WebhookEventType::MatchCompleted)
            }
        }
    }

    async fn enrich_open(&self, event: &ChainEvent, params: &PositionOpened) -> EnrichmentOutcome {
        let event_id = event.event_id();
        let vault = self.resolver.resolve(&params.trader).await;

        let size_to_portfolio_bps = match &vault {
            Some(_) => {
                self.sizer
                    .size_to_portfolio_bps(
                        &params.trader,
                        event.block_number,
                        params.collateral.into_inner(),
                    )
                    .await
            }
            None => None,
        };

        let record = PositionOpenRecord {
            event_id: event_id.clone(),
            position_id: params.position_id.into_inner(),
            vault_address: params.trader,
            block_number: event.block_number,
            block_timestamp: event.block_timestamp,
            size_to_portfolio_bps,
        };
        if let Err(e) = self.store.insert_position_open(record).await {
            error!(event_id = %event_id, error = %e, "Failed to record position open");
        }

        let Some(vault) = vault else {
            return EnrichmentOutcome::Skipped(SkipReason::NotAVault);
        };

        let call = {
            let config = self.config.read().await;
            encode_open(&config.dexes, &event.src_address, params)
        };
        let call = match call {
            Ok(call) => call,
            Err(e) => return encoding_failed(event, e),
        };

        let action = EnrichedTradeAction::opened(
            vault,
            call,
            size_to_portfolio_bps,
            event.source_ref(),
            params,
        );
        trade(action, WebhookEventType::TradeOpened)
    }

    async fn enrich_close(&self, event: &ChainEvent, params: &PositionClosed) -> EnrichmentOutcome {
        let Some(vault) = self.resolver.resolve(&params.trader).await else {
            return EnrichmentOutcome::Skipped(SkipReason::NotAVault);
        };

        let size_to_portfolio_bps = self.inherited_size(event, params).await;

        let call = {
            let config = self.config.read().await;
            encode_close(&config.dexes, &event.src_address, params)
        };
        let call = match call {
            Ok(call) => call,
            Err(e) => return encoding_failed(event, e),
        };

        let action = EnrichedTradeAction::closed(
            vault,
            call,
            size_to_portfolio_bps,
            event.source_ref(),
            params,
        );
        trade(action, WebhookEventType::TradeClosed)
    }

    /// Sizing of the originating open of this position by this vault.
    async fn inherited_size(&self, event: &ChainEvent, params: &PositionClosed) -> Option<u16> {
        let opens = match self
            .store
            .position_opens_by(params.position_id.into_inner(), &params.trader)
            .await
        {
            Ok(opens) => opens,
            Err(e) => {
                error!(
                    event_id = %event.event_id(),
                    error = %e,
                    "Failed to load position opens"
                );
                return None;
            }
        };

        let origin = opens
            .iter()
            .filter(|open| open.block_number <= event.block_number)
            .max_by_key(|open| open.recency());
        if origin.is_none() {
            debug!(
                position_id = %params.position_id,
                vault = %normalize_address(&params.trader),
                "No recorded open for closed position"
            );
        }
        origin.and_then(|open| open.size_to_portfolio_bps)
    }

    /// Consume chain events until shutdown or until the channel closes.
    ///
    /// On shutdown the channel stops accepting new events and whatever is
    /// already queued is enriched before returning.
    pub async fn run(
        self,
        mut events_rx: ChainEventReceiver,
        dispatch_tx: DispatchSender,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("EventEnricher started");
        let mut guard = OrderingGuard::default();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("EventEnricher received shutdown signal");
                        break;
                    }
                }

                Some(event) = events_rx.recv() => {
                    self.handle(&mut guard, event, &dispatch_tx).await;
                }

                else => {
                    info!("Chain event channel closed");
                    break;
                }
            }
        }

        // events accepted before shutdown are still persisted and forwarded
        events_rx.close();
        let mut drained = 0usize;
        while let Some(event) = events_rx.recv().await {
            self.handle(&mut guard, event, &dispatch_tx).await;
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "Enriched queued chain events before shutdown");
        }

        info!("EventEnricher shutdown complete");
    }

    async fn handle(&self, guard: &mut OrderingGuard, event: ChainEvent, dispatch_tx: &DispatchSender) {
        if !guard.is_seeded(event.chain_id) {
            let last = match self.store.last_event_key(event.chain_id).await {
                Ok(last) => last,
                Err(e) => {
                    error!(chain_id = event.chain_id, error = %e, "Failed to load last event key");
                    None
                }
            };
            guard.seed(event.chain_id, last);
        }

        if let Err(last) = guard.admit(event.chain_id, event.key()) {
            warn!(
                event_id = %event.event_id(),
                last = %last,
                "Dropping out-of-order chain event"
            );
            return;
        }

        match self.enrich(&event).await {
            EnrichmentOutcome::Notify(request) => {
                debug!(
                    event_id = %request.event_id,
                    event_type = %request.event_type,
                    "Queueing webhook"
                );
                if dispatch_tx.send(request).await.is_err() {
                    error!(event_id = %event.event_id(), "Dispatch queue closed, webhook dropped");
                }
            }
            EnrichmentOutcome::Skipped(reason) => {
                debug!(event_id = %event.event_id(), reason = ?reason, "No webhook for event");
            }
        }
    }
}

impl Processor<ChainEvent> for EventEnricher {
    type Output = EnrichmentOutcome;
    type Error = Infallible;
    async fn process(&self, event: ChainEvent) -> Result<EnrichmentOutcome, Infallible> {
        Ok(self.enrich(&event).await)
    }
}

fn encoding_failed(event: &ChainEvent, e: EncodeError) -> EnrichmentOutcome {
    warn!(
        event_id = %event.event_id(),
        dex = %normalize_address(&event.src_address),
        error = %e,
        "Failed to encode trade action, webhook skipped"
    );
    EnrichmentOutcome::Skipped(SkipReason::Encoding(e))
}

fn trade(action: EnrichedTradeAction, event_type: WebhookEventType) -> EnrichmentOutcome {
    let event_id = action.source.event_id.clone();
    match serde_json::to_value(action.into_payload()) {
        Ok(payload) => EnrichmentOutcome::Notify(DispatchRequest {
            event_type,
            event_id,
            payload,
        }),
        Err(e) => payload_failed(event_id, e),
    }
}

fn lifecycle(event: &ChainEvent, event_type: WebhookEventType) -> EnrichmentOutcome {
    let event_id = event.event_id();
    let Value::Object(mut details) = event.kind.params_json() else {
        return payload_failed(event_id, "params are not an object");
    };
    let match_id = match details.remove("matchId") {
        Some(Value::String(id)) => id,
        _ => return payload_failed(event_id, "params carry no matchId"),
    };

    let payload = LifecyclePayload {
        source: event.source_ref(),
        match_id,
        details,
    };
    match serde_json::to_value(payload) {
        Ok(payload) => EnrichmentOutcome::Notify(DispatchRequest {
            event_type,
            event_id,
            payload,
        }),
        Err(e) => payload_failed(event_id, e),
    }
}

fn payload_failed(event_id: String, reason: impl std::fmt::Display) -> EnrichmentOutcome {
    error!(event_id = %event_id, reason = %reason, "Failed to render webhook payload");
    EnrichmentOutcome::Skipped(SkipReason::Payload(reason.to_string()))
}
