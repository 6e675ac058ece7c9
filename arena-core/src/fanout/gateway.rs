//! FanoutGateway processor.
//!
//! The FanoutGateway is responsible for:
//! - Tracking live real-time connections and their outbound queues
//! - Applying subscribe / unsubscribe / disconnect through the [`TopicRegistry`]
//! - Consuming the control-plane bus and pushing each event to its match's
//!   subscribers only, batching trades that arrive together

use std::collections::HashMap;
use std::sync::Arc;

use arena_sdk::objects::{MatchUpdate, ServerMessage, SubscriptionAck, TradeBatch};
use serde_json::Value;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, warn};

use super::registry::{ConnectionId, TopicRegistry};
use crate::events::{PipelineBusReceiver, PipelineEvent};

/// Outbound queue depth per connection. A connection this far behind starts
/// losing pushes.
pub const CONNECTION_BUFFER: usize = 64;

pub type ConnectionReceiver = mpsc::Receiver<ServerMessage>;

#[derive(Clone, Default)]
pub struct FanoutGateway {
    inner: Arc<GatewayInner>,
}

#[derive(Default)]
struct GatewayInner {
    registry: TopicRegistry,
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl FanoutGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.inner.registry
    }

    /// Register a new connection and hand back its outbound queue.
    pub async fn connect(&self) -> (ConnectionId, ConnectionReceiver) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        self.inner.connections.write().await.insert(id, tx);
        debug!(connection = %id, "Connection registered");
        (id, rx)
    }

    /// Forget a connection and all of its subscriptions.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.inner.connections.write().await.remove(&id);
        let topics = self.inner.registry.on_disconnect(id).await;
        debug!(connection = %id, topics, "Connection removed");
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Subscribe a live connection to a match.
    ///
    /// Unknown connections are refused with `success: false`.
    pub async fn subscribe(&self, id: ConnectionId, match_id: &str) -> SubscriptionAck {
        if !self.inner.connections.read().await.contains_key(&id) {
            return SubscriptionAck {
                success: false,
                match_id: match_id.to_owned(),
                subscribers: self.inner.registry.subscriber_count(match_id).await,
            };
        }
        let subscribers = self.inner.registry.subscribe(match_id, id).await;
        SubscriptionAck {
            success: true,
            match_id: match_id.to_owned(),
            subscribers,
        }
    }

    pub async fn unsubscribe(&self, id: ConnectionId, match_id: &str) -> SubscriptionAck {
        let subscribers = self.inner.registry.unsubscribe(match_id, id).await;
        SubscriptionAck {
            success: true,
            match_id: match_id.to_owned(),
            subscribers,
        }
    }

    /// Push `message` to every subscriber of `topic`. Returns how many
    /// connections accepted it.
    pub async fn broadcast(&self, topic: &str, message: ServerMessage) -> usize {
        let subscribers = self.inner.registry.subscribers(topic).await;
        if subscribers.is_empty() {
            return 0;
        }

        let connections = self.inner.connections.read().await;
        let mut delivered = 0;
        for id in subscribers {
            let Some(tx) = connections.get(&id) else {
                continue;
            };
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        connection = %id,
                        topic,
                        event = message.event_name(),
                        "Connection queue full, push dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(connection = %id, topic, "Connection queue closed");
                }
            }
        }
        delivered
    }

    /// Coalesce and broadcast events that became available together.
    pub async fn publish(&self, events: Vec<PipelineEvent>) -> usize {
        let mut delivered = 0;
        for (topic, message) in coalesce(events) {
            delivered += self.broadcast(&topic, message).await;
        }
        delivered
    }

    /// Consume the control-plane bus until shutdown.
    pub async fn run(self, mut bus_rx: PipelineBusReceiver, mut shutdown_rx: watch::Receiver<bool>) {
        info!("FanoutGateway started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("FanoutGateway received shutdown signal");
                        break;
                    }
                }

                received = bus_rx.recv() => {
                    match received {
                        Ok(first) => {
                            let mut events = vec![first];
                            loop {
                                match bus_rx.try_recv() {
                                    Ok(event) => events.push(event),
                                    Err(TryRecvError::Lagged(skipped)) => {
                                        warn!(skipped, "FanoutGateway lagged behind the bus");
                                    }
                                    Err(_) => break,
                                }
                            }
                            let count = events.len();
                            let delivered = self.publish(events).await;
                            debug!(events = count, delivered, "Published bus events");
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "FanoutGateway lagged behind the bus");
                        }
                        Err(RecvError::Closed) => {
                            info!("Pipeline bus closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("FanoutGateway shutdown complete");
    }
}

/// Turn a run of bus events into push messages, keyed by topic.
///
/// Consecutive trades of the same match become one batch; everything else
/// keeps its position, so per-match order is unchanged.
pub fn coalesce(events: Vec<PipelineEvent>) -> Vec<(String, ServerMessage)> {
    let mut out = Vec::new();
    let mut pending: Option<(String, Vec<Value>)> = None;

    for event in events {
        match event {
            PipelineEvent::TradeExecuted { match_id, trade } => {
                if let Some((pending_match, trades)) = &mut pending
                    && *pending_match == match_id
                {
                    trades.push(trade);
                    continue;
                }
                flush(&mut out, pending.take());
                pending = Some((match_id, vec![trade]));
            }
            PipelineEvent::MatchUpdated { match_id, fields } => {
                flush(&mut out, pending.take());
                out.push((
                    match_id.clone(),
                    ServerMessage::MatchUpdated(MatchUpdate { match_id, fields }),
                ));
            }
        }
    }
    flush(&mut out, pending);
    out
}

fn flush(out: &mut Vec<(String, ServerMessage)>, pending: Option<(String, Vec<Value>)>) {
    let Some((match_id, mut trades)) = pending else {
        return;
    };
    let message = if trades.len() == 1 {
        match trades.pop() {
            Some(trade) => ServerMessage::TradeExecuted(trade),
            None => return,
        }
    } else {
        ServerMessage::BatchTradesExecuted(TradeBatch::new(match_id.clone(), trades))
    };
    out.push((match_id, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::pipeline_bus;
    use serde_json::{Map, json};

    fn trade(match_id: &str, n: u64) -> PipelineEvent {
        PipelineEvent::TradeExecuted {
            match_id: match_id.into(),
            trade: json!({ "matchId": match_id, "n": n }),
        }
    }

    fn update(match_id: &str) -> PipelineEvent {
        let mut fields = Map::new();
        fields.insert("eventType".into(), json!("match_started"));
        PipelineEvent::MatchUpdated {
            match_id: match_id.into(),
            fields,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_topic() {
        let gateway = FanoutGateway::new();
        let (a, mut rx_a) = gateway.connect().await;
        let (b, mut rx_b) = gateway.connect().await;
        let (c, mut rx_c) = gateway.connect().await;

        assert_eq!(gateway.subscribe(a, "match:1").await.subscribers, 1);
        assert_eq!(gateway.subscribe(b, "match:1").await.subscribers, 2);
        assert_eq!(gateway.subscribe(c, "match:2").await.subscribers, 1);

        let delivered = gateway
            .broadcast("match:1", ServerMessage::TradeExecuted(json!({ "n": 1 })))
            .await;
        assert_eq!(delivered, 2);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_connections_cannot_subscribe() {
        let gateway = FanoutGateway::new();
        let ack = gateway.subscribe(ConnectionId::new(), "1").await;
        assert!(!ack.success);
        assert_eq!(ack.subscribers, 0);
        assert_eq!(gateway.registry().topic_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_clears_subscriptions() {
        let gateway = FanoutGateway::new();
        let (a, _rx) = gateway.connect().await;
        gateway.subscribe(a, "1").await;
        gateway.subscribe(a, "2").await;

        gateway.disconnect(a).await;
        assert_eq!(gateway.connection_count().await, 0);
        assert_eq!(gateway.registry().topic_count().await, 0);
        assert_eq!(
            gateway
                .broadcast("1", ServerMessage::TradeExecuted(json!({})))
                .await,
            0
        );
    }

    #[test]
    fn coalesces_consecutive_trades_per_match() {
        let messages = coalesce(vec![
            trade("1", 1),
            trade("1", 2),
            trade("2", 3),
            update("1"),
            trade("1", 4),
        ]);

        let names: Vec<(&str, &str)> = messages
            .iter()
            .map(|(topic, m)| (topic.as_str(), m.event_name()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("1", "batchTradesExecuted"),
                ("2", "tradeExecuted"),
                ("1", "matchUpdated"),
                ("1", "tradeExecuted"),
            ]
        );

        let ServerMessage::BatchTradesExecuted(batch) = &messages[0].1 else {
            panic!("expected a batch");
        };
        assert_eq!(batch.count, 2);
        assert_eq!(batch.trades[0]["n"], 1);
        assert_eq!(batch.trades[1]["n"], 2);
    }

    #[tokio::test]
    async fn slow_connection_loses_pushes_without_blocking_others() {
        let gateway = FanoutGateway::new();
        let (slow, _slow_rx) = gateway.connect().await;
        let (fast, mut fast_rx) = gateway.connect().await;
        gateway.subscribe(slow, "1").await;
        gateway.subscribe(fast, "1").await;

        for n in 0..CONNECTION_BUFFER + 1 {
            gateway
                .broadcast("1", ServerMessage::TradeExecuted(json!({ "n": n })))
                .await;
            let _ = fast_rx.try_recv();
        }
        let delivered = gateway
            .broadcast("1", ServerMessage::TradeExecuted(json!({})))
            .await;
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn run_loop_pushes_bus_events() {
        let gateway = FanoutGateway::new();
        let (a, mut rx) = gateway.connect().await;
        gateway.subscribe(a, "1").await;

        let bus = pipeline_bus();
        let bus_rx = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(gateway.clone().run(bus_rx, shutdown_rx));

        bus.send(update("1")).unwrap();
        bus.send(update("2")).unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(message.event_name(), "matchUpdated");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
