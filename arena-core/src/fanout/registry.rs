//! Which live connections listen to which match.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifier of one real-time connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `topic → {connection}`.
///
/// A topic key exists only while at least one connection is subscribed to
/// it. Every mutation happens under one write lock, so returned counts are
/// the set size at that instant.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, HashSet<ConnectionId>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `topic`; returns the topic's subscriber count.
    pub async fn subscribe(&self, topic: &str, connection: ConnectionId) -> usize {
        let mut topics = self.topics.write().await;
        let subscribers = topics.entry(topic.to_owned()).or_default();
        subscribers.insert(connection);
        subscribers.len()
    }

    /// Remove `connection` from `topic`; returns the remaining count.
    /// Unknown topics and connections are a no-op.
    pub async fn unsubscribe(&self, topic: &str, connection: ConnectionId) -> usize {
        let mut topics = self.topics.write().await;
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };
        subscribers.remove(&connection);
        let remaining = subscribers.len();
        if remaining == 0 {
            topics.remove(topic);
        }
        remaining
    }

    /// Remove `connection` from every topic. Returns how many topics it left.
    pub async fn on_disconnect(&self, connection: ConnectionId) -> usize {
        let mut topics = self.topics.write().await;
        let mut left = 0;
        topics.retain(|_, subscribers| {
            if subscribers.remove(&connection) {
                left += 1;
            }
            !subscribers.is_empty()
        });
        left
    }

    /// Snapshot of a topic's subscribers.
    pub async fn subscribers(&self, topic: &str) -> Vec<ConnectionId> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, HashSet::len)
    }

    pub async fn topic_count(&self) -> usize {
        self.topics.read().await.len()
    }

    #[cfg(test)]
    async fn has_empty_topic(&self) -> bool {
        self.topics.read().await.values().any(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn counts_follow_membership() {
        let registry = TopicRegistry::new();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());

        assert_eq!(registry.subscribe("1", a).await, 1);
        assert_eq!(registry.subscribe("1", b).await, 2);
        assert_eq!(registry.subscribe("1", b).await, 2);
        assert_eq!(registry.subscribe("2", a).await, 1);
        assert_eq!(registry.topic_count().await, 2);

        assert_eq!(registry.unsubscribe("1", a).await, 1);
        assert_eq!(registry.unsubscribe("1", b).await, 0);
        assert_eq!(registry.topic_count().await, 1);
        assert_eq!(registry.subscriber_count("1").await, 0);
    }

    #[tokio::test]
    async fn underflow_is_a_no_op() {
        let registry = TopicRegistry::new();
        let a = ConnectionId::new();
        assert_eq!(registry.unsubscribe("missing", a).await, 0);
        assert_eq!(registry.on_disconnect(a).await, 0);

        registry.subscribe("1", ConnectionId::new()).await;
        assert_eq!(registry.unsubscribe("1", a).await, 1);
        assert_eq!(registry.topic_count().await, 1);
    }

    #[tokio::test]
    async fn disconnect_leaves_every_topic() {
        let registry = TopicRegistry::new();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        for topic in ["1", "2", "3"] {
            registry.subscribe(topic, a).await;
        }
        registry.subscribe("2", b).await;

        assert_eq!(registry.on_disconnect(a).await, 3);
        assert_eq!(registry.topic_count().await, 1);
        assert_eq!(registry.subscribers("2").await, vec![b]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Subscribe(usize, usize),
        Unsubscribe(usize, usize),
        Disconnect(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize, 0..5usize).prop_map(|(t, c)| Op::Subscribe(t, c)),
            (0..4usize, 0..5usize).prop_map(|(t, c)| Op::Unsubscribe(t, c)),
            (0..5usize).prop_map(Op::Disconnect),
        ]
    }

    proptest! {
        #[test]
        fn no_empty_topic_at_rest(ops in prop::collection::vec(op(), 0..64)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let registry = TopicRegistry::new();
                let connections: Vec<ConnectionId> = (0..5).map(|_| ConnectionId::new()).collect();
                let mut model: HashMap<usize, HashSet<usize>> = HashMap::new();

                for op in ops {
                    match op {
                        Op::Subscribe(t, c) => {
                            let count = registry.subscribe(&t.to_string(), connections[c]).await;
                            let set = model.entry(t).or_default();
                            set.insert(c);
                            assert_eq!(count, set.len());
                        }
                        Op::Unsubscribe(t, c) => {
                            let count = registry.unsubscribe(&t.to_string(), connections[c]).await;
                            let remaining = model.get_mut(&t).map_or(0, |set| {
                                set.remove(&c);
                                set.len()
                            });
                            if remaining == 0 {
                                model.remove(&t);
                            }
                            assert_eq!(count, remaining);
                        }
                        Op::Disconnect(c) => {
                            registry.on_disconnect(connections[c]).await;
                            model.retain(|_, set| {
                                set.remove(&c);
                                !set.is_empty()
                            });
                        }
                    }
                    assert!(!registry.has_empty_topic().await);
                    assert_eq!(registry.topic_count().await, model.len());
                }
            });
        }
    }
}
