//! Control-plane (webhook receiver + fan-out) configuration.

use std::time::Duration;

pub const DEFAULT_DEDUPE_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Shared HMAC key with the indexer's dispatcher. Unverified when absent.
    pub webhook_secret: Option<Box<[u8]>>,
    /// Envelopes older than this are rejected. No age check when absent.
    pub max_webhook_age: Option<Duration>,
    /// How many recent event ids are remembered for deduplication.
    pub dedupe_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            max_webhook_age: None,
            dedupe_capacity: DEFAULT_DEDUPE_CAPACITY,
        }
    }
}
