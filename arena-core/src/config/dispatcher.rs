//! Outbound webhook configuration.

use std::time::Duration;
use url::Url;

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Control-plane webhook receiver.
    pub endpoint: Url,
    /// HMAC key. Requests go out unsigned when absent.
    pub secret: Option<Box<[u8]>>,
    /// Upper bound for one delivery, connect to last body byte.
    pub timeout: Duration,
}

impl DispatcherConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            secret: None,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.secret.is_some()
    }
}
