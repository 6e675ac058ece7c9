//! Webhook dispatch.
//!
//! [`WebhookDispatcher`] builds the canonical envelope, signs it and performs
//! exactly one POST under a timeout, reporting the result to its caller.
//! [`DispatchQueue`] is that caller: it delivers requests in the order the
//! enricher produced them and logs failures with enough context to replay
//! them by hand. Nothing is retried.

use arena_sdk::objects::{WebhookEnvelope, WebhookEventType};
use arena_sdk::signature::{SIGNATURE_HEADER, SignedPayload, now_millis};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ConfigStore, DispatcherConfig};
use crate::events::{DispatchReceiver, DispatchRequest};

/// Errors that can occur during webhook delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook to {url} timed out")]
    Timeout { url: Url },

    #[error("webhook to {url} failed: {source}")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// The control plane answered with a non-2xx status.
    #[error("webhook to {url} rejected with status {status}: {body}")]
    DeliveryFailed { url: Url, status: u16, body: String },
}

impl DispatchError {
    pub fn url(&self) -> &Url {
        match self {
            DispatchError::Timeout { url }
            | DispatchError::Network { url, .. }
            | DispatchError::DeliveryFailed { url, .. } => url,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::DeliveryFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A successful delivery.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub status: u16,
    /// Exactly what was sent.
    pub payload: SignedPayload,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    http_client: reqwest::Client,
    config: ConfigStore<DispatcherConfig>,
}

impl WebhookDispatcher {
    pub fn new(config: ConfigStore<DispatcherConfig>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .user_agent(concat!("arena-relay/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// Wrap `payload` in the envelope, sign it and POST it once.
    pub async fn dispatch(
        &self,
        event_type: WebhookEventType,
        payload: Value,
    ) -> Result<DispatchReceipt, DispatchError> {
        let config = self.config.snapshot().await;
        let envelope = WebhookEnvelope::new(event_type, now_millis(), payload);
        let signed = envelope.sign(config.secret.as_deref());

        let mut request = self
            .http_client
            .post(config.endpoint.clone())
            .timeout(config.timeout)
            .header("Content-Type", "application/json");
        if let Some(signature) = &signed.signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let url = config.endpoint;
        let response = request
            .body(signed.json.clone())
            .send()
            .await
            .map_err(|e| classify(url.clone(), e))?;

        let status = response.status();
        if status.is_success() {
            Ok(DispatchReceipt {
                status: status.as_u16(),
                payload: signed,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DispatchError::DeliveryFailed {
                url,
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn classify(url: Url, e: reqwest::Error) -> DispatchError {
    if e.is_timeout() {
        DispatchError::Timeout { url }
    } else {
        DispatchError::Network { url, source: e }
    }
}

/// Delivers queued webhooks one at a time, in queue order.
pub struct DispatchQueue {
    dispatcher: WebhookDispatcher,
    requests_rx: DispatchReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl DispatchQueue {
    pub fn new(
        dispatcher: WebhookDispatcher,
        requests_rx: DispatchReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dispatcher,
            requests_rx,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!("DispatchQueue started");
        self.check_signing().await;
        let mut config_rx = self.dispatcher.config.subscribe();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("DispatchQueue received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_rx.changed() => {
                    let endpoint = self.dispatcher.config.read().await.endpoint.clone();
                    info!(
                        version = self.dispatcher.config.version(),
                        endpoint = %endpoint,
                        "Dispatcher config reloaded"
                    );
                    self.check_signing().await;
                }

                Some(request) = self.requests_rx.recv() => {
                    self.deliver(request).await;
                }

                else => {
                    info!("Dispatch channel closed");
                    break;
                }
            }
        }

        // finish what the enricher already handed over
        self.requests_rx.close();
        let mut drained = 0usize;
        while let Some(request) = self.requests_rx.recv().await {
            self.deliver(request).await;
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "Delivered queued webhooks before shutdown");
        }

        info!("DispatchQueue shutdown complete");
    }

    async fn check_signing(&self) {
        if !self.dispatcher.config.read().await.is_signed() {
            warn!("No dispatcher secret configured, webhooks will be sent unsigned");
        }
    }

    async fn deliver(&self, request: DispatchRequest) {
        let DispatchRequest {
            event_type,
            event_id,
            payload,
        } = request;

        match self.dispatcher.dispatch(event_type, payload.clone()).await {
            Ok(receipt) => {
                debug!(
                    event_type = %event_type,
                    event_id = %event_id,
                    status = receipt.status,
                    signed = receipt.payload.is_signed(),
                    "Webhook delivered"
                );
            }
            Err(e) => {
                let body = match &e {
                    DispatchError::DeliveryFailed { body, .. } => body.as_str(),
                    _ => "",
                };
                error!(
                    event_type = %event_type,
                    event_id = %event_id,
                    url = %e.url(),
                    status = ?e.status(),
                    response_body = %body,
                    payload = %payload,
                    error = %e,
                    "Webhook delivery failed"
                );
            }
        }
    }
}
