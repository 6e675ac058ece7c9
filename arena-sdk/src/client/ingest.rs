use reqwest::Url;

use super::ClientError;
use crate::objects::{ChainEventWire, IngestResponse};
use crate::signature::{SIGNATURE_HEADER, SignedPayload};

/// Pushes decoded chain events into a relay's `POST /events` endpoint.
///
/// Upstream indexer adapters use this to hand over logs in finalized order.
pub struct IngestClient {
    http: reqwest::Client,
    base_url: Url,
    secret: Option<Box<[u8]>>,
}

impl IngestClient {
    pub fn new(base_url: Url, secret: Option<Box<[u8]>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret,
        }
    }

    /// `POST /events` - submit a batch of events.
    pub async fn submit(&self, events: &[ChainEventWire]) -> Result<IngestResponse, ClientError> {
        let value = serde_json::to_value(events)?;
        let payload = SignedPayload::new(&value, self.secret.as_deref());
        let url = self.base_url.join("/events")?;

        let mut request = self
            .http
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(sig) = &payload.signature {
            request = request.header(SIGNATURE_HEADER, sig);
        }
        let resp = request.body(payload.json).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ClientError::Json)
    }
}
