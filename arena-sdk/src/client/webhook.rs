//! Webhook verification helper for control-plane implementations.

use crate::objects::WebhookEnvelope;
use crate::signature::{self, SignatureError};

/// Verify and parse an incoming Arena webhook.
///
/// * `signature_header` - value of the `X-Arena-Signature` request header.
/// * `body` - raw JSON request body, exactly as received.
/// * `secret` - the HMAC secret shared with the indexer.
///
/// # Example
///
/// ```ignore
/// use arena_sdk::client::verify_webhook;
///
/// let envelope = verify_webhook(signature_header, &body, secret)?;
/// println!("{} for match {:?}", envelope.event_type, envelope.match_id());
/// ```
pub fn verify_webhook(
    signature_header: &str,
    body: &str,
    secret: &[u8],
) -> Result<WebhookEnvelope, SignatureError> {
    signature::verify(body.as_bytes(), signature_header, secret)?;
    WebhookEnvelope::from_json(body).map_err(|e| match e {
        crate::objects::EnvelopeError::Json(e) => SignatureError::Json(e),
        other => SignatureError::Json(serde::de::Error::custom(other)),
    })
}
