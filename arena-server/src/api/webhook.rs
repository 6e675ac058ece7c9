//! Control-plane webhook receiver.
//!
//! `POST /webhooks/indexer` accepts the envelopes produced by the dispatch
//! queue, verifies and deduplicates them, and publishes them on the
//! control-plane bus for the fan-out gateway.

use arena_core::events::PipelineEvent;
use arena_sdk::objects::{EnvelopeError, WebhookEnvelope};
use arena_sdk::signature::check_timestamp;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use crate::api::extractors::{SignedBody, SignedBodyError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/indexer", post(receive_indexer_webhook))
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    duplicate: bool,
}

async fn receive_indexer_webhook(
    State(state): State<AppState>,
    body: SignedBody,
) -> Result<impl IntoResponse, WebhookError> {
    let (secret, max_age) = {
        let gateway = state.config.gateway.read().await;
        (gateway.webhook_secret.clone(), gateway.max_webhook_age)
    };
    body.verify(secret.as_deref())?;

    let json = std::str::from_utf8(&body.bytes).map_err(|_| WebhookError::NotUtf8)?;
    let envelope = WebhookEnvelope::from_json(json)?;

    if let Some(max_age) = max_age {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        check_timestamp(envelope.timestamp, max_age_ms).map_err(|_| WebhookError::Stale {
            timestamp: envelope.timestamp,
        })?;
    }

    let event = PipelineEvent::from_envelope(&envelope).ok_or(WebhookError::MissingMatchId)?;

    if let Some(event_id) = envelope.event_id()
        && !state.recent.lock().await.insert(event_id)
    {
        tracing::debug!(event_id, "Duplicate webhook ignored");
        return Ok(Json(WebhookAck { duplicate: true }));
    }

    let match_id = event.match_id().to_owned();
    match state.bus.send(event) {
        Ok(receivers) => {
            tracing::debug!(
                event_type = %envelope.event_type,
                match_id = %match_id,
                receivers,
                "Webhook published"
            );
        }
        Err(_) => {
            tracing::debug!(
                event_type = %envelope.event_type,
                match_id = %match_id,
                "Webhook accepted with no bus consumer"
            );
        }
    }

    Ok(Json(WebhookAck { duplicate: false }))
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignedBodyError),
    #[error("webhook body is not valid UTF-8")]
    NotUtf8,
    #[error("invalid webhook body: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("webhook timestamp {timestamp} is too old")]
    Stale { timestamp: i64 },
    #[error("webhook carries no matchId")]
    MissingMatchId,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejected indexer webhook");
        let status = match &self {
            WebhookError::Signature(e) => return (*e).into_response(),
            WebhookError::NotUtf8 | WebhookError::Envelope(EnvelopeError::Json(_)) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Envelope(_) | WebhookError::MissingMatchId => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WebhookError::Stale { .. } => StatusCode::UNAUTHORIZED,
        };
        (status, self.to_string()).into_response()
    }
}
