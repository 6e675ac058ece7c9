//! Chain event ingestion.
//!
//! `POST /events` takes a JSON array of decoded logs from the upstream
//! indexer and queues them for enrichment in `(chainId, block, logIndex)`
//! order.

use arena_core::events::{ChainEvent, ChainEventError};
use arena_sdk::objects::{ChainEventWire, IngestResponse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::error::Category;

use crate::api::extractors::{SignedBody, SignedBodyError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(ingest_events))
}

async fn ingest_events(
    State(state): State<AppState>,
    body: SignedBody,
) -> Result<impl IntoResponse, IngestError> {
    let secret = state.config.indexer.read().await.ingest_secret.clone();
    body.verify(secret.as_deref())?;

    let wires: Vec<ChainEventWire> = serde_json::from_slice(&body.bytes)?;
    let mut events = wires
        .into_iter()
        .map(ChainEvent::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    events.sort_by_key(|e| (e.chain_id, e.key()));

    let chain_tx = state.chain_tx.as_ref().ok_or(IngestError::Disabled)?;
    let accepted = events.len();
    for event in events {
        chain_tx
            .send(event)
            .await
            .map_err(|_| IngestError::PipelineClosed)?;
    }
    tracing::debug!(accepted, "Chain events queued");

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted })))
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Signature(#[from] SignedBodyError),
    #[error("invalid request body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("invalid chain event: {0}")]
    Event(#[from] ChainEventError),
    #[error("event ingestion is disabled")]
    Disabled,
    #[error("enrichment pipeline is shutting down")]
    PipelineClosed,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejected chain event batch");
        let status = match &self {
            IngestError::Signature(e) => return (*e).into_response(),
            IngestError::Body(e) => match e.classify() {
                Category::Data => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            },
            IngestError::Event(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::Disabled | IngestError::PipelineClosed => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}
