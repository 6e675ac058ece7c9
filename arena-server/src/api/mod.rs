//! HTTP and WebSocket endpoints.
//!
//! - `POST /events`           - chain event ingestion (indexer side)
//! - `POST /webhooks/indexer` - webhook receiver (control plane)
//! - `GET  /ws`               - real-time match stream (control plane)

pub mod extractors;
pub mod ingest;
pub mod webhook;
pub mod ws;
