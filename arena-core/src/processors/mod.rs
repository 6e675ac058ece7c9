//! Long-running processors of the indexer side.
//!
//! The enricher lives in [`crate::enrichment`]; the fan-out gateway in
//! [`crate::fanout`].

pub mod webhook_dispatcher;

pub use webhook_dispatcher::{DispatchError, DispatchQueue, DispatchReceipt, WebhookDispatcher};
