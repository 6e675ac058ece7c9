//! SDK for the Arena relay.
//!
//! Shared by the indexer side (which signs and sends webhooks), the control
//! plane (which verifies them and fans them out) and real-time consumers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod quantity;
pub mod signature;

pub use quantity::Quantity;
