//! Turns raw chain events into copy-trading notifications.
//!
//! [`EventEnricher`] drives [`VaultResolver`] and [`PositionSizer`] per event
//! and re-encodes DEX calls through [`trade_action`].

pub mod enricher;
pub mod position_sizer;
pub mod trade_action;
pub mod vault_resolver;

pub use enricher::{EnrichmentOutcome, EventEnricher, OrderingGuard, SkipReason};
pub use position_sizer::{MAX_BPS, PositionSizer};
pub use trade_action::{EncodeError, EncodedCall, EnrichedTradeAction};
pub use vault_resolver::VaultResolver;
