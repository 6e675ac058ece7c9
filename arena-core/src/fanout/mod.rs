//! Real-time fan-out on the control-plane side.

pub mod dedupe;
pub mod gateway;
pub mod registry;

pub use dedupe::RecentEvents;
pub use gateway::{CONNECTION_BUFFER, ConnectionReceiver, FanoutGateway, coalesce};
pub use registry::{ConnectionId, TopicRegistry};
