#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod enrichment;
pub mod entities;
pub mod events;
pub mod fanout;
pub mod framework;
pub mod processors;
pub mod store;
