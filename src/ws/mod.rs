//! WebSocket transport
//!
//! Reconnecting client with ping keepalive, an outbound command channel and
//! a capped exponential backoff that resets after every successful connect.

mod backoff;
mod client;
mod types;

pub use backoff::Backoff;
pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
