//! Feed types

use crate::market::{MarketEvent, StreamId};
use thiserror::Error;

/// Event delivered by a market feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Normalized market data
    Market(MarketEvent),
    /// Link (re)established; all subscriptions must be restored
    Connected,
    /// Link lost, reconnect attempt pending
    Reconnecting { attempt: u32 },
    /// Feed stopped for good
    Disconnected,
}

/// Outbound feed control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Subscribe(Vec<StreamId>),
    Unsubscribe(Vec<StreamId>),
}

impl StreamCommand {
    /// Venue method name
    pub fn method(&self) -> &'static str {
        match self {
            StreamCommand::Subscribe(_) => "SUBSCRIBE",
            StreamCommand::Unsubscribe(_) => "UNSUBSCRIBE",
        }
    }

    pub fn streams(&self) -> &[StreamId] {
        match self {
            StreamCommand::Subscribe(s) | StreamCommand::Unsubscribe(s) => s,
        }
    }
}

/// Inbound message that could not be normalized
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed {event} payload: {reason}")]
    Malformed { event: &'static str, reason: String },
}
