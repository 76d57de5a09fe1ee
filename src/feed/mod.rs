//! Market feed module
//!
//! Normalizes the venue's combined WebSocket stream into [`MarketEvent`]s
//! and turns subscription deltas into venue commands.
//!
//! [`MarketEvent`]: crate::market::MarketEvent

mod binance;
mod types;

pub use binance::{command_message, parse_stream_message, BinanceFeed};
pub use types::{FeedError, FeedEvent, StreamCommand};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Live market data source
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Start the feed. Returns the inbound event channel and the command
    /// channel for subscribe/unsubscribe batches.
    async fn start(
        &self,
    ) -> anyhow::Result<(mpsc::Receiver<FeedEvent>, mpsc::Sender<StreamCommand>)>;
}
