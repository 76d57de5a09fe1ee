//! Market data module
//!
//! Candle and ticker types plus the bounded windows the analyzer keeps per
//! (symbol, interval).

mod types;
mod window;

pub use types::{Candle, Interval, MarketEvent, StreamId, StreamKind, Ticker};
pub use window::{KlineStore, KlineWindow, PushOutcome};
