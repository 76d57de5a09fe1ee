//! Stream subscription manager
//!
//! Keeps live feeds open only for relevant symbols: tickers for the
//! scanner and open positions, 15m candles for the scanner, 1m and 5m
//! candles for the hotlist, and BTC 1m for the circuit breaker.

mod subscriptions;

pub use subscriptions::{desired_streams, SubscriptionManager};
