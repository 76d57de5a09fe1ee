//! Circuit breaker module
//!
//! Drawdown, loss-streak, sentiment and BTC-crash supervision

mod btc_monitor;
mod circuit;
mod types;

pub use btc_monitor::BtcDropMonitor;
pub use circuit::CircuitBreaker;
pub use types::{BreakerInputs, BreakerTransition, CircuitBreakerStatus};
