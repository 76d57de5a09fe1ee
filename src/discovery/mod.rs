//! Pair discovery
//!
//! Venue-wide macro scan producing the scanner universe. Each surviving
//! symbol carries a 4h trend score and the 1h RSI used by the entry gate.

mod scanner;
mod types;

pub use scanner::{analyze_macro, macro_trend_score, PairDiscovery, MIN_1H_CANDLES, MIN_4H_CANDLES};
pub use types::{
    IntradayAnalysis, MacroAnalysis, PriceDirection, ScannedPair, SignalState, StrategyType,
};
