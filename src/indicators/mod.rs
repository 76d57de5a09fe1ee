//! Indicator utilities
//!
//! Pure functions over candle and price series. Everything here is stateless
//! and returns `None`/empty when the history is too short.

mod momentum;
mod trend;
mod volatility;
mod volume;

pub use momentum::{rsi, rsi_last};
pub use trend::{adx, ema, ema_last, macd, macd_default, MacdPoint};
pub use volatility::{atr, bollinger, fast_atr, true_ranges, BollingerBands};
pub use volume::{cvd, obv, volume_ratio};
