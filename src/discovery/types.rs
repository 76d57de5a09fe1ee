//! Scanner types

use crate::market::Ticker;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Entry strategy that produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    /// 1m trigger confirmed on 5m
    Precision,
    /// Explosive single-candle spike
    Ignition,
    /// 1m trigger traded without confirmation
    Momentum,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyType::Precision => write!(f, "PRECISION"),
            StrategyType::Ignition => write!(f, "IGNITION"),
            StrategyType::Momentum => write!(f, "MOMENTUM"),
        }
    }
}

/// Signal lifecycle shown on a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    #[default]
    Neutral,
    PendingConfirmation,
    /// 5m candle failed to confirm the trigger
    FakeBreakout,
    /// A trade attempt was made
    Triggered,
}

/// Direction of the last live price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    #[default]
    Flat,
}

/// 4h macro analysis computed during discovery
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroAnalysis {
    /// Trend score in [-2, 2]
    pub trend_score: f64,
    pub close: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub macd_bullish: bool,
    /// 1h RSI14 for the overbought entry filter
    pub rsi_1h: f64,
    pub computed_at: DateTime<Utc>,
}

/// 15m analysis computed on every closed 15m candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntradayAnalysis {
    pub rsi: f64,
    pub adx: f64,
    pub atr: f64,
    /// ATR as a percentage of the close
    pub atr_pct: f64,
    pub bb_width_pct: f64,
    pub is_squeeze: bool,
    /// Trend score in [-2, 2]
    pub trend_score: f64,
    /// Relative volume score in {0, 1, 2, 3}
    pub volume_score: u8,
}

/// One pair in the scanner universe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedPair {
    pub symbol: String,
    pub price: Decimal,
    /// 24h quote volume
    pub volume: Decimal,
    pub price_change_pct: Decimal,
    pub price_direction: PriceDirection,
    pub macro_analysis: MacroAnalysis,
    pub intraday: Option<IntradayAnalysis>,
    /// 4h + 15m + volume + 1; `None` until the first 15m evaluation
    pub hotlist_score: Option<f64>,
    pub is_on_hotlist: bool,
    pub strategy_type: Option<StrategyType>,
    pub signal_state: SignalState,
    /// Named boolean conditions for display
    pub conditions: BTreeMap<String, bool>,
}

impl ScannedPair {
    pub fn new(ticker: &Ticker, macro_analysis: MacroAnalysis) -> Self {
        let mut conditions = BTreeMap::new();
        conditions.insert("above_ema200_4h".to_string(), macro_analysis.close > macro_analysis.ema200);
        conditions.insert("macd_bullish_4h".to_string(), macro_analysis.macd_bullish);

        Self {
            symbol: ticker.symbol.clone(),
            price: ticker.last_price,
            volume: ticker.quote_volume,
            price_change_pct: ticker.price_change_pct,
            price_direction: PriceDirection::Flat,
            macro_analysis,
            intraday: None,
            hotlist_score: None,
            is_on_hotlist: false,
            strategy_type: None,
            signal_state: SignalState::Neutral,
            conditions,
        }
    }

    /// Apply a live ticker update
    pub fn apply_ticker(&mut self, ticker: &Ticker) {
        self.price_direction = match ticker.last_price.cmp(&self.price) {
            std::cmp::Ordering::Greater => PriceDirection::Up,
            std::cmp::Ordering::Less => PriceDirection::Down,
            std::cmp::Ordering::Equal => self.price_direction,
        };
        self.price = ticker.last_price;
        self.volume = ticker.quote_volume;
        self.price_change_pct = ticker.price_change_pct;
    }

    /// Take a rescan result while keeping analyzer-owned state
    pub fn merge_rescan(&mut self, fresh: ScannedPair) {
        self.price = fresh.price;
        self.volume = fresh.volume;
        self.price_change_pct = fresh.price_change_pct;
        self.macro_analysis = fresh.macro_analysis;
        for (k, v) in fresh.conditions {
            self.conditions.insert(k, v);
        }
    }
}
