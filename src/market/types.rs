//! Market data types shared by the feed, analyzer and discovery

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle interval used across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1-minute candles (micro trigger)
    #[serde(rename = "1m")]
    M1,
    /// 5-minute candles (confirmation)
    #[serde(rename = "5m")]
    M5,
    /// 15-minute candles (hotlist admission)
    #[serde(rename = "15m")]
    M15,
    /// 1-hour candles (OBV and RSI safety filters)
    #[serde(rename = "1h")]
    H1,
    /// 4-hour candles (macro trend)
    #[serde(rename = "4h")]
    H4,
}

impl Interval {
    /// Venue notation ("1m", "15m", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
        }
    }

    /// Interval length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        match self {
            Interval::M1 => 60_000,
            Interval::M5 => 300_000,
            Interval::M15 => 900_000,
            Interval::H1 => 3_600_000,
            Interval::H4 => 14_400_000,
        }
    }

    /// Fixed capacity of the in-memory window for this interval
    pub fn window_capacity(&self) -> usize {
        match self {
            Interval::M1 => 1000,
            Interval::M5 => 500,
            Interval::M15 => 500,
            Interval::H1 => 200,
            Interval::H4 => 200,
        }
    }

    /// Number of historical candles fetched when a window is first hydrated
    pub fn hydration_limit(&self) -> u32 {
        match self {
            Interval::M1 => 500,
            Interval::M5 => 300,
            Interval::M15 => 300,
            Interval::H1 => 100,
            Interval::H4 => 250,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "1h" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            other => anyhow::bail!("Unsupported interval: {}", other),
        }
    }
}

/// A single OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time (ms since epoch)
    pub open_time: i64,
    /// Close time (ms since epoch)
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
}

impl Candle {
    /// Close above open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close below open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute body size
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High-low range
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Close time as a UTC timestamp
    pub fn close_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.close_time)
            .single()
            .unwrap_or_default()
    }
}

/// Kind of live stream the venue offers per symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StreamKind {
    /// 24h rolling ticker (last price, quote volume)
    Ticker,
    /// Candle stream for an interval
    Kline(Interval),
}

/// Identifier of one live stream subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    pub symbol: String,
    pub kind: StreamKind,
}

impl StreamId {
    /// Ticker stream for a symbol
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: StreamKind::Ticker,
        }
    }

    /// Kline stream for a symbol and interval
    pub fn kline(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            kind: StreamKind::Kline(interval),
        }
    }

    /// Venue stream name, e.g. `btcusdt@kline_1m` or `btcusdt@ticker`
    pub fn stream_name(&self) -> String {
        let symbol = self.symbol.to_lowercase();
        match self.kind {
            StreamKind::Ticker => format!("{}@ticker", symbol),
            StreamKind::Kline(interval) => format!("{}@kline_{}", symbol, interval),
        }
    }
}

/// 24h ticker snapshot from the REST API or the live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    /// Last traded price
    pub last_price: Decimal,
    /// 24h quote asset volume
    pub quote_volume: Decimal,
    /// 24h price change percent
    pub price_change_pct: Decimal,
}

/// Normalized inbound market event
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Live ticker update
    Ticker(Ticker),
    /// Candle update; only `is_final` candles drive analysis
    Kline {
        symbol: String,
        interval: Interval,
        candle: Candle,
        is_final: bool,
    },
}
