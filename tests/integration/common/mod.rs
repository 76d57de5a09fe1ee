//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hotlist_trader::config::TradingMode;
use hotlist_trader::discovery::{MacroAnalysis, ScannedPair};
use hotlist_trader::exchange::{
    AccountInfo, BookTicker, ExecutionApi, MarketDataApi, OrderBookSnapshot, OrderFill,
    OrderRequest, SymbolFilters,
};
use hotlist_trader::market::{Candle, Interval, Ticker};
use hotlist_trader::persistence::{MemoryStore, StateStore, StoreError};
use hotlist_trader::state::BotState;
use hotlist_trader::trading::{Position, ProfilesConfig, TradingSettings};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn state() -> BotState {
    BotState::new(
        TradingSettings::default(),
        ProfilesConfig::default(),
        TradingMode::Virtual,
        5,
        now(),
    )
}

pub fn ticker(symbol: &str, price: Decimal) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        last_price: price,
        quote_volume: dec!(50000000),
        price_change_pct: dec!(1.5),
    }
}

pub fn pair(symbol: &str, trend_score: f64) -> ScannedPair {
    ScannedPair::new(
        &ticker(symbol, dec!(100)),
        MacroAnalysis {
            trend_score,
            close: 100.0,
            ema200: 90.0,
            rsi: 60.0,
            macd_bullish: true,
            rsi_1h: 55.0,
            computed_at: now(),
        },
    )
}

/// One candle per close, the last one closing just before `end_ms`
pub fn series(interval: Interval, closes: &[f64], volumes: &[f64], end_ms: i64) -> Vec<Candle> {
    let step = interval.duration_ms();
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open_time = end_ms - (n - i as i64) * step;
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                open_time,
                close_time: open_time + step - 1,
                open,
                high: open.max(close) + 0.1,
                low: open.min(close) - 0.1,
                close,
                volume: volumes.get(i).copied().unwrap_or(10.0),
            }
        })
        .collect()
}

/// Steady rise of `step` per candle
pub fn rising(interval: Interval, n: usize, start: f64, step: f64, end_ms: i64) -> Vec<Candle> {
    let closes: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
    let volumes: Vec<f64> = (0..n).map(|i| 10.0 + i as f64 * 0.01).collect();
    series(interval, &closes, &volumes, end_ms)
}

/// Slow decline followed by a high-volume breakout on the last candle
pub fn breakout_1m(end_ms: i64) -> (Vec<Candle>, Candle) {
    let closes: Vec<f64> = (0..61)
        .map(|i| if i < 60 { 100.0 - i as f64 * 0.05 } else { 100.0 - 59.0 * 0.05 + 2.0 })
        .collect();
    let volumes: Vec<f64> = (0..61).map(|i| if i < 60 { 10.0 } else { 25.0 }).collect();
    let mut candles = series(Interval::M1, &closes, &volumes, end_ms);
    let last = candles.pop().unwrap();
    (candles, last)
}

/// Market data double: rising history by default, tight books, deep depth
#[derive(Default)]
pub struct MockMarket {
    pub tickers: Mutex<Vec<Ticker>>,
    pub klines: Mutex<HashMap<(String, Interval), Vec<Candle>>>,
    pub spreads: Mutex<HashMap<String, Decimal>>,
    pub funding: Mutex<HashMap<String, Decimal>>,
    pub fail_klines: AtomicBool,
}

impl MockMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_klines(&self, symbol: &str, interval: Interval, candles: Vec<Candle>) {
        self.klines
            .lock()
            .unwrap()
            .insert((symbol.to_string(), interval), candles);
    }

    /// Spread in percent of mid for a symbol
    pub fn set_spread_pct(&self, symbol: &str, pct: Decimal) {
        self.spreads.lock().unwrap().insert(symbol.to_string(), pct);
    }
}

#[async_trait]
impl MarketDataApi for MockMarket {
    async fn fetch_tickers(&self) -> anyhow::Result<Vec<Ticker>> {
        Ok(self.tickers.lock().unwrap().clone())
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>> {
        if self.fail_klines.load(Ordering::SeqCst) {
            anyhow::bail!("klines unavailable");
        }
        if let Some(candles) = self.klines.lock().unwrap().get(&(symbol.to_string(), interval)) {
            return Ok(candles.clone());
        }
        Ok(rising(interval, limit as usize, 100.0, 0.1, now().timestamp_millis()))
    }

    async fn fetch_book_ticker(&self, symbol: &str) -> anyhow::Result<BookTicker> {
        let spread = self
            .spreads
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(dec!(0.02));
        Ok(BookTicker {
            bid_price: dec!(100),
            ask_price: dec!(100) * (Decimal::ONE + spread / Decimal::ONE_HUNDRED),
        })
    }

    async fn fetch_order_book(&self, _symbol: &str, _limit: u32) -> anyhow::Result<OrderBookSnapshot> {
        // Levels far inside any band around realistic test prices
        Ok(OrderBookSnapshot {
            bids: vec![(dec!(1000000), dec!(1))],
            asks: vec![(dec!(0.0001), dec!(1))],
        })
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<Option<Decimal>> {
        Ok(self.funding.lock().unwrap().get(symbol).copied())
    }
}

/// Execution double filling market orders at a fixed price
pub struct MockExecution {
    pub fill_price: Mutex<Decimal>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub fail: AtomicBool,
    pub step_size: Decimal,
}

impl MockExecution {
    pub fn new(fill_price: Decimal, step_size: Decimal) -> Self {
        Self {
            fill_price: Mutex::new(fill_price),
            orders: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            step_size,
        }
    }

    pub fn set_fill_price(&self, price: Decimal) {
        *self.fill_price.lock().unwrap() = price;
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionApi for MockExecution {
    async fn account_info(&self) -> anyhow::Result<AccountInfo> {
        Ok(AccountInfo {
            balances: HashMap::from([("USDT".to_string(), dec!(10000))]),
        })
    }

    async fn exchange_info(&self) -> anyhow::Result<HashMap<String, SymbolFilters>> {
        let filters = SymbolFilters {
            step_size: self.step_size,
            min_notional: dec!(5),
        };
        Ok(["SOLUSDT", "AVAXUSDT", "NEARUSDT"]
            .iter()
            .map(|s| (s.to_string(), filters))
            .collect())
    }

    async fn create_order(&self, order: OrderRequest) -> anyhow::Result<OrderFill> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("order rejected by venue");
        }
        let price = *self.fill_price.lock().unwrap();
        let fill = OrderFill {
            order_id: self.orders.lock().unwrap().len() as u64 + 1,
            executed_qty: order.quantity,
            cummulative_quote_qty: order.quantity * price,
        };
        self.orders.lock().unwrap().push(order);
        Ok(fill)
    }
}

/// Memory store whose trade writes can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_inserts: AtomicBool,
    pub fail_updates: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get_scalar(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        self.inner.get_scalar(key).await
    }

    async fn set_scalar(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.inner.set_scalar(key, value).await
    }

    async fn insert_trade(&self, position: &Position) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.insert_trade(position).await
    }

    async fn update_trade(&self, position: &Position) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.update_trade(position).await
    }

    async fn load_trades(&self) -> Result<Vec<Position>, StoreError> {
        self.inner.load_trades().await
    }

    async fn set_last_price(&self, symbol: &str, price: Decimal) -> Result<(), StoreError> {
        self.inner.set_last_price(symbol, price).await
    }

    async fn load_last_prices(&self) -> Result<HashMap<String, Decimal>, StoreError> {
        self.inner.load_last_prices().await
    }
}

pub fn dec_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap()
}
