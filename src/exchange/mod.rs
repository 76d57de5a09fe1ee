//! Exchange collaborators
//!
//! Market data and order execution are consumed through two traits so the
//! pipeline can run against the venue, its testnet, or test doubles.

mod binance;
mod types;

pub use binance::BinanceRest;
pub use types::{
    AccountInfo, BookTicker, Level, OrderBookSnapshot, OrderFill, OrderRequest, OrderSide,
    OrderType, SymbolFilters,
};

use crate::market::{Candle, Interval, Ticker};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Public market data
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// All 24h tickers
    async fn fetch_tickers(&self) -> anyhow::Result<Vec<Ticker>>;
    /// Most recent closed and open candles, oldest first
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>>;
    /// Best bid/ask
    async fn fetch_book_ticker(&self, symbol: &str) -> anyhow::Result<BookTicker>;
    /// Depth snapshot
    async fn fetch_order_book(&self, symbol: &str, limit: u32)
        -> anyhow::Result<OrderBookSnapshot>;
    /// Latest perpetual funding rate in percent, `None` when no perpetual exists
    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<Option<Decimal>>;
}

/// Account and order execution
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    async fn account_info(&self) -> anyhow::Result<AccountInfo>;
    /// Lot and notional filters per symbol
    async fn exchange_info(&self) -> anyhow::Result<HashMap<String, SymbolFilters>>;
    async fn create_order(&self, order: OrderRequest) -> anyhow::Result<OrderFill>;
}

/// Round a quantity down to the venue's lot step
pub fn round_to_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }
    ((quantity / step).floor() * step).normalize()
}
