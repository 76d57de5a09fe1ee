//! Exchange collaborator types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Market order (immediate execution)
    Market,
    /// Limit order (price specified)
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

/// An order to submit
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Base asset quantity, already rounded to the lot step
    pub quantity: Decimal,
}

impl OrderRequest {
    /// Market order for a quantity
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
        }
    }
}

/// Execution report for a submitted order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFill {
    pub order_id: u64,
    /// Base quantity filled
    pub executed_qty: Decimal,
    /// Quote quantity spent or received
    pub cummulative_quote_qty: Decimal,
}

impl OrderFill {
    /// Volume-weighted fill price, `None` when nothing was filled
    pub fn average_price(&self) -> Option<Decimal> {
        if self.executed_qty.is_zero() {
            None
        } else {
            Some(self.cummulative_quote_qty / self.executed_qty)
        }
    }
}

/// Lot and notional filters for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Quantity increment
    pub step_size: Decimal,
    /// Minimum order value in quote currency
    pub min_notional: Decimal,
}

/// Account balances
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountInfo {
    /// Free balance per asset
    pub balances: HashMap<String, Decimal>,
}

impl AccountInfo {
    /// Free balance of an asset, zero when absent
    pub fn free(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or_default()
    }
}

/// Best bid/ask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookTicker {
    pub bid_price: Decimal,
    pub ask_price: Decimal,
}

impl BookTicker {
    /// Spread as a percentage of the mid price
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = (self.bid_price + self.ask_price) / Decimal::TWO;
        if mid <= Decimal::ZERO {
            return None;
        }
        Some((self.ask_price - self.bid_price) / mid * Decimal::ONE_HUNDRED)
    }
}

/// Price level (price, quantity)
pub type Level = (Decimal, Decimal);

/// Order book depth snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBookSnapshot {
    /// Best first
    pub bids: Vec<Level>,
    /// Best first
    pub asks: Vec<Level>,
}

impl OrderBookSnapshot {
    /// Quote notional resting within `band_pct` percent of `price` on both sides
    pub fn liquidity_within(&self, price: Decimal, band_pct: Decimal) -> Decimal {
        let band = price * band_pct / Decimal::ONE_HUNDRED;
        let lower = price - band;
        let upper = price + band;

        let bids: Decimal = self
            .bids
            .iter()
            .filter(|(p, _)| *p >= lower)
            .map(|(p, q)| p * q)
            .sum();
        let asks: Decimal = self
            .asks
            .iter()
            .filter(|(p, _)| *p <= upper)
            .map(|(p, q)| p * q)
            .sum();
        bids + asks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_fill_average_price() {
        let fill = OrderFill {
            order_id: 1,
            executed_qty: dec!(2),
            cummulative_quote_qty: dec!(201),
        };
        assert_eq!(fill.average_price(), Some(dec!(100.5)));

        let empty = OrderFill {
            order_id: 2,
            executed_qty: dec!(0),
            cummulative_quote_qty: dec!(0),
        };
        assert!(empty.average_price().is_none());
    }

    #[test]
    fn test_order_fill_deserialize() {
        let json = r#"{"symbol":"BTCUSDT","orderId":28,"executedQty":"0.00100000","cummulativeQuoteQty":"50.00000000","status":"FILLED"}"#;
        let fill: OrderFill = serde_json::from_str(json).unwrap();
        assert_eq!(fill.order_id, 28);
        assert_eq!(fill.average_price(), Some(dec!(50000)));
    }

    #[test]
    fn test_spread_pct() {
        let book = BookTicker {
            bid_price: dec!(99.95),
            ask_price: dec!(100.05),
        };
        assert_eq!(book.spread_pct(), Some(dec!(0.1)));
    }

    #[test]
    fn test_liquidity_within_band() {
        let book = OrderBookSnapshot {
            bids: vec![(dec!(99.8), dec!(10)), (dec!(99.0), dec!(1000))],
            asks: vec![(dec!(100.2), dec!(10)), (dec!(101.0), dec!(1000))],
        };
        // Only levels within +/-0.5% of 100 count
        assert_eq!(book.liquidity_within(dec!(100), dec!(0.5)), dec!(2000));
    }
}
