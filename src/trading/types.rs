//! Trading engine types

use super::{ProfileName, TradingSettings};
use crate::breaker::CircuitBreakerStatus;
use crate::discovery::StrategyType;
use crate::persistence::StoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A proposed entry emitted by the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCandidate {
    pub symbol: String,
    pub strategy: StrategyType,
    /// Close of the trigger candle
    pub trigger_price: f64,
    /// Low of the trigger candle; the stop for ignition entries
    pub reference_low: f64,
    pub is_ignition: bool,
    /// Hotlist score at or above the super-bull threshold
    pub is_super_bull: bool,
    pub hotlist_score: f64,
    pub micro_score: u8,
    /// Micro plus 5m confirmation score, when confirmed
    pub final_score: Option<i32>,
    /// Settings frozen into the position if it opens
    pub settings: TradingSettings,
    pub profile: Option<ProfileName>,
    pub created_at: DateTime<Utc>,
}

/// Position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Filled,
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TrailingStop,
    Breakeven,
    TakeProfit,
    CircuitBreaker,
    Manual,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TrailingStop => "TRAILING_STOP",
            CloseReason::Breakeven => "BREAKEVEN",
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::CircuitBreaker => "CIRCUIT_BREAKER",
            CloseReason::Manual => "MANUAL",
        };
        f.write_str(s)
    }
}

/// Which partial take-profit fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialKind {
    First,
    Second,
}

/// A partial exit to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialExit {
    pub kind: PartialKind,
    pub quantity: Decimal,
}

/// Reason an entry attempt was refused
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Trading disabled by the operator
    BotStopped,
    /// Breaker blocks new entries
    BreakerActive(CircuitBreakerStatus),
    /// Last 1m range did not expand
    NoRangeExpansion { range: f64, required: f64 },
    /// 1h OBV below its EMA20
    ObvBelowAverage,
    SpreadTooWide { spread_pct: Decimal, max_pct: Decimal },
    /// BTC 4h EMA50 below EMA200
    BtcRegimeBearish,
    FundingTooHigh { rate_pct: Decimal, max_pct: Decimal },
    InsufficientLiquidity { available: Decimal, required: Decimal },
    /// Another open position shares the sector
    SectorCorrelated { sector: String },
    TooManyCorrelated { open: usize, max: usize },
    RsiOverbought { rsi: f64, max: f64 },
    ParabolicMove { move_pct: f64, max_pct: f64 },
    Cooldown { until: DateTime<Utc> },
    MaxPositions { open: usize, max: usize },
    DuplicatePosition,
    /// A gate input could not be fetched or computed
    DataUnavailable(&'static str),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BotStopped => write!(f, "bot stopped"),
            RejectReason::BreakerActive(status) => write!(f, "circuit breaker {}", status),
            RejectReason::NoRangeExpansion { range, required } => {
                write!(f, "no range expansion ({:.6} < {:.6})", range, required)
            }
            RejectReason::ObvBelowAverage => write!(f, "1h OBV below EMA20"),
            RejectReason::SpreadTooWide { spread_pct, max_pct } => {
                write!(f, "spread {:.4}% > {}%", spread_pct, max_pct)
            }
            RejectReason::BtcRegimeBearish => write!(f, "BTC 4h regime bearish"),
            RejectReason::FundingTooHigh { rate_pct, max_pct } => {
                write!(f, "funding {}% > {}%", rate_pct, max_pct)
            }
            RejectReason::InsufficientLiquidity {
                available,
                required,
            } => write!(f, "liquidity ${:.0} < ${}", available, required),
            RejectReason::SectorCorrelated { sector } => {
                write!(f, "sector '{}' already open", sector)
            }
            RejectReason::TooManyCorrelated { open, max } => {
                write!(f, "{} correlated trades open (max {})", open, max)
            }
            RejectReason::RsiOverbought { rsi, max } => {
                write!(f, "1h RSI {:.1} > {:.1}", rsi, max)
            }
            RejectReason::ParabolicMove { move_pct, max_pct } => {
                write!(f, "parabolic move {:.2}% > {:.2}%", move_pct, max_pct)
            }
            RejectReason::Cooldown { until } => write!(f, "cooldown until {}", until),
            RejectReason::MaxPositions { open, max } => {
                write!(f, "{} positions open (max {})", open, max)
            }
            RejectReason::DuplicatePosition => write!(f, "position already open"),
            RejectReason::DataUnavailable(what) => write!(f, "{} unavailable", what),
        }
    }
}

/// Result of an entry attempt that did not error
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(Uuid),
    Rejected(RejectReason),
}

/// Trading engine errors. Any of these aborts the operation without
/// mutating state.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Order failed for {symbol}: {reason}")]
    Order { symbol: String, reason: String },
    #[error("Quantity for {symbol} rounds to zero")]
    ZeroQuantity { symbol: String },
    #[error("Order notional {notional} for {symbol} under minimum {min_notional}")]
    BelowMinNotional {
        symbol: String,
        notional: Decimal,
        min_notional: Decimal,
    },
    #[error("Non-positive risk per unit for {symbol}")]
    InvalidRisk { symbol: String },
    #[error("No price available for {0}")]
    NoPrice(String),
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
    #[error("Position not found: {0}")]
    PositionNotFound(Uuid),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}
