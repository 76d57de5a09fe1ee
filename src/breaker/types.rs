//! Circuit breaker types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerStatus {
    /// Trading normally
    #[default]
    None,
    /// BTC dropping; entries allowed at reduced size
    WarningBtcDrop,
    /// BTC crashed; all positions liquidated, sticky
    HaltedBtcDrop,
    /// Daily drawdown limit hit, sticky until day rollover
    HaltedDrawdown,
    /// Too many consecutive losses; cleared by a win
    PausedLossStreak,
    /// Fear & Greed at an extreme; cleared when it normalizes
    PausedExtremeSentiment,
}

impl CircuitBreakerStatus {
    /// Hard halts are not re-evaluated until reset
    pub fn is_hard_halt(&self) -> bool {
        matches!(
            self,
            CircuitBreakerStatus::HaltedBtcDrop | CircuitBreakerStatus::HaltedDrawdown
        )
    }

    /// New entries are refused in this state
    pub fn blocks_entries(&self) -> bool {
        !matches!(
            self,
            CircuitBreakerStatus::None | CircuitBreakerStatus::WarningBtcDrop
        )
    }

    /// Ordinal for the metrics gauge
    pub fn ordinal(&self) -> u8 {
        match self {
            CircuitBreakerStatus::None => 0,
            CircuitBreakerStatus::WarningBtcDrop => 1,
            CircuitBreakerStatus::PausedExtremeSentiment => 2,
            CircuitBreakerStatus::PausedLossStreak => 3,
            CircuitBreakerStatus::HaltedDrawdown => 4,
            CircuitBreakerStatus::HaltedBtcDrop => 5,
        }
    }
}

impl fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitBreakerStatus::None => "NONE",
            CircuitBreakerStatus::WarningBtcDrop => "WARNING_BTC_DROP",
            CircuitBreakerStatus::HaltedBtcDrop => "HALTED_BTC_DROP",
            CircuitBreakerStatus::HaltedDrawdown => "HALTED_DRAWDOWN",
            CircuitBreakerStatus::PausedLossStreak => "PAUSED_LOSS_STREAK",
            CircuitBreakerStatus::PausedExtremeSentiment => "PAUSED_EXTREME_SENTIMENT",
        };
        f.write_str(s)
    }
}

/// Snapshot of everything the breaker looks at
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerInputs {
    /// Realized PnL since the start of the day
    pub daily_pnl: Decimal,
    pub day_start_balance: Decimal,
    pub consecutive_losses: u32,
    /// Latest Fear & Greed value
    pub sentiment: Option<u8>,
    /// BTC drop over the monitoring window, in percent (positive = down)
    pub btc_drop_pct: Option<f64>,
}

/// A state change produced by an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerTransition {
    pub from: CircuitBreakerStatus,
    pub to: CircuitBreakerStatus,
}

impl BreakerTransition {
    /// All open positions must be closed immediately
    pub fn requires_liquidation(&self) -> bool {
        self.to == CircuitBreakerStatus::HaltedBtcDrop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_halts() {
        assert!(CircuitBreakerStatus::HaltedBtcDrop.is_hard_halt());
        assert!(CircuitBreakerStatus::HaltedDrawdown.is_hard_halt());
        assert!(!CircuitBreakerStatus::PausedLossStreak.is_hard_halt());
        assert!(!CircuitBreakerStatus::None.is_hard_halt());
    }

    #[test]
    fn test_blocks_entries() {
        assert!(!CircuitBreakerStatus::None.blocks_entries());
        assert!(!CircuitBreakerStatus::WarningBtcDrop.blocks_entries());
        assert!(CircuitBreakerStatus::PausedExtremeSentiment.blocks_entries());
        assert!(CircuitBreakerStatus::HaltedDrawdown.blocks_entries());
    }

    #[test]
    fn test_display_matches_serde() {
        let status = CircuitBreakerStatus::PausedLossStreak;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, format!("\"{}\"", status));
    }
}
