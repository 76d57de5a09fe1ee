//! Circuit breaker state machine

use super::{BreakerInputs, BreakerTransition, CircuitBreakerStatus};
use crate::config::BreakerConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Supervisory safety state machine.
///
/// Checks run in a fixed order and the first match wins:
/// 1. daily drawdown  -> `HaltedDrawdown`
/// 2. loss streak     -> `PausedLossStreak`
/// 3. sentiment       -> `PausedExtremeSentiment`
/// 4. BTC 5m drop     -> `HaltedBtcDrop` / `WarningBtcDrop`
///
/// Anything else resolves to `None`. Hard halts are never re-evaluated.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Status the breaker should be in given the inputs
    pub fn next_status(
        &self,
        current: CircuitBreakerStatus,
        inputs: &BreakerInputs,
    ) -> CircuitBreakerStatus {
        if current.is_hard_halt() {
            return current;
        }

        if self.drawdown_exceeded(inputs) {
            return CircuitBreakerStatus::HaltedDrawdown;
        }

        if inputs.consecutive_losses >= self.config.consecutive_loss_limit {
            return CircuitBreakerStatus::PausedLossStreak;
        }

        if self.config.sentiment_filter_enabled {
            if let Some(value) = inputs.sentiment {
                if value <= self.config.extreme_fear || value >= self.config.extreme_greed {
                    return CircuitBreakerStatus::PausedExtremeSentiment;
                }
            }
        }

        if let Some(drop) = inputs.btc_drop_pct {
            if drop >= self.config.btc_drop_halt_pct {
                return CircuitBreakerStatus::HaltedBtcDrop;
            }
            if drop >= self.config.btc_drop_warn_pct {
                return CircuitBreakerStatus::WarningBtcDrop;
            }
        }

        CircuitBreakerStatus::None
    }

    /// Evaluate and report a transition when the status changes
    pub fn evaluate(
        &self,
        current: CircuitBreakerStatus,
        inputs: &BreakerInputs,
    ) -> Option<BreakerTransition> {
        let next = self.next_status(current, inputs);
        if next == current {
            return None;
        }
        Some(BreakerTransition {
            from: current,
            to: next,
        })
    }

    /// Maximum tolerated daily loss in quote currency
    pub fn drawdown_limit(&self, day_start_balance: Decimal) -> Decimal {
        day_start_balance * self.config.max_daily_drawdown_pct / dec!(100)
    }

    fn drawdown_exceeded(&self, inputs: &BreakerInputs) -> bool {
        if inputs.daily_pnl >= Decimal::ZERO || inputs.day_start_balance <= Decimal::ZERO {
            return false;
        }
        -inputs.daily_pnl >= self.drawdown_limit(inputs.day_start_balance)
    }
}
