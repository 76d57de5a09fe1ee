//! 1m triggers awaiting 5m confirmation

use crate::discovery::StrategyType;
use crate::market::Candle;
use crate::trading::{ProfileName, TradeCandidate, TradingSettings};
use chrono::{DateTime, Duration, Utc};

/// A micro trigger waiting for the next closed 5m candle
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub symbol: String,
    /// Close of the 1m trigger candle
    pub trigger_price: f64,
    pub triggered_at: DateTime<Utc>,
    /// Low of the trigger candle
    pub reference_low: f64,
    pub settings: TradingSettings,
    pub profile: Option<ProfileName>,
    pub is_ignition: bool,
    pub is_super_bull: bool,
    pub micro_score: u8,
    pub hotlist_score: f64,
}

impl PendingConfirmation {
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.triggered_at >= timeout
    }

    /// A 5m candle that closed after the trigger
    pub fn accepts(&self, candle: &Candle) -> bool {
        candle.close_time > self.triggered_at.timestamp_millis()
    }

    /// Confirmation threshold for this trigger
    pub fn threshold(&self, normal: i32, ignition: i32) -> i32 {
        if self.is_ignition {
            ignition
        } else {
            normal
        }
    }

    pub fn into_candidate(self, final_score: i32, now: DateTime<Utc>) -> TradeCandidate {
        TradeCandidate {
            strategy: if self.is_ignition {
                StrategyType::Ignition
            } else {
                StrategyType::Precision
            },
            symbol: self.symbol,
            trigger_price: self.trigger_price,
            reference_low: self.reference_low,
            is_ignition: self.is_ignition,
            is_super_bull: self.is_super_bull,
            hotlist_score: self.hotlist_score,
            micro_score: self.micro_score,
            final_score: Some(final_score),
            settings: self.settings,
            profile: self.profile,
            created_at: now,
        }
    }
}
