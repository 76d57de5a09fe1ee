//! Aggregate bot state
//!
//! Owned by the coordinator task. Every mutation goes through a method here
//! or through the engine and analyzer, which receive `&mut BotState`.

use crate::analyzer::PendingConfirmation;
use crate::breaker::{BreakerInputs, BtcDropMonitor, CircuitBreakerStatus};
use crate::config::TradingMode;
use crate::discovery::ScannedPair;
use crate::persistence::{keys, StateStore, StoreError};
use crate::sentiment::SentimentReading;
use crate::trading::{
    MarketRegime, Position, PositionStatus, ProfileName, ProfilesConfig, TradingSettings,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Everything the pipeline reads and writes
#[derive(Debug)]
pub struct BotState {
    pub settings: TradingSettings,
    pub profiles: ProfilesConfig,
    pub mode: TradingMode,
    /// Operator switch; entries are refused while false
    pub running: bool,
    pub balance: Decimal,
    /// Open positions in opening order
    pub positions: Vec<Position>,
    pub history: Vec<Position>,
    pub scanner: BTreeMap<String, ScannedPair>,
    pub hotlist: BTreeSet<String>,
    pub pending: HashMap<String, PendingConfirmation>,
    pub last_prices: HashMap<String, Decimal>,
    pub breaker_status: CircuitBreakerStatus,
    pub day_start_balance: Decimal,
    pub daily_pnl: Decimal,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
    pub current_day: NaiveDate,
    /// Symbol -> no entries before this instant
    pub cooldowns: HashMap<String, DateTime<Utc>>,
    pub sentiment: Option<SentimentReading>,
    pub btc_monitor: BtcDropMonitor,
}

impl BotState {
    pub fn new(
        settings: TradingSettings,
        profiles: ProfilesConfig,
        mode: TradingMode,
        btc_window_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let balance = settings.initial_balance;
        Self {
            settings,
            profiles,
            mode,
            running: true,
            balance,
            positions: Vec::new(),
            history: Vec::new(),
            scanner: BTreeMap::new(),
            hotlist: BTreeSet::new(),
            pending: HashMap::new(),
            last_prices: HashMap::new(),
            breaker_status: CircuitBreakerStatus::None,
            day_start_balance: balance,
            daily_pnl: Decimal::ZERO,
            consecutive_wins: 0,
            consecutive_losses: 0,
            current_day: now.date_naive(),
            cooldowns: HashMap::new(),
            sentiment: None,
            btc_monitor: BtcDropMonitor::new(btc_window_minutes),
        }
    }

    pub fn open_symbols(&self) -> Vec<String> {
        self.positions.iter().map(|p| p.symbol.clone()).collect()
    }

    /// Free position slots under the global cap
    pub fn open_slots(&self) -> usize {
        self.settings
            .max_open_positions
            .saturating_sub(self.positions.len())
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }

    pub fn position_index(&self, id: uuid::Uuid) -> Option<usize> {
        self.positions.iter().position(|p| p.id == id)
    }

    pub fn btc_warning(&self) -> bool {
        self.breaker_status == CircuitBreakerStatus::WarningBtcDrop
    }

    /// Active cooldown expiry for a symbol
    pub fn cooldown_until(&self, symbol: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cooldowns.get(symbol).copied().filter(|until| *until > now)
    }

    /// Extend a cooldown; the later expiry wins
    pub fn extend_cooldown(&mut self, symbol: &str, until: DateTime<Utc>) {
        let entry = self.cooldowns.entry(symbol.to_string()).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }

    /// Settings frozen into a new position, with the regime profile applied
    pub fn entry_settings(
        &self,
        regime: Option<MarketRegime>,
    ) -> (TradingSettings, Option<ProfileName>) {
        match self.profiles.effective_settings(&self.settings, regime) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, "Profile merge failed, using base settings");
                (self.settings.clone(), None)
            }
        }
    }

    /// Reset daily counters when the UTC day changes. A drawdown halt is
    /// lifted; a BTC-drop halt stays until reset by the operator.
    pub fn roll_day(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today == self.current_day {
            return false;
        }
        tracing::info!(
            from = %self.current_day,
            to = %today,
            daily_pnl = %self.daily_pnl,
            "Day rollover"
        );
        self.current_day = today;
        self.day_start_balance = self.balance;
        self.daily_pnl = Decimal::ZERO;
        self.consecutive_wins = 0;
        self.consecutive_losses = 0;
        if self.breaker_status == CircuitBreakerStatus::HaltedDrawdown {
            self.breaker_status = CircuitBreakerStatus::None;
        }
        true
    }

    /// Move a persisted closed position out of the active set and settle it
    pub fn record_close(&mut self, closed: Position, now: DateTime<Utc>) {
        self.roll_day(now);

        if let Some(exit) = closed.exit_price {
            self.balance += exit * closed.quantity;
        }
        let pnl = closed.realized_pnl;
        self.daily_pnl += pnl;

        if pnl > Decimal::ZERO {
            self.consecutive_wins += 1;
            self.consecutive_losses = 0;
        } else if pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
            self.consecutive_wins = 0;
            let pnl_pct = closed
                .pnl_pct
                .and_then(|p| p.abs().to_f64())
                .unwrap_or_default();
            let hours = closed.settings.cooldown_hours * (1.0 + pnl_pct / 2.0);
            self.extend_cooldown(&closed.symbol, now + hours_duration(hours));
        }
        self.extend_cooldown(
            &closed.symbol,
            now + hours_duration(closed.settings.cooldown_hours),
        );

        self.positions.retain(|p| p.id != closed.id);
        self.history.push(closed);
    }

    /// Positions still open under a BTC-drop halt
    pub fn awaiting_liquidation(&self) -> bool {
        self.breaker_status == CircuitBreakerStatus::HaltedBtcDrop && !self.positions.is_empty()
    }

    pub fn breaker_inputs(&self) -> BreakerInputs {
        BreakerInputs {
            daily_pnl: self.daily_pnl,
            day_start_balance: self.day_start_balance,
            consecutive_losses: self.consecutive_losses,
            sentiment: self.sentiment.as_ref().map(|s| s.value),
            btc_drop_pct: self.btc_monitor.drop_pct(),
        }
    }

    /// Operator reset of any breaker state. Returns the previous status.
    pub fn reset_circuit_breaker(&mut self) -> CircuitBreakerStatus {
        let previous = self.breaker_status;
        self.breaker_status = CircuitBreakerStatus::None;
        tracing::warn!(%previous, "Circuit breaker reset by operator");
        previous
    }

    /// Load trades, scalars and last prices from the store
    pub async fn restore(&mut self, store: &dyn StateStore) -> Result<(), StoreError> {
        for trade in store.load_trades().await? {
            match trade.status {
                PositionStatus::Filled => self.positions.push(trade),
                PositionStatus::Closed => self.history.push(trade),
            }
        }

        if let Some(v) = scalar::<Decimal>(store, keys::BALANCE).await? {
            self.balance = v;
        }
        if let Some(v) = scalar::<CircuitBreakerStatus>(store, keys::BREAKER_STATUS).await? {
            self.breaker_status = v;
        }
        if let Some(v) = scalar::<Decimal>(store, keys::DAY_START_BALANCE).await? {
            self.day_start_balance = v;
        }
        if let Some(v) = scalar::<Decimal>(store, keys::DAILY_PNL).await? {
            self.daily_pnl = v;
        }
        if let Some(v) = scalar::<u32>(store, keys::CONSECUTIVE_WINS).await? {
            self.consecutive_wins = v;
        }
        if let Some(v) = scalar::<u32>(store, keys::CONSECUTIVE_LOSSES).await? {
            self.consecutive_losses = v;
        }
        if let Some(v) = scalar::<NaiveDate>(store, keys::CURRENT_DAY).await? {
            self.current_day = v;
        }
        if let Some(v) = scalar::<HashMap<String, DateTime<Utc>>>(store, keys::COOLDOWNS).await? {
            self.cooldowns = v;
        }
        self.last_prices.extend(store.load_last_prices().await?);

        tracing::info!(
            balance = %self.balance,
            open = self.positions.len(),
            closed = self.history.len(),
            breaker = %self.breaker_status,
            "Restored state"
        );
        Ok(())
    }

    /// Write all scalar fields
    pub async fn persist_scalars(&self, store: &dyn StateStore) -> Result<(), StoreError> {
        store
            .set_scalar(keys::BALANCE, serde_json::to_value(self.balance)?)
            .await?;
        store
            .set_scalar(keys::BREAKER_STATUS, serde_json::to_value(self.breaker_status)?)
            .await?;
        store
            .set_scalar(
                keys::DAY_START_BALANCE,
                serde_json::to_value(self.day_start_balance)?,
            )
            .await?;
        store
            .set_scalar(keys::DAILY_PNL, serde_json::to_value(self.daily_pnl)?)
            .await?;
        store
            .set_scalar(
                keys::CONSECUTIVE_WINS,
                serde_json::to_value(self.consecutive_wins)?,
            )
            .await?;
        store
            .set_scalar(
                keys::CONSECUTIVE_LOSSES,
                serde_json::to_value(self.consecutive_losses)?,
            )
            .await?;
        store
            .set_scalar(keys::CURRENT_DAY, serde_json::to_value(self.current_day)?)
            .await?;
        store
            .set_scalar(keys::COOLDOWNS, serde_json::to_value(&self.cooldowns)?)
            .await?;
        Ok(())
    }
}

fn hours_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours.max(0.0) * 3_600_000.0) as i64)
}

async fn scalar<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get_scalar(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StrategyType;
    use crate::persistence::MemoryStore;
    use crate::trading::{CloseReason, NewPosition};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn state() -> BotState {
        BotState::new(
            TradingSettings::default(),
            ProfilesConfig::default(),
            TradingMode::Virtual,
            5,
            now(),
        )
    }

    fn position(symbol: &str) -> Position {
        Position::open(NewPosition {
            mode: TradingMode::Virtual,
            symbol: symbol.to_string(),
            strategy: StrategyType::Precision,
            fill_price: dec!(100),
            fill_quantity: dec!(2),
            target_quantity: dec!(2),
            stop_loss: dec!(98),
            take_profit: dec!(104),
            scale_in: None,
            hotlist_score: 6.0,
            settings: TradingSettings::default(),
            opened_at: now(),
        })
    }

    #[test]
    fn test_record_losing_close() {
        let mut s = state();
        s.balance = dec!(9800);
        let pos = position("SOLUSDT");
        s.positions.push(pos.clone());

        let closed = pos.to_closed(dec!(98), CloseReason::StopLoss, now());
        s.record_close(closed, now());

        assert!(s.positions.is_empty());
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.balance, dec!(9996));
        assert_eq!(s.daily_pnl, dec!(-4));
        assert_eq!(s.consecutive_losses, 1);

        // -2% -> 4h * (1 + 1) = 8h beats the flat 4h
        let until = s.cooldown_until("SOLUSDT", now()).unwrap();
        let base = s.settings.cooldown_hours;
        assert_eq!(until, now() + hours_duration(base * 2.0));
    }

    #[test]
    fn test_win_resets_loss_streak() {
        let mut s = state();
        s.consecutive_losses = 2;
        let pos = position("SOLUSDT");
        s.positions.push(pos.clone());
        s.record_close(pos.to_closed(dec!(103), CloseReason::TakeProfit, now()), now());
        assert_eq!(s.consecutive_losses, 0);
        assert_eq!(s.consecutive_wins, 1);
        // flat cooldown still applies
        assert!(s.cooldown_until("SOLUSDT", now()).is_some());
    }

    #[test]
    fn test_cooldown_keeps_later_expiry() {
        let mut s = state();
        s.extend_cooldown("SOLUSDT", now() + Duration::hours(8));
        s.extend_cooldown("SOLUSDT", now() + Duration::hours(4));
        assert_eq!(
            s.cooldown_until("SOLUSDT", now()),
            Some(now() + Duration::hours(8))
        );
        assert!(s.cooldown_until("SOLUSDT", now() + Duration::hours(9)).is_none());
    }

    #[test]
    fn test_roll_day_clears_drawdown_only() {
        let mut s = state();
        s.daily_pnl = dec!(-310);
        s.consecutive_losses = 2;
        s.breaker_status = CircuitBreakerStatus::HaltedDrawdown;
        assert!(!s.roll_day(now() + Duration::hours(1)));
        assert!(s.roll_day(now() + Duration::days(1)));
        assert_eq!(s.breaker_status, CircuitBreakerStatus::None);
        assert_eq!(s.daily_pnl, Decimal::ZERO);
        assert_eq!(s.consecutive_losses, 0);

        s.breaker_status = CircuitBreakerStatus::HaltedBtcDrop;
        assert!(s.roll_day(now() + Duration::days(2)));
        assert_eq!(s.breaker_status, CircuitBreakerStatus::HaltedBtcDrop);
        assert_eq!(s.reset_circuit_breaker(), CircuitBreakerStatus::HaltedBtcDrop);
        assert_eq!(s.breaker_status, CircuitBreakerStatus::None);
    }

    #[test]
    fn test_awaiting_liquidation_needs_btc_halt_and_positions() {
        let mut s = state();
        s.breaker_status = CircuitBreakerStatus::HaltedBtcDrop;
        assert!(!s.awaiting_liquidation());
        s.positions.push(position("SOLUSDT"));
        assert!(s.awaiting_liquidation());
        s.breaker_status = CircuitBreakerStatus::HaltedDrawdown;
        assert!(!s.awaiting_liquidation());
    }

    #[test]
    fn test_open_slots() {
        let mut s = state();
        assert_eq!(s.open_slots(), 3);
        s.positions.push(position("A"));
        s.positions.push(position("B"));
        s.positions.push(position("C"));
        s.positions.push(position("D"));
        assert_eq!(s.open_slots(), 0);
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let store = MemoryStore::new();
        let mut s = state();
        s.balance = dec!(9500.25);
        s.breaker_status = CircuitBreakerStatus::PausedLossStreak;
        s.consecutive_losses = 3;
        s.extend_cooldown("SOLUSDT", now() + Duration::hours(4));
        s.persist_scalars(&store).await.unwrap();

        let open = position("SOLUSDT");
        store.insert_trade(&open).await.unwrap();
        let closed = position("AVAXUSDT").to_closed(dec!(101), CloseReason::Manual, now());
        store.insert_trade(&closed).await.unwrap();
        store.set_last_price("SOLUSDT", dec!(101.5)).await.unwrap();

        let mut restored = state();
        restored.restore(&store).await.unwrap();
        assert_eq!(restored.balance, dec!(9500.25));
        assert_eq!(restored.breaker_status, CircuitBreakerStatus::PausedLossStreak);
        assert_eq!(restored.consecutive_losses, 3);
        assert_eq!(restored.positions.len(), 1);
        assert_eq!(restored.history.len(), 1);
        assert_eq!(restored.last_prices.get("SOLUSDT"), Some(&dec!(101.5)));
        assert!(restored.cooldown_until("SOLUSDT", now()).is_some());
    }
}
