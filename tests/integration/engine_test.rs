//! Integration tests for the trading engine against mocked venues

mod common;

use chrono::Duration;
use common::{now, rising, state, FlakyStore, MockExecution, MockMarket};
use hotlist_trader::breaker::CircuitBreakerStatus;
use hotlist_trader::config::{BreakerConfig, TradingMode};
use hotlist_trader::discovery::StrategyType;
use hotlist_trader::events::{BotEvent, EventBus, LogLevel};
use hotlist_trader::exchange::{ExecutionApi, OrderSide};
use hotlist_trader::market::{Candle, Interval, KlineStore, KlineWindow};
use hotlist_trader::persistence::{MemoryStore, StateStore};
use hotlist_trader::state::BotState;
use hotlist_trader::trading::{
    CloseReason, EngineDeps, NewPosition, OpenOutcome, Position, RejectReason, TradeCandidate,
    TradingEngine, TradingError, TradingSettings,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Harness {
    engine: TradingEngine,
    market: Arc<MockMarket>,
    store: Arc<dyn StateStore>,
    events: EventBus,
}

fn harness(mode: TradingMode, execution: Option<Arc<MockExecution>>, store: Arc<dyn StateStore>) -> Harness {
    let market = Arc::new(MockMarket::new());
    let events = EventBus::default();
    let engine = TradingEngine::new(
        mode,
        EngineDeps {
            market: market.clone(),
            execution: execution.map(|e| e as Arc<dyn ExecutionApi>),
            store: store.clone(),
            events: events.clone(),
        },
        BreakerConfig::default(),
        "BTCUSDT",
    );
    Harness {
        engine,
        market,
        store,
        events,
    }
}

fn virtual_harness() -> Harness {
    harness(TradingMode::Virtual, None, Arc::new(MemoryStore::new()))
}

fn candidate(symbol: &str, settings: TradingSettings) -> TradeCandidate {
    TradeCandidate {
        symbol: symbol.to_string(),
        strategy: StrategyType::Momentum,
        trigger_price: 100.0,
        reference_low: 99.5,
        is_ignition: false,
        is_super_bull: false,
        hotlist_score: 6.0,
        micro_score: 4,
        final_score: None,
        settings,
        profile: None,
        created_at: now(),
    }
}

/// Calm 1m history so the parabolic check has data
fn klines_for(symbol: &str) -> KlineStore {
    let mut store = KlineStore::new();
    let mut window = KlineWindow::for_interval(Interval::M1);
    window.seed(rising(Interval::M1, 60, 99.0, 0.01, now().timestamp_millis()));
    store.insert(symbol, Interval::M1, window);
    store
}

/// Put an already-filled position on the books, paid for from the balance
async fn seed_position(
    state: &mut BotState,
    store: &dyn StateStore,
    symbol: &str,
    entry: Decimal,
    quantity: Decimal,
) -> uuid::Uuid {
    let position = Position::open(NewPosition {
        mode: TradingMode::Virtual,
        symbol: symbol.to_string(),
        strategy: StrategyType::Precision,
        fill_price: entry,
        fill_quantity: quantity,
        target_quantity: quantity,
        stop_loss: entry * dec!(0.98),
        take_profit: entry * dec!(1.04),
        scale_in: None,
        hotlist_score: 6.0,
        settings: TradingSettings::default(),
        opened_at: now(),
    });
    store.insert_trade(&position).await.unwrap();
    let id = position.id;
    state.balance -= entry * quantity;
    state.positions.push(position);
    state.last_prices.insert(symbol.to_string(), entry);
    id
}

fn bullish_5m(close: f64) -> Candle {
    let open_time = now().timestamp_millis();
    Candle {
        open_time,
        close_time: open_time + Interval::M5.duration_ms() - 1,
        open: close - 1.0,
        high: close + 0.1,
        low: close - 1.1,
        close,
        volume: 20.0,
    }
}

#[tokio::test]
async fn test_scenario_e_partial_take_profit_then_close() {
    let mut h = virtual_harness();
    let mut state = state();
    let id = seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(2)).await;

    state.last_prices.insert("SOLUSDT".to_string(), dec!(101.6));
    h.engine.tick(&mut state, &KlineStore::new(), now()).await;

    let position = &state.positions[0];
    assert!(position.partial_tp_hit);
    assert!(!position.second_partial_done);
    assert_eq!(position.quantity, dec!(1));
    assert_eq!(position.realized_pnl, dec!(1.6));
    assert_eq!(state.balance, dec!(9800) + dec!(101.6));

    let closed = h
        .engine
        .close_position(&mut state, id, Some(dec!(99)), CloseReason::Manual, now())
        .await
        .unwrap();
    assert_eq!(closed.realized_pnl, dec!(0.6));
    assert_eq!(closed.close_reason, Some(CloseReason::Manual));
    assert_eq!(state.balance, dec!(10000.6));
    assert!(state.positions.is_empty());
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.consecutive_wins, 1);

    let stored = h.store.load_trades().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].exit_price, Some(dec!(99)));
}

#[tokio::test]
async fn test_scenario_c_drawdown_halt_until_next_day() {
    let mut h = virtual_harness();
    let mut state = state();

    let loser = seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(10)).await;
    h.engine
        .close_position(&mut state, loser, Some(dec!(69)), CloseReason::StopLoss, now())
        .await
        .unwrap();
    assert_eq!(state.daily_pnl, dec!(-310));
    assert_eq!(state.breaker_status, CircuitBreakerStatus::HaltedDrawdown);

    // A later win does not lift the halt
    let winner = seed_position(&mut state, h.store.as_ref(), "AVAXUSDT", dec!(100), dec!(1)).await;
    h.engine
        .close_position(&mut state, winner, Some(dec!(110)), CloseReason::TakeProfit, now())
        .await
        .unwrap();
    assert_eq!(state.breaker_status, CircuitBreakerStatus::HaltedDrawdown);

    let outcome = h
        .engine
        .try_open(&mut state, &klines_for("NEARUSDT"), &candidate("NEARUSDT", TradingSettings::default()), now())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        OpenOutcome::Rejected(RejectReason::BreakerActive(CircuitBreakerStatus::HaltedDrawdown))
    );

    h.engine
        .tick(&mut state, &KlineStore::new(), now() + Duration::days(1))
        .await;
    assert_eq!(state.breaker_status, CircuitBreakerStatus::None);
    assert_eq!(state.daily_pnl, Decimal::ZERO);
    assert_eq!(state.day_start_balance, state.balance);
}

#[tokio::test]
async fn test_scenario_d_loss_streak_pause_and_recovery() {
    let mut h = virtual_harness();
    let mut state = state();

    for symbol in ["SOLUSDT", "AVAXUSDT", "NEARUSDT"] {
        let id = seed_position(&mut state, h.store.as_ref(), symbol, dec!(100), dec!(1)).await;
        h.engine
            .close_position(&mut state, id, Some(dec!(99)), CloseReason::StopLoss, now())
            .await
            .unwrap();
    }
    assert_eq!(state.consecutive_losses, 3);
    assert_eq!(state.breaker_status, CircuitBreakerStatus::PausedLossStreak);
    assert!(state.cooldown_until("SOLUSDT", now()).is_some());

    let id = seed_position(&mut state, h.store.as_ref(), "ARBUSDT", dec!(100), dec!(1)).await;
    h.engine
        .close_position(&mut state, id, Some(dec!(101)), CloseReason::TakeProfit, now())
        .await
        .unwrap();
    assert_eq!(state.consecutive_losses, 0);
    assert_eq!(state.breaker_status, CircuitBreakerStatus::None);
}

#[tokio::test]
async fn test_wide_spread_rejects_without_side_effects() {
    let mut h = virtual_harness();
    let mut state = state();
    h.market.set_spread_pct("SOLUSDT", dec!(0.5));

    let outcome = h
        .engine
        .try_open(&mut state, &klines_for("SOLUSDT"), &candidate("SOLUSDT", TradingSettings::default()), now())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        OpenOutcome::Rejected(RejectReason::SpreadTooWide { .. })
    ));
    assert!(state.positions.is_empty());
    assert_eq!(state.balance, dec!(10000));
    assert!(h.store.load_trades().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_close_write_keeps_position() {
    let store = Arc::new(FlakyStore::new());
    let mut h = harness(TradingMode::Virtual, None, store.clone());
    let mut events = h.events.subscribe();
    let mut state = state();
    let id = seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(2)).await;
    let balance = state.balance;

    store.fail_updates.store(true, Ordering::SeqCst);
    let result = h
        .engine
        .close_position(&mut state, id, Some(dec!(95)), CloseReason::Manual, now())
        .await;

    assert!(matches!(result, Err(TradingError::Persistence(_))));
    assert_eq!(state.positions.len(), 1);
    assert_eq!(state.positions[0].id, id);
    assert_eq!(state.balance, balance);
    assert!(state.history.is_empty());

    let mut critical = false;
    while let Ok(event) = events.try_recv() {
        if let BotEvent::Log {
            level: LogLevel::Critical,
            ..
        } = event
        {
            critical = true;
        }
    }
    assert!(critical);
}

#[tokio::test]
async fn test_paper_entry_uses_fill_and_step_size() {
    let execution = Arc::new(MockExecution::new(dec!(100.5), dec!(0.01)));
    let mut h = harness(
        TradingMode::Paper,
        Some(execution.clone()),
        Arc::new(MemoryStore::new()),
    );
    let mut state = state();
    state.last_prices.insert("SOLUSDT".to_string(), dec!(100));

    let outcome = h
        .engine
        .try_open(&mut state, &klines_for("SOLUSDT"), &candidate("SOLUSDT", TradingSettings::default()), now())
        .await
        .unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));

    let orders = execution.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, dec!(2));

    let position = &state.positions[0];
    assert_eq!(position.entry_price, dec!(100.5));
    assert_eq!(position.quantity, dec!(2));
    assert_eq!(position.stop_loss, dec!(100.5) * dec!(0.98));
    assert_eq!(
        position.take_profit,
        position.entry_price + (position.entry_price - position.stop_loss) * dec!(2)
    );
    assert_eq!(state.balance, dec!(10000) - dec!(201));
}

#[tokio::test]
async fn test_order_failure_leaves_state_untouched() {
    let execution = Arc::new(MockExecution::new(dec!(100), dec!(0.01)));
    execution.fail.store(true, Ordering::SeqCst);
    let mut h = harness(
        TradingMode::Paper,
        Some(execution),
        Arc::new(MemoryStore::new()),
    );
    let mut state = state();
    state.last_prices.insert("SOLUSDT".to_string(), dec!(100));

    let result = h
        .engine
        .try_open(&mut state, &klines_for("SOLUSDT"), &candidate("SOLUSDT", TradingSettings::default()), now())
        .await;

    assert!(matches!(result, Err(TradingError::Order { .. })));
    assert!(state.positions.is_empty());
    assert_eq!(state.balance, dec!(10000));
    assert!(h.store.load_trades().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_btc_crash_liquidates_everything() {
    let mut h = virtual_harness();
    let mut state = state();
    seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(1)).await;
    seed_position(&mut state, h.store.as_ref(), "AVAXUSDT", dec!(50), dec!(2)).await;

    state.btc_monitor.record(now() - Duration::minutes(4), 100_000.0);
    state.btc_monitor.record(now(), 96_000.0);

    let transition = h.engine.evaluate_breaker(&mut state, now()).await.unwrap();
    assert_eq!(transition.to, CircuitBreakerStatus::HaltedBtcDrop);
    assert!(state.positions.is_empty());
    assert_eq!(state.history.len(), 2);
    assert!(state
        .history
        .iter()
        .all(|p| p.close_reason == Some(CloseReason::CircuitBreaker)));
    assert_eq!(state.balance, dec!(10000));

    // A hard halt survives a recovery in the inputs
    state.btc_monitor.record(now() + Duration::minutes(1), 101_000.0);
    assert!(h.engine.evaluate_breaker(&mut state, now()).await.is_none());
    assert_eq!(state.breaker_status, CircuitBreakerStatus::HaltedBtcDrop);
}

#[tokio::test]
async fn test_btc_halt_retries_failed_liquidation() {
    let execution = Arc::new(MockExecution::new(dec!(100), dec!(0.01)));
    execution.fail.store(true, Ordering::SeqCst);
    let mut h = harness(
        TradingMode::Paper,
        Some(execution.clone()),
        Arc::new(MemoryStore::new()),
    );
    let mut state = state();
    seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(1)).await;

    state.btc_monitor.record(now() - Duration::minutes(4), 100_000.0);
    state.btc_monitor.record(now(), 96_000.0);
    let transition = h.engine.evaluate_breaker(&mut state, now()).await.unwrap();
    assert_eq!(transition.to, CircuitBreakerStatus::HaltedBtcDrop);
    assert_eq!(state.positions.len(), 1);
    assert!(execution.orders().is_empty());

    // Venue comes back; the next tick finishes the flatten
    execution.fail.store(false, Ordering::SeqCst);
    h.engine
        .tick(&mut state, &klines_for("SOLUSDT"), now() + Duration::seconds(1))
        .await;

    assert!(state.positions.is_empty());
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].close_reason, Some(CloseReason::CircuitBreaker));
    let orders = execution.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].quantity, dec!(1));
    assert_eq!(state.breaker_status, CircuitBreakerStatus::HaltedBtcDrop);
}

#[tokio::test]
async fn test_close_on_new_day_announces_drawdown_lift() {
    let mut h = virtual_harness();
    let mut events = h.events.subscribe();
    let mut state = state();
    let id = seed_position(&mut state, h.store.as_ref(), "SOLUSDT", dec!(100), dec!(1)).await;
    state.breaker_status = CircuitBreakerStatus::HaltedDrawdown;

    h.engine
        .close_position(&mut state, id, Some(dec!(100)), CloseReason::Manual, now() + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(state.breaker_status, CircuitBreakerStatus::None);
    let mut lifted = false;
    while let Ok(event) = events.try_recv() {
        if let BotEvent::CircuitBreakerUpdate {
            status: CircuitBreakerStatus::None,
        } = event
        {
            lifted = true;
        }
    }
    assert!(lifted);
}

#[tokio::test]
async fn test_scale_in_completes_position() {
    let mut h = virtual_harness();
    let mut state = state();
    state.last_prices.insert("SOLUSDT".to_string(), dec!(100));
    let settings = TradingSettings {
        scaling_in_enabled: true,
        scaling_in_percents: "50,50".to_string(),
        ..TradingSettings::default()
    };

    let outcome = h
        .engine
        .try_open(&mut state, &klines_for("SOLUSDT"), &candidate("SOLUSDT", settings), now())
        .await
        .unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));
    assert_eq!(state.positions[0].quantity, dec!(1));
    assert_eq!(state.positions[0].target_quantity, dec!(2));
    assert!(state.positions[0].wants_scale_in());

    // Bearish candles never add
    let mut bearish = bullish_5m(100.0);
    std::mem::swap(&mut bearish.open, &mut bearish.close);
    assert!(!h
        .engine
        .try_scale_in(&mut state, "SOLUSDT", &bearish, now())
        .await
        .unwrap());

    let added = h
        .engine
        .try_scale_in(&mut state, "SOLUSDT", &bullish_5m(100.0), now())
        .await
        .unwrap();
    assert!(added);

    let position = &state.positions[0];
    assert_eq!(position.quantity, dec!(2));
    assert_eq!(position.avg_entry_price, dec!(100));
    assert!(!position.wants_scale_in());
    assert_eq!(state.balance, dec!(9800));
}
