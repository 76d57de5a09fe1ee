//! Integration tests for the realtime analyzer pipeline

mod common;

use chrono::Duration;
use common::{breakout_1m, now, pair, rising, series, state, MockMarket};
use hotlist_trader::analyzer::{confirm_score, HotlistChange, PendingConfirmation, RealtimeAnalyzer};
use hotlist_trader::config::{AnalyzerConfig, TradingMode};
use hotlist_trader::discovery::{SignalState, StrategyType};
use hotlist_trader::events::EventBus;
use hotlist_trader::market::{Candle, Interval};
use hotlist_trader::persistence::MemoryStore;
use hotlist_trader::state::BotState;
use hotlist_trader::trading::{EngineDeps, OpenOutcome, TradingEngine, TradingSettings};
use hotlist_trader::config::BreakerConfig;
use std::sync::Arc;
use tokio::time::Instant;

fn immediate_config() -> AnalyzerConfig {
    AnalyzerConfig {
        mtf_enabled: false,
        ignition_enabled: false,
        ..AnalyzerConfig::default()
    }
}

/// Scanner entry on the hotlist with a hydrated 1m window; returns the
/// breakout candle still to be delivered
fn hotlisted_with_breakout(analyzer: &mut RealtimeAnalyzer, state: &mut BotState, symbol: &str) -> Candle {
    analyzer.on_scan(state, vec![pair(symbol, 2.0)]);
    state.hotlist.insert(symbol.to_string());
    let (history, trigger) = breakout_1m(now().timestamp_millis());
    analyzer.apply_hydration(state, symbol, Interval::M1, history, now());
    trigger
}

fn pending(symbol: &str, micro_score: u8, is_ignition: bool) -> PendingConfirmation {
    PendingConfirmation {
        symbol: symbol.to_string(),
        trigger_price: 100.0,
        triggered_at: now(),
        reference_low: 99.5,
        settings: TradingSettings::default(),
        profile: None,
        is_ignition,
        is_super_bull: false,
        micro_score,
        hotlist_score: 6.0,
    }
}

/// Flat 5m history whose ATR is small against a 2-point body
fn flat_5m() -> Vec<Candle> {
    series(Interval::M5, &[100.0; 30], &[10.0; 30], now().timestamp_millis())
}

fn five_minute(open: f64, close: f64) -> Candle {
    let open_time = now().timestamp_millis();
    Candle {
        open_time,
        close_time: open_time + Interval::M5.duration_ms() - 1,
        open,
        high: open.max(close) + 0.1,
        low: open.min(close) - 0.1,
        close,
        volume: 12.0,
    }
}

#[tokio::test]
async fn test_scenario_a_immediate_trade_attempt() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(immediate_config(), EventBus::default());
    let mut state = state();
    let trigger = hotlisted_with_breakout(&mut analyzer, &mut state, "SOLUSDT");

    analyzer.on_kline(&mut state, "SOLUSDT", Interval::M1, trigger, true, now(), Instant::now());
    assert_eq!(analyzer.flush(&mut state, now()), 1);

    let candidate = out.candidates.try_recv().unwrap();
    assert_eq!(candidate.symbol, "SOLUSDT");
    assert_eq!(candidate.micro_score, 4);
    assert_eq!(candidate.strategy, StrategyType::Momentum);
    assert_eq!(candidate.final_score, None);
    assert_eq!(state.scanner["SOLUSDT"].signal_state, SignalState::Triggered);

    // The engine takes the candidate through the gate and opens it
    let mut engine = TradingEngine::new(
        TradingMode::Virtual,
        EngineDeps {
            market: Arc::new(MockMarket::new()),
            execution: None,
            store: Arc::new(MemoryStore::new()),
            events: EventBus::default(),
        },
        BreakerConfig::default(),
        "BTCUSDT",
    );
    let outcome = engine
        .try_open(&mut state, analyzer.klines(), &candidate, now())
        .await
        .unwrap();
    assert!(matches!(outcome, OpenOutcome::Opened(_)));
    assert_eq!(state.positions.len(), 1);
    assert_eq!(state.scanner["SOLUSDT"].strategy_type, Some(StrategyType::Momentum));
}

#[test]
fn test_scenario_b_fake_breakout() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(AnalyzerConfig::default(), EventBus::default());
    let mut state = state();
    analyzer.on_scan(&mut state, vec![pair("SOLUSDT", 2.0)]);
    state.hotlist.insert("SOLUSDT".to_string());
    analyzer.apply_hydration(&mut state, "SOLUSDT", Interval::M5, flat_5m(), now());
    state.pending.insert("SOLUSDT".to_string(), pending("SOLUSDT", 3, false));

    let bearish = five_minute(101.0, 99.0);
    assert_eq!(confirm_score(&bearish, 100.0, Some(0.5)), -1);

    analyzer.on_kline(
        &mut state,
        "SOLUSDT",
        Interval::M5,
        bearish,
        true,
        now() + Duration::minutes(5),
        Instant::now(),
    );

    assert!(state.pending.is_empty());
    assert_eq!(state.scanner["SOLUSDT"].signal_state, SignalState::FakeBreakout);
    assert!(out.candidates.try_recv().is_err());
}

#[test]
fn test_ignition_confirmation_emits_candidate() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(AnalyzerConfig::default(), EventBus::default());
    let mut state = state();
    analyzer.on_scan(&mut state, vec![pair("SOLUSDT", 2.0)]);
    state.hotlist.insert("SOLUSDT".to_string());
    analyzer.apply_hydration(&mut state, "SOLUSDT", Interval::M5, flat_5m(), now());
    state.pending.insert("SOLUSDT".to_string(), pending("SOLUSDT", 4, true));

    analyzer.on_kline(
        &mut state,
        "SOLUSDT",
        Interval::M5,
        five_minute(100.0, 100.8),
        true,
        now() + Duration::minutes(5),
        Instant::now(),
    );

    let candidate = out.candidates.try_recv().unwrap();
    assert_eq!(candidate.strategy, StrategyType::Ignition);
    assert_eq!(candidate.final_score, Some(6));
    assert!(state.pending.is_empty());
    assert_eq!(state.scanner["SOLUSDT"].signal_state, SignalState::Triggered);
}

#[test]
fn test_pending_ignores_candle_closing_before_trigger() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(AnalyzerConfig::default(), EventBus::default());
    let mut state = state();
    analyzer.on_scan(&mut state, vec![pair("SOLUSDT", 2.0)]);
    state.hotlist.insert("SOLUSDT".to_string());
    let mut history = flat_5m();
    let last = history.pop().unwrap();
    analyzer.apply_hydration(&mut state, "SOLUSDT", Interval::M5, history, now());

    let mut p = pending("SOLUSDT", 4, true);
    p.triggered_at = now() + Duration::minutes(1);
    state.pending.insert("SOLUSDT".to_string(), p);

    // Closes before the trigger timestamp
    analyzer.on_kline(&mut state, "SOLUSDT", Interval::M5, last, true, now(), Instant::now());
    assert_eq!(state.pending.len(), 1);
    assert!(out.candidates.try_recv().is_err());
}

#[test]
fn test_admission_and_removal_follow_threshold() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(AnalyzerConfig::default(), EventBus::default());
    let mut state = state();
    analyzer.on_scan(&mut state, vec![pair("SOLUSDT", 2.0)]);

    let end = now().timestamp_millis();
    let mut history = rising(Interval::M15, 300, 100.0, 0.2, end);
    if let Some(last) = history.last_mut() {
        last.volume = 30.0;
    }
    analyzer.apply_hydration(&mut state, "SOLUSDT", Interval::M15, history, now());

    assert!(state.hotlist.contains("SOLUSDT"));
    let pair = &state.scanner["SOLUSDT"];
    assert!(pair.is_on_hotlist);
    assert!(pair.hotlist_score.unwrap() >= 5.0);
    assert_eq!(pair.intraday.unwrap().volume_score, 3);
    assert_eq!(
        out.hotlist.try_recv().unwrap(),
        HotlistChange {
            symbol: "SOLUSDT".to_string(),
            admitted: true
        }
    );

    let mut requested = Vec::new();
    while let Ok(req) = out.hydration.try_recv() {
        requested.push(req.interval);
    }
    assert!(requested.contains(&Interval::M1));
    assert!(requested.contains(&Interval::M5));

    // A bearish 4h snapshot pushes the score under the threshold
    if let Some(pair) = state.scanner.get_mut("SOLUSDT") {
        pair.macro_analysis.trend_score = -2.0;
    }
    let next = rising(Interval::M15, 1, 160.0, 0.0, end + Interval::M15.duration_ms());
    analyzer.on_kline(&mut state, "SOLUSDT", Interval::M15, next[0], true, now(), Instant::now());

    assert!(state.hotlist.is_empty());
    assert!(!state.scanner["SOLUSDT"].is_on_hotlist);
    assert!(state.scanner["SOLUSDT"].hotlist_score.unwrap() < 5.0);
    assert_eq!(
        out.hotlist.try_recv().unwrap(),
        HotlistChange {
            symbol: "SOLUSDT".to_string(),
            admitted: false
        }
    );
}

#[test]
fn test_debounced_batch_creates_pending_confirmation() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(AnalyzerConfig::default(), EventBus::default());
    let mut state = state();
    let trigger = hotlisted_with_breakout(&mut analyzer, &mut state, "SOLUSDT");

    let t0 = Instant::now();
    analyzer.on_kline(&mut state, "SOLUSDT", Interval::M1, trigger, true, now(), t0);
    assert!(analyzer.batch_deadline().is_some());

    assert_eq!(
        analyzer.flush_due(&mut state, t0 + std::time::Duration::from_millis(100), now()),
        0
    );
    assert!(state.pending.is_empty());

    assert_eq!(
        analyzer.flush_due(&mut state, t0 + std::time::Duration::from_millis(500), now()),
        1
    );
    let p = &state.pending["SOLUSDT"];
    assert_eq!(p.micro_score, 4);
    assert_eq!(p.trigger_price, trigger.close);
    assert_eq!(state.scanner["SOLUSDT"].signal_state, SignalState::PendingConfirmation);
    assert!(out.candidates.try_recv().is_err());
    assert!(analyzer.batch_deadline().is_none());
}

#[test]
fn test_batch_stops_at_position_cap() {
    let (mut analyzer, mut out) = RealtimeAnalyzer::new(immediate_config(), EventBus::default());
    let mut state = state();
    state.settings.max_open_positions = 1;

    analyzer.on_scan(&mut state, vec![pair("AVAXUSDT", 2.0), pair("SOLUSDT", 2.0)]);
    for symbol in ["AVAXUSDT", "SOLUSDT"] {
        state.hotlist.insert(symbol.to_string());
        let (history, trigger) = breakout_1m(now().timestamp_millis());
        analyzer.apply_hydration(&mut state, symbol, Interval::M1, history, now());
        analyzer.on_kline(&mut state, symbol, Interval::M1, trigger, true, now(), Instant::now());
    }

    assert_eq!(analyzer.flush(&mut state, now()), 1);
    assert_eq!(out.candidates.try_recv().unwrap().symbol, "AVAXUSDT");
    assert!(out.candidates.try_recv().is_err());
    assert_eq!(state.scanner["SOLUSDT"].signal_state, SignalState::Neutral);
}
