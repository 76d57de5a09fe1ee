//! Realtime analyzer
//!
//! Owns the candle windows and turns closed candles into hotlist changes,
//! pending confirmations and trade candidates. Outputs go out on channels so
//! the coordinator decides what to do with them.

use super::batch::MicroBatch;
use super::pending::PendingConfirmation;
use super::scoring::{analyze_intraday, confirm_score, hotlist_score, micro_signal, MicroSignal};
use crate::config::AnalyzerConfig;
use crate::discovery::{ScannedPair, SignalState, StrategyType};
use crate::events::{BotEvent, EventBus};
use crate::indicators::atr;
use crate::market::{Candle, Interval, KlineStore, KlineWindow, PushOutcome, Ticker};
use crate::state::BotState;
use crate::telemetry::{set_gauge, GaugeMetric};
use crate::trading::{MarketRegime, TradeCandidate};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// 5m ATR period for the contradiction check
const CONFIRM_ATR_PERIOD: usize = 14;

/// A symbol entered or left the hotlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotlistChange {
    pub symbol: String,
    pub admitted: bool,
}

/// Historical candles needed for a window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HydrationRequest {
    pub symbol: String,
    pub interval: Interval,
}

/// Receiving ends of the analyzer outputs
#[derive(Debug)]
pub struct AnalyzerOutputs {
    pub hotlist: mpsc::UnboundedReceiver<HotlistChange>,
    pub candidates: mpsc::UnboundedReceiver<TradeCandidate>,
    pub hydration: mpsc::UnboundedReceiver<HydrationRequest>,
}

type WindowKey = (String, Interval);

pub struct RealtimeAnalyzer {
    config: AnalyzerConfig,
    klines: KlineStore,
    batch: MicroBatch,
    hydrated: HashSet<WindowKey>,
    in_flight: HashSet<WindowKey>,
    hotlist_tx: mpsc::UnboundedSender<HotlistChange>,
    candidate_tx: mpsc::UnboundedSender<TradeCandidate>,
    hydration_tx: mpsc::UnboundedSender<HydrationRequest>,
    events: EventBus,
}

impl RealtimeAnalyzer {
    pub fn new(config: AnalyzerConfig, events: EventBus) -> (Self, AnalyzerOutputs) {
        let (hotlist_tx, hotlist) = mpsc::unbounded_channel();
        let (candidate_tx, candidates) = mpsc::unbounded_channel();
        let (hydration_tx, hydration) = mpsc::unbounded_channel();
        let batch = MicroBatch::new(std::time::Duration::from_millis(config.debounce_ms));

        let analyzer = Self {
            config,
            klines: KlineStore::new(),
            batch,
            hydrated: HashSet::new(),
            in_flight: HashSet::new(),
            hotlist_tx,
            candidate_tx,
            hydration_tx,
            events,
        };
        let outputs = AnalyzerOutputs {
            hotlist,
            candidates,
            hydration,
        };
        (analyzer, outputs)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn klines(&self) -> &KlineStore {
        &self.klines
    }

    /// When the pending micro batch becomes due
    pub fn batch_deadline(&self) -> Option<Instant> {
        self.batch.deadline()
    }

    pub fn is_hydrated(&self, symbol: &str, interval: Interval) -> bool {
        self.hydrated.contains(&(symbol.to_string(), interval))
    }

    /// Ask for history once per window; `false` when already done or in flight
    pub fn request_hydration(&mut self, symbol: &str, interval: Interval) -> bool {
        let key = (symbol.to_string(), interval);
        if self.hydrated.contains(&key) || self.in_flight.contains(&key) {
            return false;
        }
        self.in_flight.insert(key);
        let _ = self.hydration_tx.send(HydrationRequest {
            symbol: symbol.to_string(),
            interval,
        });
        true
    }

    /// Seed a window from history, keeping live candles that arrived meanwhile
    pub fn apply_hydration(
        &mut self,
        state: &mut BotState,
        symbol: &str,
        interval: Interval,
        history: Vec<Candle>,
        now: DateTime<Utc>,
    ) {
        let key = (symbol.to_string(), interval);
        self.in_flight.remove(&key);
        if !Self::is_relevant(state, symbol, interval) {
            return;
        }

        let now_ms = now.timestamp_millis();
        let mut window = KlineWindow::for_interval(interval);
        window.seed(history.into_iter().filter(|c| c.close_time <= now_ms));
        if let Some(live) = self.klines.get(symbol, interval) {
            window.seed(live.to_vec());
        }
        tracing::debug!(symbol, %interval, candles = window.len(), "Hydrated window");
        self.klines.insert(symbol, interval, window);
        self.hydrated.insert(key);

        if interval == Interval::M15 {
            self.evaluate_admission(state, symbol);
        }
    }

    /// Allow a retry after a failed fetch
    pub fn hydration_failed(&mut self, symbol: &str, interval: Interval) {
        self.in_flight.remove(&(symbol.to_string(), interval));
    }

    fn is_relevant(state: &BotState, symbol: &str, interval: Interval) -> bool {
        match interval {
            Interval::M15 => state.scanner.contains_key(symbol),
            Interval::M1 | Interval::M5 => state.hotlist.contains(symbol),
            _ => false,
        }
    }

    /// Merge a discovery pass into the scanner
    pub fn on_scan(&mut self, state: &mut BotState, pairs: Vec<ScannedPair>) {
        let fresh: HashSet<&str> = pairs.iter().map(|p| p.symbol.as_str()).collect();
        let dropped: Vec<String> = state
            .scanner
            .keys()
            .filter(|s| !fresh.contains(s.as_str()))
            .cloned()
            .collect();
        for symbol in &dropped {
            self.drop_symbol(state, symbol);
        }

        let mut added = 0;
        for pair in pairs {
            let symbol = pair.symbol.clone();
            match state.scanner.get_mut(&symbol) {
                Some(existing) => existing.merge_rescan(pair),
                None => {
                    state.scanner.insert(symbol.clone(), pair);
                    self.request_hydration(&symbol, Interval::M15);
                    added += 1;
                }
            }
            if let Some(pair) = state.scanner.get(&symbol) {
                self.events.publish(BotEvent::ScannerUpdate {
                    pair: Box::new(pair.clone()),
                });
            }
        }

        tracing::info!(
            universe = state.scanner.len(),
            added,
            dropped = dropped.len(),
            "Scanner updated"
        );
    }

    fn drop_symbol(&mut self, state: &mut BotState, symbol: &str) {
        state.scanner.remove(symbol);
        state.pending.remove(symbol);
        self.batch.remove(symbol);
        if state.hotlist.remove(symbol) {
            let _ = self.hotlist_tx.send(HotlistChange {
                symbol: symbol.to_string(),
                admitted: false,
            });
            set_gauge(GaugeMetric::HotlistSize, state.hotlist.len() as f64);
        }
        if !state.has_position(symbol) {
            self.klines.remove_symbol(symbol);
            self.hydrated.retain(|(s, _)| s != symbol);
        }
    }

    /// Live ticker update
    pub fn on_ticker(&mut self, state: &mut BotState, ticker: &Ticker) {
        state
            .last_prices
            .insert(ticker.symbol.clone(), ticker.last_price);
        if let Some(pair) = state.scanner.get_mut(&ticker.symbol) {
            pair.apply_ticker(ticker);
        }
        self.events.publish(BotEvent::PriceUpdate {
            symbol: ticker.symbol.clone(),
            price: ticker.last_price,
        });
    }

    /// Candle update; only final candles are applied
    pub fn on_kline(
        &mut self,
        state: &mut BotState,
        symbol: &str,
        interval: Interval,
        candle: Candle,
        is_final: bool,
        now: DateTime<Utc>,
        instant: Instant,
    ) {
        if !is_final || !Self::is_relevant(state, symbol, interval) {
            return;
        }
        if !self.is_hydrated(symbol, interval) {
            self.request_hydration(symbol, interval);
        }
        if self.klines.push(symbol, interval, candle) == PushOutcome::Stale {
            return;
        }

        match interval {
            Interval::M15 => self.evaluate_admission(state, symbol),
            Interval::M1 => {
                if !state.pending.contains_key(symbol) {
                    self.batch.enqueue(symbol, instant);
                }
            }
            Interval::M5 => self.confirm(state, symbol, &candle, now),
            _ => {}
        }
    }

    /// Recompute the 15m snapshot and apply the admission threshold
    fn evaluate_admission(&mut self, state: &mut BotState, symbol: &str) {
        let Some(window) = self.klines.get(symbol, Interval::M15) else {
            return;
        };
        let Some(analysis) = analyze_intraday(&window.to_vec(), self.config.squeeze_threshold_pct)
        else {
            return;
        };
        let Some(pair) = state.scanner.get_mut(symbol) else {
            return;
        };

        let score = hotlist_score(pair.macro_analysis.trend_score, &analysis);
        pair.intraday = Some(analysis);
        pair.hotlist_score = Some(score);
        pair.conditions
            .insert("squeeze_15m".to_string(), analysis.is_squeeze);
        pair.conditions
            .insert("volume_spike_15m".to_string(), analysis.volume_score >= 2);
        pair.conditions
            .insert("trend_up_15m".to_string(), analysis.trend_score > 0.0);

        let admitted = score >= self.config.hotlist_threshold;
        let changed = admitted != pair.is_on_hotlist;
        pair.is_on_hotlist = admitted;
        if changed && !admitted {
            pair.signal_state = SignalState::Neutral;
        }
        self.events.publish(BotEvent::ScannerUpdate {
            pair: Box::new(pair.clone()),
        });

        if !changed {
            return;
        }
        if admitted {
            state.hotlist.insert(symbol.to_string());
            self.request_hydration(symbol, Interval::M1);
            self.request_hydration(symbol, Interval::M5);
            tracing::info!(symbol, score, "Admitted to hotlist");
        } else {
            state.hotlist.remove(symbol);
            state.pending.remove(symbol);
            self.batch.remove(symbol);
            for interval in [Interval::M1, Interval::M5] {
                self.klines.remove(symbol, interval);
                self.hydrated.remove(&(symbol.to_string(), interval));
            }
            tracing::info!(symbol, score, "Removed from hotlist");
        }
        let _ = self.hotlist_tx.send(HotlistChange {
            symbol: symbol.to_string(),
            admitted,
        });
        set_gauge(GaugeMetric::HotlistSize, state.hotlist.len() as f64);
    }

    /// Evaluate the batch if its debounce deadline passed
    pub fn flush_due(&mut self, state: &mut BotState, instant: Instant, now: DateTime<Utc>) -> usize {
        match self.batch.take_due(instant) {
            Some(symbols) => self.evaluate_batch(state, symbols, now),
            None => 0,
        }
    }

    /// Evaluate the batch immediately
    pub fn flush(&mut self, state: &mut BotState, now: DateTime<Utc>) -> usize {
        let symbols = self.batch.flush();
        self.evaluate_batch(state, symbols, now)
    }

    /// Score each symbol, best first. Returns candidates plus pending
    /// confirmations created.
    fn evaluate_batch(&mut self, state: &mut BotState, symbols: Vec<String>, now: DateTime<Utc>) -> usize {
        let mut scored: Vec<(String, MicroSignal)> = symbols
            .into_iter()
            .filter(|s| state.hotlist.contains(s) && !state.pending.contains_key(s))
            .filter_map(|s| {
                let candles = self.klines.get(&s, Interval::M1)?.to_vec();
                micro_signal(&candles).map(|signal| (s, signal))
            })
            .collect();
        scored.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));

        let mut slots = state.open_slots();
        let mut produced = 0;
        for (symbol, signal) in scored {
            let Some(pair) = state.scanner.get(&symbol) else {
                continue;
            };
            let hotlist_score = pair.hotlist_score.unwrap_or_default();
            let regime = pair.intraday.map(|a| MarketRegime {
                adx: a.adx,
                atr_pct: a.atr_pct,
            });
            let is_ignition = signal.is_ignition && self.config.ignition_enabled;
            let is_super_bull = hotlist_score >= self.config.super_bull_score;

            if self.config.mtf_enabled {
                if signal.score < self.config.mtf_trigger_threshold {
                    continue;
                }
                let (settings, profile) = state.entry_settings(regime);
                state.pending.insert(
                    symbol.clone(),
                    PendingConfirmation {
                        symbol: symbol.clone(),
                        trigger_price: signal.close,
                        triggered_at: now,
                        reference_low: signal.low,
                        settings,
                        profile,
                        is_ignition,
                        is_super_bull,
                        micro_score: signal.score,
                        hotlist_score,
                    },
                );
                self.set_signal_state(state, &symbol, SignalState::PendingConfirmation, None);
                tracing::info!(symbol, score = signal.score, is_ignition, "Awaiting 5m confirmation");
                produced += 1;
                continue;
            }

            let threshold = if is_ignition {
                self.config.immediate_ignition_threshold
            } else {
                self.config.immediate_threshold
            };
            if signal.score < threshold {
                continue;
            }
            if slots == 0 {
                tracing::debug!(symbol, "Position cap reached, dropping rest of batch");
                break;
            }
            slots -= 1;

            let (settings, profile) = state.entry_settings(regime);
            let strategy = if is_ignition {
                StrategyType::Ignition
            } else {
                StrategyType::Momentum
            };
            let _ = self.candidate_tx.send(TradeCandidate {
                symbol: symbol.clone(),
                strategy,
                trigger_price: signal.close,
                reference_low: signal.low,
                is_ignition,
                is_super_bull,
                hotlist_score,
                micro_score: signal.score,
                final_score: None,
                settings,
                profile,
                created_at: now,
            });
            self.set_signal_state(state, &symbol, SignalState::Triggered, Some(strategy));
            tracing::info!(symbol, score = signal.score, %strategy, "Immediate trigger");
            produced += 1;
        }

        set_gauge(GaugeMetric::PendingConfirmations, state.pending.len() as f64);
        produced
    }

    /// Score a pending trigger against a closed 5m candle
    fn confirm(&mut self, state: &mut BotState, symbol: &str, candle: &Candle, now: DateTime<Utc>) {
        match state.pending.get(symbol) {
            Some(pending) if pending.accepts(candle) => {}
            _ => return,
        }
        let Some(pending) = state.pending.remove(symbol) else {
            return;
        };

        let atr_5m = self
            .klines
            .get(symbol, Interval::M5)
            .and_then(|w| atr(&w.to_vec(), CONFIRM_ATR_PERIOD));
        let confirm = confirm_score(candle, pending.trigger_price, atr_5m);
        let final_score = pending.micro_score as i32 + confirm;
        let threshold = pending.threshold(
            self.config.confirm_threshold,
            self.config.confirm_ignition_threshold,
        );

        if final_score >= threshold {
            let candidate = pending.into_candidate(final_score, now);
            let strategy = candidate.strategy;
            tracing::info!(symbol, final_score, threshold, %strategy, "5m confirmation passed");
            let _ = self.candidate_tx.send(candidate);
            self.set_signal_state(state, symbol, SignalState::Triggered, Some(strategy));
        } else {
            tracing::info!(symbol, final_score, threshold, confirm, "Fake breakout");
            self.set_signal_state(state, symbol, SignalState::FakeBreakout, None);
        }
        set_gauge(GaugeMetric::PendingConfirmations, state.pending.len() as f64);
    }

    /// Drop pending confirmations past their lifetime
    pub fn expire_pending(&mut self, state: &mut BotState, now: DateTime<Utc>) -> usize {
        let timeout = Duration::seconds(self.config.pending_timeout_secs);
        let expired: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, p)| p.is_expired(now, timeout))
            .map(|(s, _)| s.clone())
            .collect();
        for symbol in &expired {
            state.pending.remove(symbol);
            self.set_signal_state(state, symbol, SignalState::Neutral, None);
            tracing::debug!(symbol = %symbol, "Pending confirmation expired");
        }
        if !expired.is_empty() {
            set_gauge(GaugeMetric::PendingConfirmations, state.pending.len() as f64);
        }
        expired.len()
    }

    fn set_signal_state(
        &self,
        state: &mut BotState,
        symbol: &str,
        signal_state: SignalState,
        strategy: Option<StrategyType>,
    ) {
        if let Some(pair) = state.scanner.get_mut(symbol) {
            pair.signal_state = signal_state;
            if strategy.is_some() {
                pair.strategy_type = strategy;
            }
            self.events.publish(BotEvent::ScannerUpdate {
                pair: Box::new(pair.clone()),
            });
        }
    }
}
