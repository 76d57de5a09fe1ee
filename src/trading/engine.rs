//! Trading engine
//!
//! Every state change is staged on a cloned position, persisted, and only
//! then committed to [`BotState`]. A failed order or write therefore leaves
//! the in-memory state untouched.

use super::gate::{self, GateContext};
use super::sizing::{position_notional, scale_in_fractions, stop_plan, SizingInputs};
use super::types::{CloseReason, OpenOutcome, PartialExit, TradeCandidate, TradingError};
use super::{NewPosition, Position, ScaleInPlan, TradingSettings};
use crate::breaker::{BreakerTransition, CircuitBreaker, CircuitBreakerStatus};
use crate::config::{BreakerConfig, TradingMode};
use crate::events::{BotEvent, EventBus, LogLevel};
use crate::exchange::{
    round_to_step, ExecutionApi, MarketDataApi, OrderRequest, OrderSide, SymbolFilters,
};
use crate::indicators::atr;
use crate::market::{Candle, Interval, KlineStore};
use crate::persistence::StateStore;
use crate::state::BotState;
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// ATR period on 15m candles for the initial stop
const STOP_ATR_PERIOD: usize = 7;
/// ATR period on 15m candles for the adaptive trail
const TRAIL_ATR_PERIOD: usize = 14;
/// Quantity precision when the venue step is unknown
const DEFAULT_QUANTITY_DP: u32 = 8;

/// Collaborators the engine talks to
#[derive(Clone)]
pub struct EngineDeps {
    pub market: Arc<dyn MarketDataApi>,
    /// Required for paper and live modes
    pub execution: Option<Arc<dyn ExecutionApi>>,
    pub store: Arc<dyn StateStore>,
    pub events: EventBus,
}

/// Opens, manages and closes positions on behalf of the coordinator
pub struct TradingEngine {
    mode: TradingMode,
    market: Arc<dyn MarketDataApi>,
    execution: Option<Arc<dyn ExecutionApi>>,
    store: Arc<dyn StateStore>,
    events: EventBus,
    breaker: CircuitBreaker,
    filters: HashMap<String, SymbolFilters>,
    btc_symbol: String,
}

impl TradingEngine {
    pub fn new(
        mode: TradingMode,
        deps: EngineDeps,
        breaker: BreakerConfig,
        btc_symbol: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            market: deps.market,
            execution: deps.execution,
            store: deps.store,
            events: deps.events,
            breaker: CircuitBreaker::new(breaker),
            filters: HashMap::new(),
            btc_symbol: btc_symbol.into(),
        }
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Fetch lot and notional filters for every symbol
    pub async fn load_filters(&mut self) -> anyhow::Result<usize> {
        let Some(execution) = &self.execution else {
            return Ok(0);
        };
        let filters = execution.exchange_info().await?;
        self.filters = filters;
        tracing::info!(symbols = self.filters.len(), "Loaded symbol filters");
        Ok(self.filters.len())
    }

    async fn filters_for(&mut self, symbol: &str, settings: &TradingSettings) -> SymbolFilters {
        if let Some(filters) = self.filters.get(symbol) {
            return filters.clone();
        }
        if self.mode.places_orders() {
            if let Some(execution) = &self.execution {
                match execution.exchange_info().await {
                    Ok(all) => {
                        self.filters = all;
                        if let Some(filters) = self.filters.get(symbol) {
                            return filters.clone();
                        }
                    }
                    Err(e) => tracing::warn!(symbol, error = %e, "Exchange info fetch failed"),
                }
            }
        }
        SymbolFilters {
            step_size: Decimal::ZERO,
            min_notional: settings.default_min_notional,
        }
    }

    fn round_quantity(quantity: Decimal, filters: &SymbolFilters) -> Decimal {
        if filters.step_size > Decimal::ZERO {
            round_to_step(quantity, filters.step_size)
        } else {
            quantity.round_dp_with_strategy(DEFAULT_QUANTITY_DP, RoundingStrategy::ToZero)
        }
    }

    /// Fill an order. Virtual mode fills at the reference price.
    async fn execute(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        reference_price: Decimal,
    ) -> Result<(Decimal, Decimal), TradingError> {
        if !self.mode.places_orders() {
            return Ok((reference_price, quantity));
        }
        let Some(execution) = &self.execution else {
            return Err(TradingError::Order {
                symbol: symbol.to_string(),
                reason: "no execution client configured".to_string(),
            });
        };

        let fill = execution
            .create_order(OrderRequest::market(symbol, side, quantity))
            .await
            .map_err(|e| TradingError::Order {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;

        if fill.executed_qty <= Decimal::ZERO {
            return Err(TradingError::Order {
                symbol: symbol.to_string(),
                reason: format!("order {} executed nothing", fill.order_id),
            });
        }
        let price = fill.average_price().unwrap_or(reference_price);
        tracing::debug!(
            symbol,
            side = side.as_str(),
            order_id = fill.order_id,
            %price,
            quantity = %fill.executed_qty,
            "Order filled"
        );
        Ok((price, fill.executed_qty))
    }

    /// Gate, size and open a position for a candidate
    pub async fn try_open(
        &mut self,
        state: &mut BotState,
        klines: &KlineStore,
        candidate: &TradeCandidate,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome, TradingError> {
        let symbol = candidate.symbol.as_str();
        let settings = &candidate.settings;

        let price = match state
            .last_prices
            .get(symbol)
            .copied()
            .or_else(|| Decimal::from_f64(candidate.trigger_price))
        {
            Some(p) if p > Decimal::ZERO => p,
            _ => return Err(TradingError::NoPrice(symbol.to_string())),
        };

        let candles_1m = klines
            .get(symbol, Interval::M1)
            .map(|w| w.to_vec())
            .unwrap_or_default();
        let open_symbols = state.open_symbols();
        let ctx = GateContext {
            symbol,
            price,
            is_ignition: candidate.is_ignition,
            is_super_bull: candidate.is_super_bull,
            settings,
            running: state.running,
            breaker: state.breaker_status,
            candles_1m: &candles_1m,
            rsi_1h: state.scanner.get(symbol).map(|p| p.macro_analysis.rsi_1h),
            open_symbols: &open_symbols,
            max_open_positions: state.settings.max_open_positions,
            cooldown_until: state.cooldown_until(symbol, now),
            now,
            btc_symbol: &self.btc_symbol,
        };

        if let Err(reason) = gate::evaluate(&ctx, self.market.as_ref()).await {
            tracing::info!(symbol, strategy = %candidate.strategy, %reason, "Entry rejected");
            self.events
                .log(LogLevel::Info, format!("{} entry rejected: {}", symbol, reason));
            increment(CounterMetric::GateRejections);
            return Ok(OpenOutcome::Rejected(reason));
        }

        let atr_7 = klines
            .get(symbol, Interval::M15)
            .and_then(|w| atr(&w.to_vec(), STOP_ATR_PERIOD));
        let plan = stop_plan(
            settings,
            price,
            candidate.is_ignition,
            candidate.reference_low,
            atr_7,
        )
        .ok_or_else(|| TradingError::InvalidRisk {
            symbol: symbol.to_string(),
        })?;

        let notional = position_notional(
            settings,
            &SizingInputs {
                balance: state.balance,
                hotlist_score: candidate.hotlist_score,
                is_ignition: candidate.is_ignition,
                is_super_bull: candidate.is_super_bull,
                btc_warning: state.btc_warning(),
                consecutive_losses: state.consecutive_losses,
            },
        );

        let filters = self.filters_for(symbol, settings).await;
        let target_quantity = Self::round_quantity(notional / price, &filters);
        if target_quantity.is_zero() {
            return Err(TradingError::ZeroQuantity {
                symbol: symbol.to_string(),
            });
        }

        let fractions = scale_in_fractions(
            settings,
            candidate.is_ignition,
            notional,
            filters.min_notional,
        );
        let first_quantity = match fractions.as_deref() {
            Some([first, ..]) => Self::round_quantity(target_quantity * *first, &filters),
            _ => target_quantity,
        };
        if first_quantity.is_zero() {
            return Err(TradingError::ZeroQuantity {
                symbol: symbol.to_string(),
            });
        }

        let first_notional = first_quantity * price;
        if first_notional < filters.min_notional {
            return Err(TradingError::BelowMinNotional {
                symbol: symbol.to_string(),
                notional: first_notional,
                min_notional: filters.min_notional,
            });
        }
        if first_notional > state.balance {
            return Err(TradingError::InsufficientBalance {
                required: first_notional,
                available: state.balance,
            });
        }

        let (fill_price, fill_quantity) = self
            .execute(symbol, OrderSide::Buy, first_quantity, price)
            .await?;
        let plan = stop_plan(
            settings,
            fill_price,
            candidate.is_ignition,
            candidate.reference_low,
            atr_7,
        )
        .unwrap_or(plan);

        let position = Position::open(NewPosition {
            mode: self.mode,
            symbol: symbol.to_string(),
            strategy: candidate.strategy,
            fill_price,
            fill_quantity,
            target_quantity,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            scale_in: fractions.map(ScaleInPlan::new),
            hotlist_score: candidate.hotlist_score,
            settings: settings.clone(),
            opened_at: now,
        });

        if let Err(e) = self.store.insert_trade(&position).await {
            tracing::error!(symbol, error = %e, "Failed to persist new position");
            self.events.log(
                LogLevel::Critical,
                format!("{} filled but not recorded: {}", symbol, e),
            );
            return Err(e.into());
        }

        let id = position.id;
        state.balance -= fill_price * fill_quantity;
        state.positions.push(position);
        if let Some(pair) = state.scanner.get_mut(symbol) {
            pair.strategy_type = Some(candidate.strategy);
        }
        self.persist_scalars(state).await;

        tracing::info!(
            symbol,
            %id,
            strategy = %candidate.strategy,
            profile = ?candidate.profile,
            price = %fill_price,
            quantity = %fill_quantity,
            target = %target_quantity,
            stop = %plan.stop_loss,
            take_profit = %plan.take_profit,
            "Position opened"
        );
        self.events.log(
            LogLevel::Trade,
            format!(
                "BUY {} {} @ {} ({})",
                fill_quantity, symbol, fill_price, candidate.strategy
            ),
        );
        increment(CounterMetric::TradesOpened);
        self.publish_positions(state);
        Ok(OpenOutcome::Opened(id))
    }

    /// Buy the next scale-in chunk on a bullish confirmation candle
    pub async fn try_scale_in(
        &mut self,
        state: &mut BotState,
        symbol: &str,
        candle: &Candle,
        now: DateTime<Utc>,
    ) -> Result<bool, TradingError> {
        let Some(idx) = state.positions.iter().position(|p| p.symbol == symbol) else {
            return Ok(false);
        };
        let current = state.positions[idx].clone();
        if !current.wants_scale_in() || !candle.is_bullish() {
            return Ok(false);
        }
        if current.partial_tp_hit {
            self.disable_scale_in(state, idx).await;
            return Ok(false);
        }
        let Some(fraction) = current.scale_in.as_ref().and_then(|p| p.next_fraction()) else {
            return Ok(false);
        };

        let price = state
            .last_prices
            .get(symbol)
            .copied()
            .or_else(|| Decimal::from_f64(candle.close))
            .ok_or_else(|| TradingError::NoPrice(symbol.to_string()))?;

        let filters = self.filters_for(symbol, &current.settings).await;
        let remaining = Self::round_quantity(current.target_quantity - current.quantity, &filters);
        let quantity = Self::round_quantity(current.target_quantity * fraction, &filters).min(remaining);
        if quantity <= Decimal::ZERO || quantity * price < filters.min_notional {
            self.disable_scale_in(state, idx).await;
            return Ok(false);
        }
        if quantity * price > state.balance {
            self.disable_scale_in(state, idx).await;
            return Err(TradingError::InsufficientBalance {
                required: quantity * price,
                available: state.balance,
            });
        }

        let (fill_price, fill_quantity) =
            match self.execute(symbol, OrderSide::Buy, quantity, price).await {
                Ok(fill) => fill,
                Err(e) => {
                    tracing::warn!(symbol, error = %e, "Scale-in failed, disabling further chunks");
                    self.disable_scale_in(state, idx).await;
                    return Err(e);
                }
            };

        let mut next = current;
        next.apply_scale_in(fill_quantity, fill_price);
        if let Err(e) = self.store.update_trade(&next).await {
            tracing::error!(symbol, error = %e, "Failed to persist scale-in");
            self.events.log(
                LogLevel::Critical,
                format!("{} scale-in filled but not recorded: {}", symbol, e),
            );
            return Err(e.into());
        }

        tracing::info!(
            symbol,
            price = %fill_price,
            quantity = %fill_quantity,
            avg_entry = %next.avg_entry_price,
            take_profit = %next.take_profit,
            complete = !next.wants_scale_in(),
            at = %now,
            "Scaled into position"
        );
        state.balance -= fill_price * fill_quantity;
        state.positions[idx] = next;
        self.persist_scalars(state).await;
        self.events.log(
            LogLevel::Trade,
            format!("SCALE-IN {} {} @ {}", fill_quantity, symbol, fill_price),
        );
        self.publish_positions(state);
        Ok(true)
    }

    async fn disable_scale_in(&self, state: &mut BotState, idx: usize) {
        let Some(position) = state.positions.get_mut(idx) else {
            return;
        };
        if let Some(plan) = position.scale_in.as_mut() {
            plan.disabled = true;
        }
        if let Err(e) = self.store.update_trade(position).await {
            tracing::warn!(symbol = %position.symbol, error = %e, "Failed to persist scale-in stop");
        }
    }

    /// Periodic tick: day rollover and position management
    pub async fn tick(&mut self, state: &mut BotState, klines: &KlineStore, now: DateTime<Utc>) {
        if state.current_day != now.date_naive() || state.awaiting_liquidation() {
            self.evaluate_breaker(state, now).await;
        }
        self.manage_positions(state, klines, now).await;
    }

    /// Update stops, take partials and close on stop or target touch.
    /// Returns the number of positions closed.
    pub async fn manage_positions(
        &mut self,
        state: &mut BotState,
        klines: &KlineStore,
        now: DateTime<Utc>,
    ) -> usize {
        let ids: Vec<Uuid> = state.positions.iter().map(|p| p.id).collect();
        let mut closed = 0;
        for id in ids {
            match self.manage_one(state, klines, id, now).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(%id, error = %e, "Position management failed"),
            }
        }
        set_gauge(GaugeMetric::OpenPositions, state.positions.len() as f64);
        closed
    }

    async fn manage_one(
        &mut self,
        state: &mut BotState,
        klines: &KlineStore,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, TradingError> {
        let Some(idx) = state.position_index(id) else {
            return Ok(false);
        };
        let current = state.positions[idx].clone();
        let Some(price) = state.last_prices.get(&current.symbol).copied() else {
            return Ok(false);
        };
        let atr_15m = klines
            .get(&current.symbol, Interval::M15)
            .and_then(|w| atr(&w.to_vec(), TRAIL_ATR_PERIOD))
            .and_then(Decimal::from_f64);

        let mut next = current.clone();
        let mut proceeds = Decimal::ZERO;
        next.observe_price(price);

        if let Some(exit) = next.first_partial_due(price) {
            proceeds += self.sell_partial(&mut next, exit, price).await;
        }
        next.update_stops(price, atr_15m);
        if let Some(exit) = next.second_partial_due(price) {
            proceeds += self.sell_partial(&mut next, exit, price).await;
        }

        let reason = if next.quantity.is_zero() {
            Some(CloseReason::TakeProfit)
        } else {
            next.exit_trigger(price)
        };

        if next != current {
            if let Err(e) = self.store.update_trade(&next).await {
                tracing::error!(symbol = %current.symbol, error = %e, "Failed to persist position update");
                if !proceeds.is_zero() {
                    self.events.log(
                        LogLevel::Critical,
                        format!("{} partial exit not recorded: {}", current.symbol, e),
                    );
                }
                return Err(e.into());
            }
            if next.stop_loss != current.stop_loss {
                tracing::debug!(
                    symbol = %next.symbol,
                    from = %current.stop_loss,
                    to = %next.stop_loss,
                    trailing = next.trailing_active,
                    "Stop raised"
                );
            }
            state.positions[idx] = next;
            if !proceeds.is_zero() {
                state.balance += proceeds;
                self.persist_scalars(state).await;
                self.publish_positions(state);
            }
        }

        if let Some(reason) = reason {
            self.close_position(state, id, Some(price), reason, now)
                .await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Execute a partial exit on a staged position; returns the proceeds
    async fn sell_partial(&mut self, next: &mut Position, exit: PartialExit, price: Decimal) -> Decimal {
        let filters = self.filters_for(&next.symbol, &next.settings).await;
        let quantity = Self::round_quantity(exit.quantity, &filters);
        if quantity.is_zero() {
            next.apply_partial_sell(
                PartialExit {
                    quantity: Decimal::ZERO,
                    ..exit
                },
                price,
            );
            return Decimal::ZERO;
        }

        match self
            .execute(&next.symbol, OrderSide::Sell, quantity, price)
            .await
        {
            Ok((fill_price, fill_quantity)) => {
                next.apply_partial_sell(
                    PartialExit {
                        quantity: fill_quantity,
                        ..exit
                    },
                    fill_price,
                );
                tracing::info!(
                    symbol = %next.symbol,
                    kind = ?exit.kind,
                    price = %fill_price,
                    quantity = %fill_quantity,
                    realized = %next.realized_pnl,
                    "Partial take-profit"
                );
                self.events.log(
                    LogLevel::Trade,
                    format!("PARTIAL {} {} @ {}", fill_quantity, next.symbol, fill_price),
                );
                fill_price * fill_quantity
            }
            Err(e) => {
                tracing::warn!(symbol = %next.symbol, error = %e, "Partial take-profit failed");
                Decimal::ZERO
            }
        }
    }

    /// Close a position and re-evaluate the breaker
    pub async fn close_position(
        &mut self,
        state: &mut BotState,
        id: Uuid,
        price: Option<Decimal>,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<Position, TradingError> {
        // Settling rolls the day; the status before it is what gets compared
        let before = state.breaker_status;
        let closed = self.settle(state, id, price, reason, now).await?;
        self.evaluate_breaker_since(state, before, now).await;
        Ok(closed)
    }

    async fn settle(
        &mut self,
        state: &mut BotState,
        id: Uuid,
        price: Option<Decimal>,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Result<Position, TradingError> {
        let idx = state
            .position_index(id)
            .ok_or(TradingError::PositionNotFound(id))?;
        let symbol = state.positions[idx].symbol.clone();
        let quantity = state.positions[idx].quantity;
        let settings = state.positions[idx].settings.clone();

        let reference = price
            .or_else(|| state.last_prices.get(&symbol).copied())
            .ok_or_else(|| TradingError::NoPrice(symbol.clone()))?;

        let exit_price = if self.mode.places_orders() {
            let filters = self.filters_for(&symbol, &settings).await;
            let sell_quantity = Self::round_quantity(quantity, &filters);
            if sell_quantity.is_zero() {
                reference
            } else {
                let (fill_price, _) = self
                    .execute(&symbol, OrderSide::Sell, sell_quantity, reference)
                    .await?;
                fill_price
            }
        } else {
            reference
        };

        let closed = state.positions[idx].to_closed(exit_price, reason, now);
        if let Err(e) = self.store.update_trade(&closed).await {
            tracing::error!(%symbol, %id, error = %e, "Failed to persist close, position kept open");
            self.events.log(
                LogLevel::Critical,
                format!("{} close not recorded, operator attention required: {}", symbol, e),
            );
            return Err(e.into());
        }

        tracing::info!(
            %symbol,
            %id,
            %reason,
            exit = %exit_price,
            pnl = %closed.realized_pnl,
            pnl_pct = ?closed.pnl_pct.map(|p| p.round_dp(2)),
            "Position closed"
        );
        self.events.log(
            LogLevel::Trade,
            format!(
                "SELL {} {} @ {} ({}, pnl {})",
                quantity,
                symbol,
                exit_price,
                reason,
                closed.realized_pnl.round_dp(2)
            ),
        );

        state.record_close(closed.clone(), now);
        self.persist_scalars(state).await;
        increment(CounterMetric::TradesClosed);
        self.publish_positions(state);
        Ok(closed)
    }

    /// Close every open position at its last known price
    pub async fn liquidate_all(
        &mut self,
        state: &mut BotState,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> usize {
        let ids: Vec<Uuid> = state.positions.iter().map(|p| p.id).collect();
        let mut closed = 0;
        for id in ids {
            match self.settle(state, id, None, reason, now).await {
                Ok(_) => closed += 1,
                Err(e) => tracing::error!(%id, error = %e, "Liquidation failed"),
            }
        }
        closed
    }

    /// Apply rollover and run the breaker; liquidates on a BTC crash and
    /// keeps retrying while positions survive the halt
    pub async fn evaluate_breaker(
        &mut self,
        state: &mut BotState,
        now: DateTime<Utc>,
    ) -> Option<BreakerTransition> {
        let before = state.breaker_status;
        self.evaluate_breaker_since(state, before, now).await
    }

    async fn evaluate_breaker_since(
        &mut self,
        state: &mut BotState,
        before: CircuitBreakerStatus,
        now: DateTime<Utc>,
    ) -> Option<BreakerTransition> {
        state.roll_day(now);

        let transition = self
            .breaker
            .evaluate(state.breaker_status, &state.breaker_inputs());
        if let Some(t) = transition {
            state.breaker_status = t.to;
            if t.requires_liquidation() {
                tracing::error!(from = %t.from, to = %t.to, "BTC crash, liquidating all positions");
                self.events.log(
                    LogLevel::Critical,
                    format!("Circuit breaker {}: liquidating all positions", t.to),
                );
            }
        }

        if state.awaiting_liquidation() {
            let remaining = state.positions.len();
            let closed = self
                .liquidate_all(state, CloseReason::CircuitBreaker, now)
                .await;
            if closed < remaining {
                tracing::warn!(closed, remaining, "Liquidation incomplete, retrying next tick");
            } else {
                tracing::warn!(closed, "Liquidation complete");
            }
        }

        if state.breaker_status == before {
            return None;
        }
        let change = BreakerTransition {
            from: before,
            to: state.breaker_status,
        };
        self.announce_breaker(state, change).await;
        Some(change)
    }

    /// Operator reset, followed by a fresh evaluation
    pub async fn reset_breaker(&mut self, state: &mut BotState, now: DateTime<Utc>) {
        let previous = state.reset_circuit_breaker();
        if previous != state.breaker_status {
            self.announce_breaker(
                state,
                BreakerTransition {
                    from: previous,
                    to: state.breaker_status,
                },
            )
            .await;
        }
        self.evaluate_breaker(state, now).await;
    }

    async fn announce_breaker(&self, state: &BotState, change: BreakerTransition) {
        tracing::warn!(from = %change.from, to = %change.to, "Circuit breaker transition");
        let level = if change.to.is_hard_halt() {
            LogLevel::Critical
        } else {
            LogLevel::Warn
        };
        self.events.log(
            level,
            format!("Circuit breaker {} -> {}", change.from, change.to),
        );
        self.events.publish(BotEvent::CircuitBreakerUpdate { status: change.to });
        set_gauge(GaugeMetric::BreakerState, change.to.ordinal() as f64);
        self.persist_scalars(state).await;
    }

    async fn persist_scalars(&self, state: &BotState) {
        if let Err(e) = state.persist_scalars(self.store.as_ref()).await {
            tracing::error!(error = %e, "Failed to persist bot state");
            self.events
                .log(LogLevel::Error, format!("State write failed: {}", e));
        }
    }

    fn publish_positions(&self, state: &BotState) {
        set_gauge(GaugeMetric::Balance, state.balance.to_f64().unwrap_or_default());
        set_gauge(
            GaugeMetric::DailyPnl,
            state.daily_pnl.to_f64().unwrap_or_default(),
        );
        set_gauge(GaugeMetric::OpenPositions, state.positions.len() as f64);
        self.events.publish(BotEvent::PositionsUpdated);
    }
}
