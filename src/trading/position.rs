//! Position state and per-tick management rules
//!
//! Everything here is pure arithmetic on a single position. Order
//! execution and persistence around these steps live in the engine.

use super::types::{CloseReason, PartialExit, PartialKind, PositionStatus};
use super::TradingSettings;
use crate::config::TradingMode;
use crate::discovery::StrategyType;
use crate::exchange::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Remaining scale-in chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleInPlan {
    /// Fractions of the target quantity, in order
    pub fractions: Vec<Decimal>,
    /// Chunks filled so far, including the opening one
    pub filled: usize,
    /// Set after a failed scale-in order
    pub disabled: bool,
}

impl ScaleInPlan {
    pub fn new(fractions: Vec<Decimal>) -> Self {
        Self {
            fractions,
            filled: 1,
            disabled: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.filled >= self.fractions.len()
    }

    /// Fraction of the target quantity for the next chunk
    pub fn next_fraction(&self) -> Option<Decimal> {
        if self.disabled {
            return None;
        }
        self.fractions.get(self.filled).copied()
    }
}

/// An open or closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub mode: TradingMode,
    pub symbol: String,
    pub side: OrderSide,
    pub strategy: StrategyType,
    pub status: PositionStatus,
    /// First fill price
    pub entry_price: Decimal,
    /// Volume-weighted entry across scale-ins
    pub avg_entry_price: Decimal,
    /// Quantity currently held
    pub quantity: Decimal,
    /// Full planned quantity
    pub target_quantity: Decimal,
    /// Cost basis of the held quantity
    pub total_cost: Decimal,
    pub stop_loss: Decimal,
    pub initial_stop_loss: Decimal,
    pub take_profit: Decimal,
    pub highest_price: Decimal,
    pub breakeven_armed: bool,
    /// A trailing rule has moved the stop
    pub trailing_active: bool,
    /// Trailing multiplier tightened; never reverts
    pub trailing_tightened: bool,
    pub partial_tp_hit: bool,
    pub second_partial_done: bool,
    pub realized_pnl: Decimal,
    pub scale_in: Option<ScaleInPlan>,
    pub hotlist_score: f64,
    /// Settings frozen at entry
    pub settings: TradingSettings,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub close_reason: Option<CloseReason>,
    pub pnl_pct: Option<Decimal>,
}

/// Parameters for a new position
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub mode: TradingMode,
    pub symbol: String,
    pub strategy: StrategyType,
    pub fill_price: Decimal,
    pub fill_quantity: Decimal,
    pub target_quantity: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub scale_in: Option<ScaleInPlan>,
    pub hotlist_score: f64,
    pub settings: TradingSettings,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(params: NewPosition) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: params.mode,
            symbol: params.symbol,
            side: OrderSide::Buy,
            strategy: params.strategy,
            status: PositionStatus::Filled,
            entry_price: params.fill_price,
            avg_entry_price: params.fill_price,
            quantity: params.fill_quantity,
            target_quantity: params.target_quantity,
            total_cost: params.fill_price * params.fill_quantity,
            stop_loss: params.stop_loss,
            initial_stop_loss: params.stop_loss,
            take_profit: params.take_profit,
            highest_price: params.fill_price,
            breakeven_armed: false,
            trailing_active: false,
            trailing_tightened: false,
            partial_tp_hit: false,
            second_partial_done: false,
            realized_pnl: Decimal::ZERO,
            scale_in: params.scale_in,
            hotlist_score: params.hotlist_score,
            settings: params.settings,
            opened_at: params.opened_at,
            closed_at: None,
            exit_price: None,
            close_reason: None,
            pnl_pct: None,
        }
    }

    pub fn is_ignition(&self) -> bool {
        self.strategy == StrategyType::Ignition
    }

    /// Unrealized PnL percent against the average entry
    pub fn pnl_pct_at(&self, price: Decimal) -> Decimal {
        if self.avg_entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.avg_entry_price) / self.avg_entry_price * Decimal::ONE_HUNDRED
    }

    /// Current R multiple; `None` when the initial risk is not positive
    pub fn r_multiple(&self, price: Decimal) -> Option<Decimal> {
        let risk = self.avg_entry_price - self.initial_stop_loss;
        if risk <= Decimal::ZERO {
            return None;
        }
        Some((price - self.avg_entry_price) / risk)
    }

    /// Move the stop up; never down. Returns whether it moved.
    pub fn raise_stop(&mut self, candidate: Decimal) -> bool {
        if candidate > self.stop_loss {
            self.stop_loss = candidate;
            true
        } else {
            false
        }
    }

    /// Track the running high
    pub fn observe_price(&mut self, price: Decimal) {
        if price > self.highest_price {
            self.highest_price = price;
        }
    }

    /// Breakeven and trailing rules. `atr_15m` feeds the adaptive trail.
    pub fn update_stops(&mut self, price: Decimal, atr_15m: Option<Decimal>) {
        let pnl_pct = self.pnl_pct_at(price);

        if self.is_ignition() {
            if !self.settings.flash_trailing_enabled {
                return;
            }
            if !self.breakeven_armed && pnl_pct >= self.settings.flash_breakeven_pct {
                self.breakeven_armed = true;
                self.raise_stop(self.avg_entry_price);
            }
            if self.breakeven_armed {
                let trail = self.highest_price
                    * (Decimal::ONE - self.settings.flash_trailing_pct / Decimal::ONE_HUNDRED);
                if self.raise_stop(trail) {
                    self.trailing_active = true;
                }
            }
            return;
        }

        let r = self.r_multiple(price);

        if self.settings.auto_breakeven_enabled && !self.breakeven_armed {
            if let Some(r) = r {
                if r >= self.settings.breakeven_trigger_r {
                    self.breakeven_armed = true;
                    self.raise_stop(self.breakeven_price());
                }
            }
        }

        if self.settings.trailing_stop_enabled {
            if let Some(atr) = atr_15m {
                if !self.trailing_tightened {
                    if let Some(r) = r {
                        if r >= self.settings.trailing_tighten_r {
                            self.trailing_tightened = true;
                        }
                    }
                }
                let multiplier = if self.trailing_tightened {
                    self.settings.trailing_tight_multiplier
                } else {
                    self.settings.trailing_atr_multiplier
                };
                if self.raise_stop(self.highest_price - atr * multiplier) {
                    self.trailing_active = true;
                }
            }
        }
    }

    /// Breakeven stop, optionally lifted to cover round-trip fees
    pub fn breakeven_price(&self) -> Decimal {
        if self.settings.breakeven_fee_offset {
            let offset = self.settings.fee_pct * Decimal::TWO / Decimal::ONE_HUNDRED;
            self.avg_entry_price * (Decimal::ONE + offset)
        } else {
            self.avg_entry_price
        }
    }

    fn partial_quantity(&self) -> Decimal {
        (self.target_quantity * self.settings.partial_tp_sell_pct / Decimal::ONE_HUNDRED)
            .min(self.quantity)
    }

    /// First partial take-profit, non-ignition only
    pub fn first_partial_due(&self, price: Decimal) -> Option<PartialExit> {
        if self.is_ignition() || !self.settings.partial_tp_enabled || self.partial_tp_hit {
            return None;
        }
        if self.pnl_pct_at(price) < self.settings.partial_tp_trigger_pct {
            return None;
        }
        Some(PartialExit {
            kind: PartialKind::First,
            quantity: self.partial_quantity(),
        })
    }

    /// Second partial once PnL% reaches the reward ratio
    pub fn second_partial_due(&self, price: Decimal) -> Option<PartialExit> {
        if self.is_ignition()
            || !self.settings.partial_tp_enabled
            || !self.partial_tp_hit
            || self.second_partial_done
        {
            return None;
        }
        if self.pnl_pct_at(price) < self.settings.risk_reward_ratio {
            return None;
        }
        Some(PartialExit {
            kind: PartialKind::Second,
            quantity: self.partial_quantity(),
        })
    }

    /// Record a partial sell. Cost basis shrinks at the average entry.
    pub fn apply_partial_sell(&mut self, exit: PartialExit, price: Decimal) {
        let qty = exit.quantity.min(self.quantity);
        self.realized_pnl += (price - self.avg_entry_price) * qty;
        self.total_cost -= self.avg_entry_price * qty;
        self.quantity -= qty;
        match exit.kind {
            PartialKind::First => self.partial_tp_hit = true,
            PartialKind::Second => self.second_partial_done = true,
        }
    }

    /// Record a scale-in fill and re-derive the target from the initial stop
    pub fn apply_scale_in(&mut self, quantity: Decimal, price: Decimal) {
        self.quantity += quantity;
        self.total_cost += quantity * price;
        if !self.quantity.is_zero() {
            self.avg_entry_price = self.total_cost / self.quantity;
        }
        let risk = self.avg_entry_price - self.initial_stop_loss;
        self.take_profit = self.avg_entry_price + risk * self.settings.risk_reward_ratio;
        if let Some(plan) = self.scale_in.as_mut() {
            plan.filled += 1;
        }
    }

    /// Position is still waiting for scale-in chunks
    pub fn wants_scale_in(&self) -> bool {
        self.scale_in
            .as_ref()
            .map(|p| !p.disabled && !p.is_complete())
            .unwrap_or(false)
    }

    /// Stop or target touched at `price`
    pub fn exit_trigger(&self, price: Decimal) -> Option<CloseReason> {
        if price <= self.stop_loss {
            return Some(if self.trailing_active {
                CloseReason::TrailingStop
            } else if self.breakeven_armed {
                CloseReason::Breakeven
            } else {
                CloseReason::StopLoss
            });
        }
        if price >= self.take_profit {
            return Some(CloseReason::TakeProfit);
        }
        None
    }

    /// Realized PnL if the remaining quantity is sold at `exit_price`
    pub fn settlement_pnl(&self, exit_price: Decimal) -> Decimal {
        self.realized_pnl + (exit_price * self.quantity - self.total_cost)
    }

    /// Closed copy of this position. `self` is left untouched so a
    /// failed write leaves in-memory state intact.
    pub fn to_closed(&self, exit_price: Decimal, reason: CloseReason, now: DateTime<Utc>) -> Self {
        let pnl = self.settlement_pnl(exit_price);
        let planned_value = self.target_quantity * self.avg_entry_price;
        let pnl_pct = if planned_value.is_zero() {
            Decimal::ZERO
        } else {
            pnl / planned_value * Decimal::ONE_HUNDRED
        };

        let mut closed = self.clone();
        closed.status = PositionStatus::Closed;
        closed.realized_pnl = pnl;
        closed.exit_price = Some(exit_price);
        closed.close_reason = Some(reason);
        closed.closed_at = Some(now);
        closed.pnl_pct = Some(pnl_pct);
        closed
    }
}
