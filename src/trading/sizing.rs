//! Position sizing, stops and scale-in planning

use super::TradingSettings;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Inputs that shape the size of one entry
#[derive(Debug, Clone, Copy)]
pub struct SizingInputs {
    pub balance: Decimal,
    pub hotlist_score: f64,
    pub is_ignition: bool,
    pub is_super_bull: bool,
    /// BTC drop warning active
    pub btc_warning: bool,
    pub consecutive_losses: u32,
}

/// Quote notional to commit to a new position.
///
/// Base percentage (or the strong-buy percentage under dynamic sizing),
/// halved during a BTC-drop warning, scaled for super-bull / ignition and
/// decayed per consecutive loss.
pub fn position_notional(settings: &TradingSettings, inputs: &SizingInputs) -> Decimal {
    let pct = if settings.use_dynamic_sizing
        && inputs.hotlist_score >= settings.strong_buy_hotlist_score
    {
        settings.strong_buy_position_size_pct
    } else {
        settings.position_size_pct
    };

    let mut notional = inputs.balance * pct / Decimal::ONE_HUNDRED;

    if inputs.btc_warning {
        notional /= Decimal::TWO;
    }

    if inputs.is_super_bull {
        notional *= settings.super_bull_size_multiplier;
    } else if inputs.is_ignition {
        notional *= settings.ignition_size_multiplier;
    }

    for _ in 0..inputs.consecutive_losses {
        notional *= settings.loss_streak_size_decay;
    }

    notional.max(Decimal::ZERO)
}

/// Initial stop and take-profit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPlan {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// Compute stop and target for an entry.
///
/// Ignition entries stop at the trigger candle low. Otherwise ATR(7) times
/// the multiplier below entry, falling back to the fixed percentage when ATR
/// stops are off or ATR is unknown. `None` when risk per unit is not
/// positive.
pub fn stop_plan(
    settings: &TradingSettings,
    entry: Decimal,
    is_ignition: bool,
    reference_low: f64,
    atr_7: Option<f64>,
) -> Option<StopPlan> {
    let stop_loss = if is_ignition {
        Decimal::from_f64(reference_low)?
    } else {
        match atr_7.and_then(Decimal::from_f64) {
            Some(atr) if settings.use_atr_stop => entry - atr * settings.atr_multiplier,
            _ => entry * (Decimal::ONE - settings.stop_loss_pct / Decimal::ONE_HUNDRED),
        }
    };

    let risk = entry - stop_loss;
    if risk <= Decimal::ZERO {
        return None;
    }

    Some(StopPlan {
        stop_loss,
        take_profit: entry + risk * settings.risk_reward_ratio,
    })
}

/// Scale-in fractions for an entry, or `None` for a single full-size order.
///
/// Disabled for ignition, and abandoned when the first chunk would fall
/// under the venue minimum notional.
pub fn scale_in_fractions(
    settings: &TradingSettings,
    is_ignition: bool,
    target_notional: Decimal,
    min_notional: Decimal,
) -> Option<Vec<Decimal>> {
    if !settings.scaling_in_enabled || is_ignition {
        return None;
    }
    let fractions = settings.scaling_in_fractions()?;
    if fractions.len() < 2 {
        return None;
    }
    let first = target_notional * fractions[0];
    if first < min_notional {
        tracing::debug!(%first, %min_notional, "First chunk under minimum notional, single entry");
        return None;
    }
    Some(fractions)
}
