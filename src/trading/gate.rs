//! Ordered entry filter chain
//!
//! Checks run in a fixed order and stop at the first rejection. Checks
//! that need venue data fetch it lazily, so an early rejection saves the
//! later requests.

use super::types::RejectReason;
use super::TradingSettings;
use crate::breaker::CircuitBreakerStatus;
use crate::exchange::{BookTicker, MarketDataApi, OrderBookSnapshot};
use crate::indicators::{ema_last, fast_atr, obv, true_ranges};
use crate::market::{Candle, Interval};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Order book band around the price for the liquidity check, in percent
const LIQUIDITY_BAND_PCT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
/// Fast ATR period for the range-expansion check
const RANGE_ATR_PERIOD: usize = 5;
/// Depth levels requested for the liquidity check
const DEPTH_LIMIT: u32 = 100;

type GateResult = Result<(), RejectReason>;

/// Everything the gate needs besides venue data
#[derive(Debug, Clone)]
pub struct GateContext<'a> {
    pub symbol: &'a str,
    pub price: Decimal,
    pub is_ignition: bool,
    pub is_super_bull: bool,
    pub settings: &'a TradingSettings,
    pub running: bool,
    pub breaker: CircuitBreakerStatus,
    /// Closed 1m candles, oldest first
    pub candles_1m: &'a [Candle],
    pub rsi_1h: Option<f64>,
    /// Symbols with open positions
    pub open_symbols: &'a [String],
    pub max_open_positions: usize,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub btc_symbol: &'a str,
}

pub fn check_running(ctx: &GateContext<'_>) -> GateResult {
    if !ctx.running {
        return Err(RejectReason::BotStopped);
    }
    if ctx.breaker.blocks_entries() {
        return Err(RejectReason::BreakerActive(ctx.breaker));
    }
    Ok(())
}

/// Last 1m true range against the fast ATR of the candles before it
pub fn check_range_expansion(ctx: &GateContext<'_>) -> GateResult {
    if !ctx.settings.range_expansion_enabled || !(ctx.is_ignition || ctx.is_super_bull) {
        return Ok(());
    }
    let candles = ctx.candles_1m;
    if candles.len() < RANGE_ATR_PERIOD + 2 {
        return Err(RejectReason::DataUnavailable("1m candles"));
    }
    let last_range = true_ranges(&candles[candles.len() - 2..])
        .last()
        .copied()
        .unwrap_or_default();
    let prior = &candles[..candles.len() - 1];
    let Some(atr) = fast_atr(prior, RANGE_ATR_PERIOD) else {
        return Err(RejectReason::DataUnavailable("fast ATR"));
    };
    let required = atr * ctx.settings.range_expansion_factor;
    if last_range < required {
        return Err(RejectReason::NoRangeExpansion {
            range: last_range,
            required,
        });
    }
    Ok(())
}

/// 1h OBV above its EMA20
pub fn check_obv(candles_1h: &[Candle]) -> GateResult {
    let series = obv(candles_1h);
    let Some(last) = series.last().copied() else {
        return Err(RejectReason::DataUnavailable("1h OBV"));
    };
    let Some(average) = ema_last(&series, 20) else {
        return Err(RejectReason::DataUnavailable("1h OBV"));
    };
    if last <= average {
        return Err(RejectReason::ObvBelowAverage);
    }
    Ok(())
}

pub fn check_spread(ctx: &GateContext<'_>, book: &BookTicker) -> GateResult {
    let max_pct = if ctx.is_ignition || ctx.is_super_bull {
        ctx.settings.max_spread_pct_ignition
    } else {
        ctx.settings.max_spread_pct
    };
    let Some(spread_pct) = book.spread_pct() else {
        return Err(RejectReason::DataUnavailable("book ticker"));
    };
    if spread_pct > max_pct {
        return Err(RejectReason::SpreadTooWide { spread_pct, max_pct });
    }
    Ok(())
}

/// BTC 4h EMA50 at or above EMA200
pub fn check_btc_regime(btc_4h: &[Candle]) -> GateResult {
    let closes: Vec<f64> = btc_4h.iter().map(|c| c.close).collect();
    let (Some(fast), Some(slow)) = (ema_last(&closes, 50), ema_last(&closes, 200)) else {
        return Err(RejectReason::DataUnavailable("BTC 4h candles"));
    };
    if fast < slow {
        return Err(RejectReason::BtcRegimeBearish);
    }
    Ok(())
}

/// Funding ceiling; symbols without a perpetual pass
pub fn check_funding(settings: &TradingSettings, rate_pct: Option<Decimal>) -> GateResult {
    match rate_pct {
        Some(rate) if rate > settings.max_funding_rate_pct => Err(RejectReason::FundingTooHigh {
            rate_pct: rate,
            max_pct: settings.max_funding_rate_pct,
        }),
        _ => Ok(()),
    }
}

pub fn check_liquidity(ctx: &GateContext<'_>, book: &OrderBookSnapshot) -> GateResult {
    let required = if ctx.is_ignition {
        ctx.settings.min_liquidity_usd_ignition
    } else {
        ctx.settings.min_liquidity_usd
    };
    let available = book.liquidity_within(ctx.price, LIQUIDITY_BAND_PCT);
    if available < required {
        return Err(RejectReason::InsufficientLiquidity {
            available,
            required,
        });
    }
    Ok(())
}

pub fn check_sector(ctx: &GateContext<'_>) -> GateResult {
    if !ctx.settings.sector_filter_enabled || ctx.is_ignition {
        return Ok(());
    }
    let Some(sector) = ctx.settings.sectors.get(ctx.symbol) else {
        return Ok(());
    };
    let clash = ctx
        .open_symbols
        .iter()
        .any(|s| ctx.settings.sectors.get(s) == Some(sector));
    if clash {
        return Err(RejectReason::SectorCorrelated {
            sector: sector.clone(),
        });
    }
    Ok(())
}

fn is_major(symbol: &str) -> bool {
    symbol.starts_with("BTC") || symbol.starts_with("ETH")
}

/// Cap on simultaneous positions outside BTC and ETH
pub fn check_correlated(ctx: &GateContext<'_>) -> GateResult {
    if is_major(ctx.symbol) {
        return Ok(());
    }
    let open = ctx.open_symbols.iter().filter(|s| !is_major(s)).count();
    if open >= ctx.settings.max_correlated_trades {
        return Err(RejectReason::TooManyCorrelated {
            open,
            max: ctx.settings.max_correlated_trades,
        });
    }
    Ok(())
}

pub fn check_rsi_1h(ctx: &GateContext<'_>) -> GateResult {
    if ctx.is_ignition {
        return Ok(());
    }
    match ctx.rsi_1h {
        Some(rsi) if rsi > ctx.settings.max_rsi_1h => Err(RejectReason::RsiOverbought {
            rsi,
            max: ctx.settings.max_rsi_1h,
        }),
        _ => Ok(()),
    }
}

/// Percentage move over the lookback window of 1m closes
pub fn parabolic_move_pct(candles_1m: &[Candle], lookback: usize) -> Option<f64> {
    if lookback == 0 || candles_1m.len() < lookback + 1 {
        return None;
    }
    let base = candles_1m[candles_1m.len() - 1 - lookback].close;
    let last = candles_1m.last()?.close;
    if base <= 0.0 {
        return None;
    }
    Some((last - base) / base * 100.0)
}

pub fn check_parabolic(ctx: &GateContext<'_>) -> GateResult {
    if ctx.is_ignition {
        return Ok(());
    }
    let Some(move_pct) = parabolic_move_pct(ctx.candles_1m, ctx.settings.parabolic_lookback_minutes)
    else {
        return Err(RejectReason::DataUnavailable("1m candles"));
    };
    if move_pct > ctx.settings.max_parabolic_move_pct {
        return Err(RejectReason::ParabolicMove {
            move_pct,
            max_pct: ctx.settings.max_parabolic_move_pct,
        });
    }
    Ok(())
}

pub fn check_cooldown(ctx: &GateContext<'_>) -> GateResult {
    match ctx.cooldown_until {
        Some(until) if until > ctx.now => Err(RejectReason::Cooldown { until }),
        _ => Ok(()),
    }
}

pub fn check_capacity(ctx: &GateContext<'_>) -> GateResult {
    if ctx.open_symbols.len() >= ctx.max_open_positions {
        return Err(RejectReason::MaxPositions {
            open: ctx.open_symbols.len(),
            max: ctx.max_open_positions,
        });
    }
    Ok(())
}

pub fn check_duplicate(ctx: &GateContext<'_>) -> GateResult {
    if ctx.open_symbols.iter().any(|s| s == ctx.symbol) {
        return Err(RejectReason::DuplicatePosition);
    }
    Ok(())
}

/// Run the full chain
pub async fn evaluate(ctx: &GateContext<'_>, market: &dyn MarketDataApi) -> GateResult {
    let settings = ctx.settings;

    check_running(ctx)?;
    check_range_expansion(ctx)?;

    if settings.obv_filter_enabled {
        let candles = market
            .fetch_klines(ctx.symbol, Interval::H1, Interval::H1.hydration_limit())
            .await
            .map_err(|e| {
                tracing::warn!(symbol = ctx.symbol, error = %e, "1h klines fetch failed");
                RejectReason::DataUnavailable("1h candles")
            })?;
        check_obv(&candles)?;
    }

    let book = market.fetch_book_ticker(ctx.symbol).await.map_err(|e| {
        tracing::warn!(symbol = ctx.symbol, error = %e, "Book ticker fetch failed");
        RejectReason::DataUnavailable("book ticker")
    })?;
    check_spread(ctx, &book)?;

    if settings.btc_regime_filter_enabled {
        let btc = market
            .fetch_klines(ctx.btc_symbol, Interval::H4, Interval::H4.hydration_limit())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "BTC 4h klines fetch failed");
                RejectReason::DataUnavailable("BTC 4h candles")
            })?;
        check_btc_regime(&btc)?;
    }

    if settings.funding_filter_enabled {
        let rate = market.fetch_funding_rate(ctx.symbol).await.map_err(|e| {
            tracing::warn!(symbol = ctx.symbol, error = %e, "Funding rate fetch failed");
            RejectReason::DataUnavailable("funding rate")
        })?;
        check_funding(settings, rate)?;
    }

    let depth = market
        .fetch_order_book(ctx.symbol, DEPTH_LIMIT)
        .await
        .map_err(|e| {
            tracing::warn!(symbol = ctx.symbol, error = %e, "Order book fetch failed");
            RejectReason::DataUnavailable("order book")
        })?;
    check_liquidity(ctx, &depth)?;

    check_sector(ctx)?;
    check_correlated(ctx)?;
    check_rsi_1h(ctx)?;
    check_parabolic(ctx)?;
    check_cooldown(ctx)?;
    check_capacity(ctx)?;
    check_duplicate(ctx)
}
