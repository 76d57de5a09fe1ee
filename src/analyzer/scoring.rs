//! Intraday, micro and confirmation scoring
//!
//! Pure functions over closed candles. `None` means not enough history yet.

use crate::discovery::IntradayAnalysis;
use crate::indicators::{adx, atr, bollinger, ema_last, macd_default, rsi, volume_ratio};
use crate::market::Candle;

/// Trailing 15m candles for the volume score
pub const VOLUME_LOOKBACK_15M: usize = 96;
/// Trailing 1m candles for the micro volume ratio
pub const VOLUME_LOOKBACK_1M: usize = 20;
/// Fixed cross-asset term in the hotlist score
pub const CROSS_ASSET_SCORE: f64 = 1.0;
/// Upper bound of the micro score
pub const MAX_MICRO_SCORE: u8 = 4;

const TREND_CLAMP: f64 = 2.0;
const MICRO_VOLUME_SPIKE: f64 = 1.5;

/// 15m trend score in [-2, 2]
pub fn intraday_trend_score(close: f64, ema50: f64, ema200: f64, rsi: f64, macd_bullish: Option<bool>) -> f64 {
    let mut score: f64 = 0.0;
    score += if close > ema50 { 0.5 } else { -0.5 };
    score += if ema50 > ema200 { 0.5 } else { -0.5 };
    if rsi > 55.0 {
        score += 0.5;
    } else if rsi < 45.0 {
        score -= 0.5;
    }
    match macd_bullish {
        Some(true) => score += 0.5,
        Some(false) => score -= 0.5,
        None => {}
    }
    score.clamp(-TREND_CLAMP, TREND_CLAMP)
}

/// Last 15m volume against the trailing 96-candle average
pub fn volume_score(candles: &[Candle]) -> u8 {
    match volume_ratio(candles, VOLUME_LOOKBACK_15M) {
        Some(r) if r > 2.0 => 3,
        Some(r) if r > 1.5 => 2,
        Some(r) if r > 1.3 => 1,
        _ => 0,
    }
}

/// Full 15m snapshot for admission
pub fn analyze_intraday(candles: &[Candle], squeeze_threshold_pct: f64) -> Option<IntradayAnalysis> {
    let last = candles.last()?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let rsi = rsi(&closes, 14).last().copied()?;
    let adx = adx(candles, 14)?;
    let atr = atr(candles, 14)?;
    let bands = bollinger(&closes, 20, 2.0)?;
    let ema50 = ema_last(&closes, 50)?;
    let ema200 = ema_last(&closes, 200)?;
    let macd_bullish = macd_default(&closes).last().map(|m| m.macd > m.signal);

    let atr_pct = if last.close > 0.0 {
        atr / last.close * 100.0
    } else {
        0.0
    };

    Some(IntradayAnalysis {
        rsi,
        adx,
        atr,
        atr_pct,
        bb_width_pct: bands.width_pct,
        is_squeeze: bands.width_pct < squeeze_threshold_pct,
        trend_score: intraday_trend_score(last.close, ema50, ema200, rsi, macd_bullish),
        volume_score: volume_score(candles),
    })
}

/// Admission score: 4h trend + 15m trend + volume + cross-asset term
pub fn hotlist_score(macro_trend: f64, intraday: &IntradayAnalysis) -> f64 {
    macro_trend + intraday.trend_score + intraday.volume_score as f64 + CROSS_ASSET_SCORE
}

/// 1m trigger evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicroSignal {
    /// 0..=4
    pub score: u8,
    pub is_ignition: bool,
    pub volume_ratio: f64,
    pub rsi: f64,
    pub macd: f64,
    pub close: f64,
    pub low: f64,
}

/// Score the latest closed 1m candle
pub fn micro_signal(candles: &[Candle]) -> Option<MicroSignal> {
    let last = candles.last()?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let ema9 = ema_last(&closes, 9)?;
    let rsi_series = rsi(&closes, 14);
    let [.., rsi_prev, rsi_now] = rsi_series.as_slice() else {
        return None;
    };
    let macd_series = macd_default(&closes);
    let [.., macd_prev, macd_now] = macd_series.as_slice() else {
        return None;
    };
    let vr = volume_ratio(candles, VOLUME_LOOKBACK_1M)?;

    let mut score: u8 = 0;
    if last.close > ema9 {
        score += 1;
    }
    if *rsi_prev <= 50.0 && *rsi_now > 50.0 {
        score += 1;
    }
    if macd_prev.macd <= macd_prev.signal && macd_now.macd > macd_now.signal {
        score += 1;
    }
    if vr > MICRO_VOLUME_SPIKE {
        score += 2;
    }

    Some(MicroSignal {
        score: score.min(MAX_MICRO_SCORE),
        is_ignition: vr > MICRO_VOLUME_SPIKE && *rsi_now > 55.0 && macd_now.macd > 0.0,
        volume_ratio: vr,
        rsi: *rsi_now,
        macd: macd_now.macd,
        close: last.close,
        low: last.low,
    })
}

/// 5m confirmation: +2 bullish close above the trigger, -1 strong bearish
/// contradiction, else 0
pub fn confirm_score(candle: &Candle, trigger_price: f64, atr_5m: Option<f64>) -> i32 {
    if candle.is_bullish() && candle.close > trigger_price {
        return 2;
    }
    if candle.is_bearish() {
        if let Some(atr) = atr_5m {
            if candle.body() > atr {
                return -1;
            }
        }
    }
    0
}
