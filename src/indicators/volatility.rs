//! Volatility indicators: true range, ATR, fast ATR, Bollinger Bands

use crate::market::Candle;

/// True range per candle; the first entry is the plain high-low range
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                c.high - c.low
            } else {
                let prev_close = candles[i - 1].close;
                (c.high - c.low)
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs())
            }
        })
        .collect()
}

/// Wilder's Average True Range (latest value).
///
/// Needs `period + 1` candles.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let trs = true_ranges(candles);
    let p = period as f64;
    let mut value = trs[1..=period].iter().sum::<f64>() / p;
    for tr in &trs[period + 1..] {
        value = (value * (p - 1.0) + tr) / p;
    }
    Some(value)
}

/// Reactive ATR: EMA-smoothed true range, weighting recent bars heavily
pub fn fast_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let trs = true_ranges(candles);
    super::ema_last(&trs[1..], period)
}

/// Bollinger Bands snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// (upper - lower) / middle, in percent
    pub width_pct: f64,
}

impl BollingerBands {
    /// Band width below `threshold_pct` of the middle band
    pub fn is_squeeze(&self, threshold_pct: f64) -> bool {
        self.width_pct < threshold_pct
    }
}

/// Bollinger Bands over the last `period` closes with `k` standard deviations
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let n = period as f64;
    let middle = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let upper = middle + k * std_dev;
    let lower = middle - k * std_dev;
    let width_pct = if middle == 0.0 {
        0.0
    } else {
        (upper - lower) / middle * 100.0
    };

    Some(BollingerBands {
        upper,
        middle,
        lower,
        width_pct,
    })
}
