//! Trend indicators: EMA, MACD, ADX

use crate::market::Candle;

use super::volatility::true_ranges;

/// Exponential moving average seeded with the SMA of the first `period` values.
///
/// Output is aligned to the input tail: `out[i]` corresponds to
/// `values[i + period - 1]`. Empty when there is not enough history.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out.push(prev);

    for value in &values[period..] {
        prev = (value - prev) * k + prev;
        out.push(prev);
    }

    out
}

/// Latest EMA value
pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied()
}

/// One MACD observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    /// Fast EMA minus slow EMA
    pub macd: f64,
    /// EMA of the MACD line
    pub signal: f64,
    /// MACD minus signal
    pub histogram: f64,
}

impl MacdPoint {
    /// MACD line above its signal line
    pub fn is_bullish(&self) -> bool {
        self.macd > self.signal
    }
}

/// MACD series (fast, slow, signal), aligned to the input tail
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    if fast == 0 || fast >= slow || signal == 0 {
        return Vec::new();
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return Vec::new();
    }

    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_line = ema(&line, signal);
    let start = signal - 1;

    signal_line
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let m = line[i + start];
            MacdPoint {
                macd: m,
                signal: *s,
                histogram: m - s,
            }
        })
        .collect()
}

/// Standard MACD(12, 26, 9)
pub fn macd_default(closes: &[f64]) -> Vec<MacdPoint> {
    macd(closes, 12, 26, 9)
}

/// Wilder's Average Directional Index.
///
/// Needs at least `2 * period + 1` candles.
pub fn adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let trs = true_ranges(candles);
    let n = candles.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let p = period as f64;
    let mut tr_s: f64 = trs[1..=period].iter().sum();
    let mut pdm_s: f64 = plus_dm[1..=period].iter().sum();
    let mut mdm_s: f64 = minus_dm[1..=period].iter().sum();

    let dx = |tr: f64, pdm: f64, mdm: f64| -> f64 {
        if tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * pdm / tr;
        let minus_di = 100.0 * mdm / tr;
        let sum = plus_di + minus_di;
        if sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        }
    };

    let mut dxs = vec![dx(tr_s, pdm_s, mdm_s)];
    for i in period + 1..n {
        tr_s = tr_s - tr_s / p + trs[i];
        pdm_s = pdm_s - pdm_s / p + plus_dm[i];
        mdm_s = mdm_s - mdm_s / p + minus_dm[i];
        dxs.push(dx(tr_s, pdm_s, mdm_s));
    }

    if dxs.len() < period {
        return None;
    }

    let mut adx = dxs[..period].iter().sum::<f64>() / p;
    for value in &dxs[period..] {
        adx = (adx * (p - 1.0) + value) / p;
    }
    Some(adx)
}
