//! Volume indicators: OBV, CVD, relative volume

use crate::market::Candle;

/// On-balance volume series, starting at zero
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for (i, c) in candles.iter().enumerate() {
        if i > 0 {
            let prev = candles[i - 1].close;
            if c.close > prev {
                total += c.volume;
            } else if c.close < prev {
                total -= c.volume;
            }
        }
        out.push(total);
    }
    out
}

/// Cumulative volume delta estimated from candle shape.
///
/// Buy volume is the share of the range closed above the low; a zero-range
/// candle contributes nothing.
pub fn cvd(candles: &[Candle]) -> Vec<f64> {
    let mut out = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for c in candles {
        let range = c.range();
        if range > 0.0 {
            let buy = c.volume * (c.close - c.low) / range;
            let sell = c.volume * (c.high - c.close) / range;
            total += buy - sell;
        }
        out.push(total);
    }
    out
}

/// Last candle volume divided by the average of the `lookback` candles before it
pub fn volume_ratio(candles: &[Candle], lookback: usize) -> Option<f64> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }
    let last = candles.last()?;
    let prior = &candles[candles.len() - 1 - lookback..candles.len() - 1];
    let avg = prior.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;
    if avg <= 0.0 {
        return None;
    }
    Some(last.volume / avg)
}
