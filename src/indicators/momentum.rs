//! Momentum oscillators

/// Wilder's RSI series.
///
/// `out[i]` corresponds to `closes[i + period]`. Empty without `period + 1` closes.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let p = period as f64;
    let mut gain = 0.0;
    let mut loss = 0.0;
    for i in 1..=period {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }

    let mut avg_gain = gain / p;
    let mut avg_loss = loss / p;
    let mut out = Vec::with_capacity(closes.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));

    for i in period + 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let (g, l) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (p - 1.0) + g) / p;
        avg_loss = (avg_loss * (p - 1.0) + l) / p;
        out.push(rsi_value(avg_gain, avg_loss));
    }

    out
}

/// Latest RSI value
pub fn rsi_last(closes: &[f64], period: usize) -> Option<f64> {
    rsi(closes, period).last().copied()
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
