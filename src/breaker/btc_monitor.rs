//! Short-window BTC drop tracking

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Tracks BTC 1m closes over a short window.
///
/// The drop is measured from the oldest close still inside the window to the
/// latest close.
#[derive(Debug, Clone)]
pub struct BtcDropMonitor {
    window: Duration,
    closes: VecDeque<(DateTime<Utc>, f64)>,
}

impl BtcDropMonitor {
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window: Duration::minutes(window_minutes.max(1)),
            closes: VecDeque::new(),
        }
    }

    /// Record a closed BTC 1m candle
    pub fn record(&mut self, timestamp: DateTime<Utc>, close: f64) {
        if close <= 0.0 {
            return;
        }
        if let Some((last_ts, _)) = self.closes.back() {
            if timestamp < *last_ts {
                return;
            }
        }
        self.closes.push_back((timestamp, close));

        let cutoff = timestamp - self.window;
        while let Some((ts, _)) = self.closes.front() {
            if *ts < cutoff {
                self.closes.pop_front();
            } else {
                break;
            }
        }
    }

    /// Percentage drop across the window; zero when price rose
    pub fn drop_pct(&self) -> Option<f64> {
        if self.closes.len() < 2 {
            return None;
        }
        let (_, oldest) = self.closes.front()?;
        let (_, latest) = self.closes.back()?;
        Some(((oldest - latest) / oldest * 100.0).max(0.0))
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
