//! Bounded per-symbol candle windows

use super::{Candle, Interval};
use std::collections::{HashMap, VecDeque};

/// Outcome of pushing a candle into a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// New candle appended
    Appended,
    /// Last candle replaced (same open time)
    Replaced,
    /// Candle older than the window tail, ignored
    Stale,
}

/// Fixed-capacity, strictly time-ordered candle window
#[derive(Debug, Clone)]
pub struct KlineWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl KlineWindow {
    /// Create an empty window with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Create an empty window sized for an interval
    pub fn for_interval(interval: Interval) -> Self {
        Self::new(interval.window_capacity())
    }

    /// Push a candle, evicting the oldest when full
    pub fn push(&mut self, candle: Candle) -> PushOutcome {
        if let Some(last) = self.candles.back_mut() {
            if candle.open_time == last.open_time {
                *last = candle;
                return PushOutcome::Replaced;
            }
            if candle.open_time < last.open_time {
                return PushOutcome::Stale;
            }
        }

        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        PushOutcome::Appended
    }

    /// Seed from history, keeping order and capacity
    pub fn seed(&mut self, history: impl IntoIterator<Item = Candle>) {
        for candle in history {
            self.push(candle);
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent candle
    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Copy of all candles, oldest first
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    /// Close prices, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// The last `n` candles (or fewer), oldest first
    pub fn tail(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).copied().collect()
    }
}

/// Windows keyed by (symbol, interval)
#[derive(Debug, Default)]
pub struct KlineStore {
    windows: HashMap<(String, Interval), KlineWindow>,
}

impl KlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window for a key, if one exists
    pub fn get(&self, symbol: &str, interval: Interval) -> Option<&KlineWindow> {
        self.windows.get(&(symbol.to_string(), interval))
    }

    /// Window for a key, created on first use
    pub fn entry(&mut self, symbol: &str, interval: Interval) -> &mut KlineWindow {
        self.windows
            .entry((symbol.to_string(), interval))
            .or_insert_with(|| KlineWindow::for_interval(interval))
    }

    /// Push a candle into its window
    pub fn push(&mut self, symbol: &str, interval: Interval, candle: Candle) -> PushOutcome {
        self.entry(symbol, interval).push(candle)
    }

    /// Replace the window for a key
    pub fn insert(&mut self, symbol: &str, interval: Interval, window: KlineWindow) {
        self.windows.insert((symbol.to_string(), interval), window);
    }

    /// Drop a window
    pub fn remove(&mut self, symbol: &str, interval: Interval) {
        self.windows.remove(&(symbol.to_string(), interval));
    }

    /// Drop every window for a symbol
    pub fn remove_symbol(&mut self, symbol: &str) {
        self.windows.retain(|(s, _), _| s != symbol);
    }

    /// Number of windows held
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
