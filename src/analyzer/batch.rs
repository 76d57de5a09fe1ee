//! Debounced micro-trigger batch

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// Collects symbols with a fresh closed 1m candle and releases them as one
/// batch once no new symbol arrived for the debounce period.
#[derive(Debug)]
pub struct MicroBatch {
    debounce: Duration,
    queued: BTreeSet<String>,
    deadline: Option<Instant>,
}

impl MicroBatch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            queued: BTreeSet::new(),
            deadline: None,
        }
    }

    /// Queue a symbol and re-arm the deadline
    pub fn enqueue(&mut self, symbol: &str, now: Instant) {
        self.queued.insert(symbol.to_string());
        self.deadline = Some(now + self.debounce);
    }

    /// When the batch becomes due, if anything is queued
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Drain the batch if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<String>> {
        match self.deadline {
            Some(deadline) if now >= deadline => Some(self.flush()),
            _ => None,
        }
    }

    /// Drain the batch regardless of the deadline
    pub fn flush(&mut self) -> Vec<String> {
        self.deadline = None;
        std::mem::take(&mut self.queued).into_iter().collect()
    }

    /// Forget a symbol that left the hotlist
    pub fn remove(&mut self, symbol: &str) {
        self.queued.remove(symbol);
        if self.queued.is_empty() {
            self.deadline = None;
        }
    }
}
