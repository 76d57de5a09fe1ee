//! Observer broadcast
//!
//! Typed payloads published to whatever UI or recorder subscribes. Sending
//! never blocks and never fails the caller; with no subscribers events are
//! simply dropped.

use crate::breaker::CircuitBreakerStatus;
use crate::discovery::ScannedPair;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Trade,
    Error,
    /// Requires operator attention
    Critical,
}

/// Event payloads
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotEvent {
    Log {
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    ScannerUpdate {
        pair: Box<ScannedPair>,
    },
    PositionsUpdated,
    CircuitBreakerUpdate {
        status: CircuitBreakerStatus,
    },
    FearAndGreedUpdate {
        value: u8,
        classification: String,
    },
    PriceUpdate {
        symbol: String,
        price: Decimal,
    },
}

/// Cloneable handle for publishing events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    /// Create a bus with the given ring capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    /// Publish an event
    pub fn publish(&self, event: BotEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a log entry
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.publish(BotEvent::Log {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
