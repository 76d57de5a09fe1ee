//! Market sentiment feed
//!
//! The Fear & Greed index drives the sentiment layer of the circuit
//! breaker. Readings are fetched periodically through [`SentimentSource`].

mod fear_greed;

pub use fear_greed::{parse_fear_greed, FearGreedClient};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One index reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// 0 (extreme fear) to 100 (extreme greed)
    pub value: u8,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

/// Source of sentiment readings
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<SentimentReading>;
}
