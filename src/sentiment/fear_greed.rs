//! alternative.me Fear & Greed client

use super::{SentimentReading, SentimentSource};
use crate::config::SentimentConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the Fear & Greed index
#[derive(Debug, Clone)]
pub struct FearGreedClient {
    client: Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(config: &SentimentConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

/// Parse `{"data": [{"value": "40", "value_classification": "Fear", "timestamp": "..."}]}`
pub fn parse_fear_greed(body: &Value) -> anyhow::Result<SentimentReading> {
    let entry = body
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| anyhow::anyhow!("Missing data[0] in sentiment response"))?;

    let value: u8 = entry
        .get("value")
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
            _ => None,
        })
        .filter(|v| *v <= 100)
        .ok_or_else(|| anyhow::anyhow!("Invalid sentiment value"))?;

    let classification = entry
        .get("value_classification")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Ok(SentimentReading {
        value,
        classification,
        timestamp,
    })
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    async fn fetch(&self) -> anyhow::Result<SentimentReading> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Sentiment request failed: {}", response.status());
        }
        let body: Value = response.json().await?;
        parse_fear_greed(&body)
    }
}
