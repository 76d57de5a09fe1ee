//! Binance combined-stream feed

use super::{FeedError, FeedEvent, MarketFeed, StreamCommand};
use crate::market::{Candle, Interval, MarketEvent, Ticker};
use crate::telemetry::{increment, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct RawKlineEvent {
    #[serde(rename = "k")]
    kline: RawKline,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "v")]
    volume: String,
    /// Candle closed
    #[serde(rename = "x")]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct RawTickerEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    last_price: Decimal,
    #[serde(rename = "q")]
    quote_volume: Decimal,
    #[serde(rename = "P")]
    price_change_pct: Decimal,
}

fn malformed(event: &'static str, reason: impl ToString) -> FeedError {
    FeedError::Malformed {
        event,
        reason: reason.to_string(),
    }
}

fn parse_f64(event: &'static str, field: &str, value: &str) -> Result<f64, FeedError> {
    value
        .parse()
        .map_err(|_| malformed(event, format!("{} is not a number: {:?}", field, value)))
}

/// Parse one combined-stream frame.
///
/// Accepts both `{"stream": .., "data": {..}}` envelopes and bare payloads.
/// Returns `Ok(None)` for subscription acknowledgements and event types the
/// pipeline does not consume.
pub fn parse_stream_message(text: &str) -> Result<Option<MarketEvent>, FeedError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if value.get("result").is_some() && value.get("id").is_some() {
        return Ok(None);
    }

    let data = value.get("data").unwrap_or(&value);
    let event_type = data.get("e").and_then(|e| e.as_str()).unwrap_or_default();

    match event_type {
        "kline" => {
            let raw: RawKlineEvent =
                serde_json::from_value(data.clone()).map_err(|e| malformed("kline", e))?;
            let k = raw.kline;
            let interval = Interval::from_str(&k.interval).map_err(|e| malformed("kline", e))?;
            let candle = Candle {
                open_time: k.open_time,
                close_time: k.close_time,
                open: parse_f64("kline", "open", &k.open)?,
                high: parse_f64("kline", "high", &k.high)?,
                low: parse_f64("kline", "low", &k.low)?,
                close: parse_f64("kline", "close", &k.close)?,
                volume: parse_f64("kline", "volume", &k.volume)?,
            };
            Ok(Some(MarketEvent::Kline {
                symbol: k.symbol,
                interval,
                candle,
                is_final: k.is_final,
            }))
        }
        "24hrTicker" => {
            let raw: RawTickerEvent =
                serde_json::from_value(data.clone()).map_err(|e| malformed("ticker", e))?;
            Ok(Some(MarketEvent::Ticker(Ticker {
                symbol: raw.symbol,
                last_price: raw.last_price,
                quote_volume: raw.quote_volume,
                price_change_pct: raw.price_change_pct,
            })))
        }
        "" => Err(malformed("unknown", "missing event type")),
        other => {
            tracing::debug!(event_type = other, "Ignoring unsupported stream event");
            Ok(None)
        }
    }
}

/// Serialize a subscription command for the venue
pub fn command_message(command: &StreamCommand, id: u64) -> String {
    let params: Vec<String> = command.streams().iter().map(|s| s.stream_name()).collect();
    serde_json::json!({
        "method": command.method(),
        "params": params,
        "id": id,
    })
    .to_string()
}

/// Binance combined-stream feed
pub struct BinanceFeed {
    config: WsConfig,
}

impl BinanceFeed {
    /// Create a feed against a combined-stream endpoint
    pub fn new(ws_url: impl Into<String>, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            config: WsConfig::new(ws_url).backoff(base_backoff, max_backoff),
        }
    }

    /// Bridge transport messages and outbound commands until either side closes
    async fn run_message_loop(
        mut ws_rx: mpsc::Receiver<WsMessage>,
        ws_cmd_tx: mpsc::Sender<String>,
        mut cmd_rx: mpsc::Receiver<StreamCommand>,
        event_tx: mpsc::Sender<FeedEvent>,
    ) {
        let mut next_id: u64 = 1;

        loop {
            tokio::select! {
                msg = ws_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let event = match msg {
                        WsMessage::Text(text) => match parse_stream_message(&text) {
                            Ok(Some(event)) => FeedEvent::Market(event),
                            Ok(None) => continue,
                            Err(e) => {
                                increment(CounterMetric::MalformedMessages);
                                tracing::warn!(error = %e, "Discarding malformed feed message");
                                continue;
                            }
                        },
                        WsMessage::Connected => {
                            tracing::info!("Market feed connected");
                            FeedEvent::Connected
                        }
                        WsMessage::Reconnecting { attempt, delay } => {
                            increment(CounterMetric::FeedReconnects);
                            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Market feed reconnecting");
                            FeedEvent::Reconnecting { attempt }
                        }
                        WsMessage::Disconnected => {
                            tracing::warn!("Market feed disconnected");
                            let _ = event_tx.send(FeedEvent::Disconnected).await;
                            break;
                        }
                    };
                    if event_tx.send(event).await.is_err() {
                        tracing::debug!("Feed receiver dropped, stopping feed");
                        break;
                    }
                }

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if cmd.streams().is_empty() {
                        continue;
                    }
                    tracing::debug!(method = cmd.method(), streams = cmd.streams().len(), "Sending stream command");
                    if ws_cmd_tx.send(command_message(&cmd, next_id)).await.is_err() {
                        break;
                    }
                    next_id += 1;
                }
            }
        }
    }
}

#[async_trait]
impl MarketFeed for BinanceFeed {
    async fn start(
        &self,
    ) -> anyhow::Result<(mpsc::Receiver<FeedEvent>, mpsc::Sender<StreamCommand>)> {
        let (event_tx, event_rx) = mpsc::channel(4096);
        let (cmd_tx, cmd_rx) = mpsc::channel(256);

        tracing::info!(url = %self.config.url, "Starting market feed");
        let client = WsClient::new(self.config.clone());
        let (ws_rx, ws_cmd_tx) = client.connect();

        tokio::spawn(async move {
            Self::run_message_loop(ws_rx, ws_cmd_tx, cmd_rx, event_tx).await;
        });

        Ok((event_rx, cmd_tx))
    }
}
