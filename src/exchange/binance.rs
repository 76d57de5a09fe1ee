//! Binance REST client
//!
//! Public market data comes from the spot (and futures, for funding) hosts;
//! signed account and order calls go to the execution host, which is the
//! testnet in paper mode.

use super::{
    AccountInfo, BookTicker, ExecutionApi, MarketDataApi, OrderBookSnapshot, OrderFill,
    OrderRequest, SymbolFilters,
};
use crate::config::ExchangeConfig;
use crate::market::{Candle, Interval, Ticker};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// REST request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    last_price: Decimal,
    quote_volume: Decimal,
    price_change_percent: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookTicker {
    bid_price: Decimal,
    ask_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawDepth {
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPremiumIndex {
    last_funding_rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawExchangeInfo {
    symbols: Vec<RawSymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct RawSymbolInfo {
    symbol: String,
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
}

/// Binance spot REST client
pub struct BinanceRest {
    client: Client,
    rest_url: String,
    execution_url: String,
    futures_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    recv_window_ms: u64,
}

impl BinanceRest {
    /// Create a client from the exchange configuration
    pub fn new(config: &ExchangeConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            rest_url: config.rest_url.trim_end_matches('/').to_string(),
            execution_url: config.execution_url().trim_end_matches('/').to_string(),
            futures_url: config.futures_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            recv_window_ms: config.recv_window_ms,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }

    /// Build the signed query string for authenticated endpoints
    fn signed_query(&self, params: &[(&str, String)]) -> anyhow::Result<String> {
        let secret = self
            .api_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API secret required for signed requests"))?;

        let mut pairs: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        if self.recv_window_ms > 0 {
            pairs.push(format!("recvWindow={}", self.recv_window_ms));
        }
        pairs.push(format!("timestamp={}", chrono::Utc::now().timestamp_millis()));

        let query = pairs.join("&");
        let signature = sign(secret, &query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn signed_request<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API key required for signed requests"))?;
        let url = format!("{}{}?{}", self.execution_url, path, self.signed_query(params)?);

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance signed request failed: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }
}

/// HMAC-SHA256 signature of a query string, hex encoded
pub(crate) fn sign(secret: &str, query: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to init signer: {}", e))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Parse one kline row `[openTime, "o", "h", "l", "c", "v", closeTime, ...]`
pub(crate) fn parse_kline_row(row: &serde_json::Value) -> Option<Candle> {
    let arr = row.as_array()?;
    if arr.len() < 7 {
        return None;
    }
    let num = |v: &serde_json::Value| -> Option<f64> { v.as_str()?.parse().ok() };

    Some(Candle {
        open_time: arr[0].as_i64()?,
        open: num(&arr[1])?,
        high: num(&arr[2])?,
        low: num(&arr[3])?,
        close: num(&arr[4])?,
        volume: num(&arr[5])?,
        close_time: arr[6].as_i64()?,
    })
}

/// Extract lot step and minimum notional from a symbol's filter list
pub(crate) fn parse_symbol_filters(filters: &[serde_json::Value]) -> Option<SymbolFilters> {
    let decimal_field = |filter: &serde_json::Value, key: &str| -> Option<Decimal> {
        Decimal::from_str(filter.get(key)?.as_str()?).ok()
    };

    let mut step_size = None;
    let mut min_notional = None;
    for filter in filters {
        match filter.get("filterType").and_then(|t| t.as_str()) {
            Some("LOT_SIZE") => step_size = decimal_field(filter, "stepSize"),
            Some("NOTIONAL") | Some("MIN_NOTIONAL") => {
                min_notional = decimal_field(filter, "minNotional")
            }
            _ => {}
        }
    }

    Some(SymbolFilters {
        step_size: step_size?,
        min_notional: min_notional.unwrap_or_default(),
    })
}

#[async_trait]
impl MarketDataApi for BinanceRest {
    async fn fetch_tickers(&self) -> anyhow::Result<Vec<Ticker>> {
        let url = format!("{}/api/v3/ticker/24hr", self.rest_url);
        let raw: Vec<RawTicker> = self.get_json(&url, &[]).await?;

        Ok(raw
            .into_iter()
            .map(|t| Ticker {
                symbol: t.symbol,
                last_price: t.last_price,
                quote_volume: t.quote_volume,
                price_change_pct: t.price_change_percent,
            })
            .collect())
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.rest_url);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        let raw: Vec<serde_json::Value> = self.get_json(&url, &query).await?;
        Ok(raw.iter().filter_map(parse_kline_row).collect())
    }

    async fn fetch_book_ticker(&self, symbol: &str) -> anyhow::Result<BookTicker> {
        let url = format!("{}/api/v3/ticker/bookTicker", self.rest_url);
        let raw: RawBookTicker = self
            .get_json(&url, &[("symbol", symbol.to_string())])
            .await?;
        Ok(BookTicker {
            bid_price: raw.bid_price,
            ask_price: raw.ask_price,
        })
    }

    async fn fetch_order_book(
        &self,
        symbol: &str,
        limit: u32,
    ) -> anyhow::Result<OrderBookSnapshot> {
        let url = format!("{}/api/v3/depth", self.rest_url);
        let raw: RawDepth = self
            .get_json(
                &url,
                &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(OrderBookSnapshot {
            bids: raw.bids,
            asks: raw.asks,
        })
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> anyhow::Result<Option<Decimal>> {
        let url = format!("{}/fapi/v1/premiumIndex", self.futures_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;

        // Spot-only symbols have no perpetual
        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Funding rate error: {} - {}", status, body);
        }

        let raw: RawPremiumIndex = response.json().await?;
        Ok(Some(raw.last_funding_rate * Decimal::ONE_HUNDRED))
    }
}

#[async_trait]
impl ExecutionApi for BinanceRest {
    async fn account_info(&self) -> anyhow::Result<AccountInfo> {
        let raw: RawAccount = self
            .signed_request(reqwest::Method::GET, "/api/v3/account", &[])
            .await?;
        Ok(AccountInfo {
            balances: raw.balances.into_iter().map(|b| (b.asset, b.free)).collect(),
        })
    }

    async fn exchange_info(&self) -> anyhow::Result<HashMap<String, SymbolFilters>> {
        let url = format!("{}/api/v3/exchangeInfo", self.execution_url);
        let raw: RawExchangeInfo = self.get_json(&url, &[]).await?;
        Ok(raw
            .symbols
            .into_iter()
            .filter_map(|s| parse_symbol_filters(&s.filters).map(|f| (s.symbol, f)))
            .collect())
    }

    async fn create_order(&self, order: OrderRequest) -> anyhow::Result<OrderFill> {
        tracing::info!(
            symbol = %order.symbol,
            side = order.side.as_str(),
            quantity = %order.quantity,
            "Submitting order"
        );
        let params = [
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", order.order_type.as_str().to_string()),
            ("quantity", order.quantity.normalize().to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        self.signed_request(reqwest::Method::POST, "/api/v3/order", &params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sign_reference_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_parse_kline_row() {
        let row: serde_json::Value = serde_json::from_str(
            r#"[1499040000000,"0.01634790","0.80000000","0.01575800","0.01577100","148976.11427815",1499644799999,"2434.19055334",308,"1756.87402397","28.46694368","0"]"#,
        )
        .unwrap();
        let candle = parse_kline_row(&row).unwrap();
        assert_eq!(candle.open_time, 1499040000000);
        assert_eq!(candle.close_time, 1499644799999);
        assert_eq!(candle.high, 0.8);
        assert_eq!(candle.volume, 148976.11427815);
    }

    #[test]
    fn test_parse_kline_row_malformed() {
        let row: serde_json::Value = serde_json::from_str(r#"[1, "x"]"#).unwrap();
        assert!(parse_kline_row(&row).is_none());
        let row: serde_json::Value =
            serde_json::from_str(r#"[1,"a","1","1","1","1",2]"#).unwrap();
        assert!(parse_kline_row(&row).is_none());
    }

    #[test]
    fn test_parse_symbol_filters() {
        let filters: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"filterType":"PRICE_FILTER","tickSize":"0.01"},
                {"filterType":"LOT_SIZE","minQty":"0.00001","maxQty":"9000","stepSize":"0.00001"},
                {"filterType":"NOTIONAL","minNotional":"5.00000000"}
            ]"#,
        )
        .unwrap();
        let parsed = parse_symbol_filters(&filters).unwrap();
        assert_eq!(parsed.step_size, dec!(0.00001));
        assert_eq!(parsed.min_notional, dec!(5));
    }

    #[test]
    fn test_parse_symbol_filters_without_lot_size() {
        let filters: Vec<serde_json::Value> =
            serde_json::from_str(r#"[{"filterType":"NOTIONAL","minNotional":"5"}]"#).unwrap();
        assert!(parse_symbol_filters(&filters).is_none());
    }

    #[test]
    fn test_signed_query_requires_secret() {
        let config: ExchangeConfig = toml::from_str(r#"mode = "virtual""#).unwrap();
        let client = BinanceRest::new(&config).unwrap();
        assert!(client.signed_query(&[]).is_err());
    }
}
