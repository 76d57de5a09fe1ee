//! Periodic macro scan of the venue universe

use super::{MacroAnalysis, ScannedPair};
use crate::config::DiscoveryConfig;
use crate::exchange::MarketDataApi;
use crate::indicators::{ema_last, macd_default, rsi_last};
use crate::market::{Candle, Interval, Ticker};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// 4h candles required for EMA200
pub const MIN_4H_CANDLES: usize = 200;
/// 1h candles required for RSI14 with warm-up
pub const MIN_1H_CANDLES: usize = 21;

/// 4h trend score in [-2, 2].
///
/// +1/-1 for close vs EMA200, +0.5/-0.5 for RSI14 above 55 / below 45,
/// +0.5/-0.5 for MACD above / below its signal.
pub fn macro_trend_score(close: f64, ema200: f64, rsi: f64, macd_bullish: Option<bool>) -> f64 {
    let mut score: f64 = 0.0;
    if close > ema200 {
        score += 1.0;
    } else if close < ema200 {
        score -= 1.0;
    }
    if rsi > 55.0 {
        score += 0.5;
    } else if rsi < 45.0 {
        score -= 0.5;
    }
    match macd_bullish {
        Some(true) => score += 0.5,
        Some(false) => score -= 0.5,
        None => {}
    }
    score.clamp(-2.0, 2.0)
}

/// Analyze 4h and 1h history. `None` when history is insufficient.
pub fn analyze_macro(
    candles_4h: &[Candle],
    candles_1h: &[Candle],
    now: DateTime<Utc>,
) -> Option<MacroAnalysis> {
    if candles_4h.len() < MIN_4H_CANDLES || candles_1h.len() < MIN_1H_CANDLES {
        return None;
    }

    let closes: Vec<f64> = candles_4h.iter().map(|c| c.close).collect();
    let close = *closes.last()?;
    let ema200 = ema_last(&closes, 200)?;
    let rsi = rsi_last(&closes, 14)?;
    let macd = macd_default(&closes).last().copied();
    let macd_bullish = macd.map(|m| m.macd > m.signal);
    let macd_flag = macd.and_then(|m| (m.macd != m.signal).then_some(m.macd > m.signal));

    let closes_1h: Vec<f64> = candles_1h.iter().map(|c| c.close).collect();
    let rsi_1h = rsi_last(&closes_1h, 14)?;

    Some(MacroAnalysis {
        trend_score: macro_trend_score(close, ema200, rsi, macd_flag),
        close,
        ema200,
        rsi,
        macd_bullish: macd_bullish.unwrap_or(false),
        rsi_1h,
        computed_at: now,
    })
}

/// Pair discovery with a per-symbol analysis cache
pub struct PairDiscovery {
    config: DiscoveryConfig,
    cache: HashMap<String, MacroAnalysis>,
}

impl PairDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Quote asset, exclusion, fiat and volume rules
    pub fn is_eligible(&self, ticker: &Ticker) -> bool {
        let Some(base) = ticker.symbol.strip_suffix(self.config.quote_asset.as_str()) else {
            return false;
        };
        if base.is_empty() {
            return false;
        }
        if self.config.excluded_symbols.iter().any(|s| s == &ticker.symbol) {
            return false;
        }
        if self.config.fiat_assets.iter().any(|f| f == base) {
            return false;
        }
        ticker.quote_volume > self.config.min_quote_volume
    }

    fn cached(&self, symbol: &str, now: DateTime<Utc>) -> Option<MacroAnalysis> {
        let ttl = Duration::seconds(self.config.cache_ttl_secs as i64);
        self.cache
            .get(symbol)
            .filter(|a| now - a.computed_at < ttl)
            .copied()
    }

    /// Number of cached analyses
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Run one scan.
    ///
    /// A ticker fetch failure propagates; per-symbol kline failures or short
    /// history skip that symbol for this cycle.
    pub async fn scan(
        &mut self,
        api: &dyn MarketDataApi,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ScannedPair>> {
        let tickers = api.fetch_tickers().await?;
        let universe: Vec<Ticker> = tickers
            .into_iter()
            .filter(|t| self.is_eligible(t))
            .collect();

        tracing::info!(candidates = universe.len(), "Discovery universe filtered");

        let mut pairs = Vec::with_capacity(universe.len());
        let mut fetched = 0usize;

        for ticker in &universe {
            let analysis = match self.cached(&ticker.symbol, now) {
                Some(hit) => hit,
                None => {
                    let Some(fresh) = self.fetch_analysis(api, &ticker.symbol, now).await else {
                        continue;
                    };
                    fetched += 1;
                    self.cache.insert(ticker.symbol.clone(), fresh);
                    fresh
                }
            };
            pairs.push(ScannedPair::new(ticker, analysis));
        }

        self.cache
            .retain(|symbol, _| universe.iter().any(|t| &t.symbol == symbol));

        tracing::info!(
            pairs = pairs.len(),
            fetched,
            cached = pairs.len() - fetched,
            "Discovery scan complete"
        );
        Ok(pairs)
    }

    async fn fetch_analysis(
        &self,
        api: &dyn MarketDataApi,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Option<MacroAnalysis> {
        let candles_4h = match api
            .fetch_klines(symbol, Interval::H4, Interval::H4.hydration_limit())
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "4h klines fetch failed, skipping");
                return None;
            }
        };
        let candles_1h = match api
            .fetch_klines(symbol, Interval::H1, Interval::H1.hydration_limit())
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "1h klines fetch failed, skipping");
                return None;
            }
        };

        let analysis = analyze_macro(&candles_4h, &candles_1h, now);
        if analysis.is_none() {
            tracing::debug!(
                symbol,
                h4 = candles_4h.len(),
                h1 = candles_1h.len(),
                "Insufficient history, skipping"
            );
        }
        analysis
    }
}
