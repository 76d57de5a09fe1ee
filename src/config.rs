//! Configuration types for hotlist-trader

use crate::telemetry::LogFormat;
use crate::trading::{ProfilesConfig, TradingSettings};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub trading: TradingSettings,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

/// Account mode
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Simulated fills at the last price, no venue calls
    #[default]
    Virtual,
    /// Venue testnet through the execution API
    Paper,
    /// Real account
    Live,
}

impl TradingMode {
    /// Orders are routed to the execution API
    pub fn places_orders(&self) -> bool {
        matches!(self, TradingMode::Paper | TradingMode::Live)
    }
}

/// Venue connectivity
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub mode: TradingMode,
    /// Spot REST base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Testnet REST base URL used in paper mode
    #[serde(default = "default_testnet_rest_url")]
    pub testnet_rest_url: String,
    /// Futures REST base URL (funding rates)
    #[serde(default = "default_futures_url")]
    pub futures_url: String,
    /// Combined-stream WebSocket URL
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_testnet_rest_url() -> String {
    "https://testnet.binance.vision".to_string()
}
fn default_futures_url() -> String {
    "https://fapi.binance.com".to_string()
}
fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/stream".to_string()
}
fn default_recv_window_ms() -> u64 {
    5000
}

impl ExchangeConfig {
    /// REST base URL for order routing in the configured mode
    pub fn execution_url(&self) -> &str {
        match self.mode {
            TradingMode::Paper => &self.testnet_rest_url,
            _ => &self.rest_url,
        }
    }

    /// Apply `BINANCE_API_KEY` / `BINANCE_API_SECRET` over the file values
    pub fn with_env_credentials(mut self) -> Self {
        if let Ok(key) = std::env::var("BINANCE_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(secret) = std::env::var("BINANCE_API_SECRET") {
            if !secret.is_empty() {
                self.api_secret = Some(secret);
            }
        }
        self
    }
}

/// Pair discovery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Quote currency of the tradable universe
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Minimum 24h quote volume
    #[serde(default = "default_min_quote_volume")]
    pub min_quote_volume: Decimal,
    /// Symbols never traded
    #[serde(default)]
    pub excluded_symbols: Vec<String>,
    /// Fiat and stable base assets excluded from the universe
    #[serde(default = "default_fiat_assets")]
    pub fiat_assets: Vec<String>,
    /// Per-symbol analysis cache TTL
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Seconds between discovery cycles
    #[serde(default = "default_scan_interval_secs")]
    pub interval_secs: u64,
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}
fn default_min_quote_volume() -> Decimal {
    Decimal::new(10_000_000, 0)
}
fn default_fiat_assets() -> Vec<String> {
    [
        "EUR", "GBP", "TRY", "BRL", "AUD", "RUB", "UAH", "NGN", "ZAR", "PLN", "RON", "ARS",
        "JPY", "MXN", "COP", "CZK", "USDC", "FDUSD", "TUSD", "BUSD", "DAI", "USDP", "EURI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_scan_interval_secs() -> u64 {
    900
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            min_quote_volume: default_min_quote_volume(),
            excluded_symbols: vec![],
            fiat_assets: default_fiat_assets(),
            cache_ttl_secs: default_cache_ttl_secs(),
            interval_secs: default_scan_interval_secs(),
        }
    }
}

/// Realtime analyzer thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Hotlist admission threshold
    pub hotlist_threshold: f64,
    /// Bollinger width (% of middle) below which the pair is in a squeeze
    pub squeeze_threshold_pct: f64,
    /// Micro-batch debounce
    pub debounce_ms: u64,
    /// Pending confirmation lifetime
    pub pending_timeout_secs: i64,
    /// Require 5m confirmation of 1m triggers
    pub mtf_enabled: bool,
    /// Admit ignition signals
    pub ignition_enabled: bool,
    /// Immediate-trade micro score when MTF is disabled
    pub immediate_threshold: u8,
    /// Immediate-trade micro score for ignition when MTF is disabled
    pub immediate_ignition_threshold: u8,
    /// Micro score that opens a pending confirmation
    pub mtf_trigger_threshold: u8,
    /// Final score needed after 5m confirmation
    pub confirm_threshold: i32,
    /// Final score needed after 5m confirmation for ignition
    pub confirm_ignition_threshold: i32,
    /// Hotlist score at or above which a signal is super-bull
    pub super_bull_score: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            hotlist_threshold: 5.0,
            squeeze_threshold_pct: 3.0,
            debounce_ms: 500,
            pending_timeout_secs: 600,
            mtf_enabled: true,
            ignition_enabled: true,
            immediate_threshold: 4,
            immediate_ignition_threshold: 3,
            mtf_trigger_threshold: 3,
            confirm_threshold: 8,
            confirm_ignition_threshold: 6,
            super_bull_score: 10.0,
        }
    }
}

/// Circuit breaker limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Daily loss (% of day-start balance) that hard-halts trading
    pub max_daily_drawdown_pct: Decimal,
    /// Consecutive losing closes that pause trading
    pub consecutive_loss_limit: u32,
    pub sentiment_filter_enabled: bool,
    /// Fear & Greed at or below this pauses trading
    pub extreme_fear: u8,
    /// Fear & Greed at or above this pauses trading
    pub extreme_greed: u8,
    /// 5-minute BTC drop (%) that raises a warning
    pub btc_drop_warn_pct: f64,
    /// 5-minute BTC drop (%) that halts and liquidates
    pub btc_drop_halt_pct: f64,
    pub btc_drop_window_minutes: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_daily_drawdown_pct: Decimal::new(3, 0),
            consecutive_loss_limit: 3,
            sentiment_filter_enabled: true,
            extreme_fear: 15,
            extreme_greed: 85,
            btc_drop_warn_pct: 1.5,
            btc_drop_halt_pct: 3.0,
            btc_drop_window_minutes: 5,
        }
    }
}

/// Live stream management
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Always-on symbol for the circuit breaker
    pub btc_symbol: String,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Periodic subscription resync
    pub resync_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            btc_symbol: "BTCUSDT".to_string(),
            base_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            resync_interval_secs: 30,
        }
    }
}

/// Fear & Greed feed
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub enabled: bool,
    pub url: String,
    pub poll_interval_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://api.alternative.me/fng/".to_string(),
            poll_interval_secs: 900,
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Nothing survives a restart
    Memory,
    /// JSON documents in `path`
    #[default]
    Json,
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: PathBuf::from("./data"),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; 0 disables the exporter
    pub metrics_port: u16,
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.exchange = config.exchange.with_env_credentials();
        config.profiles.validate(&config.trading)?;
        Ok(config)
    }

    /// Fail fast when a mode that places orders has no credentials
    pub fn require_credentials(&self) -> anyhow::Result<()> {
        if self.exchange.mode.places_orders()
            && (self.exchange.api_key.is_none() || self.exchange.api_secret.is_none())
        {
            anyhow::bail!(
                "{:?} mode requires BINANCE_API_KEY and BINANCE_API_SECRET",
                self.exchange.mode
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [exchange]
        mode = "virtual"

        [telemetry]
        metrics_port = 0
        log_level = "info"
    "#;

    #[test]
    fn test_config_minimal_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.exchange.mode, TradingMode::Virtual);
        assert_eq!(config.discovery.quote_asset, "USDT");
        assert_eq!(config.analyzer.hotlist_threshold, 5.0);
        assert_eq!(config.analyzer.debounce_ms, 500);
        assert_eq!(config.trading.max_open_positions, 3);
        assert_eq!(config.breaker.consecutive_loss_limit, 3);
        assert_eq!(config.stream.max_backoff_ms, 60_000);
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_trading_section() {
        let toml = r#"
            [exchange]
            mode = "live"
            api_key = "k"
            api_secret = "s"

            [trading]
            position_size_pct = 1.5
            max_open_positions = 5

            [trading.sectors]
            SOLUSDT = "l1"
            AVAXUSDT = "l1"

            [profiles]
            auto_select = true

            [profiles.overrides.volatile]
            atr_multiplier = 2.5

            [telemetry]
            metrics_port = 9090
            log_level = "debug"
            log_format = "json"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.exchange.mode, TradingMode::Live);
        assert_eq!(config.trading.position_size_pct, dec!(1.5));
        assert_eq!(config.trading.max_open_positions, 5);
        assert_eq!(config.trading.sectors.get("SOLUSDT").unwrap(), "l1");
        assert!(config.profiles.auto_select);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn test_config_bad_profile_rejected() {
        let toml = r#"
            [exchange]
            mode = "virtual"

            [profiles.overrides.trending]
            no_such_field = 1

            [telemetry]
            metrics_port = 0
            log_level = "info"
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(include_str!("../config.toml.example")).unwrap();
        assert_eq!(config.exchange.mode, TradingMode::Virtual);
        assert_eq!(config.trading.initial_balance, dec!(10000));
        assert_eq!(config.trading.sectors.get("ARBUSDT").unwrap(), "L2");
        assert_eq!(config.profiles.overrides.len(), 3);
        assert_eq!(config.persistence.backend, StoreBackend::Json);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_trading_mode_places_orders() {
        assert!(!TradingMode::Virtual.places_orders());
        assert!(TradingMode::Paper.places_orders());
        assert!(TradingMode::Live.places_orders());
    }

    #[test]
    fn test_execution_url_by_mode() {
        let mut config = Config::parse(MINIMAL).unwrap().exchange;
        config.mode = TradingMode::Paper;
        assert_eq!(config.execution_url(), "https://testnet.binance.vision");
        config.mode = TradingMode::Live;
        assert_eq!(config.execution_url(), "https://api.binance.com");
    }
}
