//! Trading settings and named override profiles
//!
//! The base settings are immutable once loaded. Profiles are sparse
//! overlays merged on top of the base by [`apply_profile`]; the market
//! regime picks the profile through [`select_profile`]. The merged result is
//! frozen into each position at entry.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Trading parameters. Percentages are expressed in percent (2.0 = 2%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    /// Starting balance for virtual trading
    pub initial_balance: Decimal,
    /// Maximum concurrently open positions
    pub max_open_positions: usize,

    // --- sizing ---
    pub position_size_pct: Decimal,
    /// Use the strong-buy percentage for high-conviction signals
    pub use_dynamic_sizing: bool,
    pub strong_buy_position_size_pct: Decimal,
    /// Hotlist score at or above which a signal counts as strong buy
    pub strong_buy_hotlist_score: f64,
    /// Sizing multiplier for super-bull signals
    pub super_bull_size_multiplier: Decimal,
    /// Sizing multiplier for plain ignition signals
    pub ignition_size_multiplier: Decimal,
    /// Per-loss sizing decay (`decay ^ consecutive_losses`)
    pub loss_streak_size_decay: Decimal,
    /// Venue minimum notional used when no exchange filter is known
    pub default_min_notional: Decimal,
    /// Round-trip fee estimate per side
    pub fee_pct: Decimal,

    // --- stops and targets ---
    pub use_atr_stop: bool,
    /// ATR(7) multiple for the initial stop
    pub atr_multiplier: Decimal,
    /// Fixed stop distance when ATR stops are disabled
    pub stop_loss_pct: Decimal,
    pub risk_reward_ratio: Decimal,

    // --- scaling in ---
    pub scaling_in_enabled: bool,
    /// Comma separated chunk percentages, e.g. "50,50"
    pub scaling_in_percents: String,

    // --- entry filters ---
    pub range_expansion_enabled: bool,
    /// Last 1m true range must exceed fast ATR times this factor
    pub range_expansion_factor: f64,
    pub obv_filter_enabled: bool,
    pub max_spread_pct: Decimal,
    pub max_spread_pct_ignition: Decimal,
    pub btc_regime_filter_enabled: bool,
    pub funding_filter_enabled: bool,
    pub max_funding_rate_pct: Decimal,
    pub min_liquidity_usd: Decimal,
    pub min_liquidity_usd_ignition: Decimal,
    pub sector_filter_enabled: bool,
    /// Symbol to sector map for the correlation filter
    pub sectors: HashMap<String, String>,
    /// Maximum open positions outside BTC/ETH
    pub max_correlated_trades: usize,
    pub max_rsi_1h: f64,
    pub parabolic_lookback_minutes: usize,
    pub max_parabolic_move_pct: f64,
    /// Base cooldown after a close
    pub cooldown_hours: f64,

    // --- position management ---
    pub flash_trailing_enabled: bool,
    /// PnL% that arms breakeven on ignition positions
    pub flash_breakeven_pct: Decimal,
    /// Trail distance below the high for ignition positions
    pub flash_trailing_pct: Decimal,
    pub partial_tp_enabled: bool,
    pub partial_tp_trigger_pct: Decimal,
    /// Share of the target quantity sold at each partial take-profit
    pub partial_tp_sell_pct: Decimal,
    pub auto_breakeven_enabled: bool,
    pub breakeven_trigger_r: Decimal,
    /// Move breakeven above entry to cover round-trip fees
    pub breakeven_fee_offset: bool,
    pub trailing_stop_enabled: bool,
    pub trailing_atr_multiplier: Decimal,
    /// R multiple after which the trailing multiplier tightens
    pub trailing_tighten_r: Decimal,
    pub trailing_tight_multiplier: Decimal,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            initial_balance: dec!(10000),
            max_open_positions: 3,
            position_size_pct: dec!(2),
            use_dynamic_sizing: true,
            strong_buy_position_size_pct: dec!(3),
            strong_buy_hotlist_score: 8.0,
            super_bull_size_multiplier: dec!(1.2),
            ignition_size_multiplier: dec!(0.75),
            loss_streak_size_decay: dec!(0.75),
            default_min_notional: dec!(5),
            fee_pct: dec!(0.1),
            use_atr_stop: true,
            atr_multiplier: dec!(1.5),
            stop_loss_pct: dec!(2),
            risk_reward_ratio: dec!(2),
            scaling_in_enabled: false,
            scaling_in_percents: "50,50".to_string(),
            range_expansion_enabled: true,
            range_expansion_factor: 1.2,
            obv_filter_enabled: true,
            max_spread_pct: dec!(0.1),
            max_spread_pct_ignition: dec!(0.3),
            btc_regime_filter_enabled: true,
            funding_filter_enabled: true,
            max_funding_rate_pct: dec!(0.05),
            min_liquidity_usd: dec!(50000),
            min_liquidity_usd_ignition: dec!(20000),
            sector_filter_enabled: true,
            sectors: HashMap::new(),
            max_correlated_trades: 2,
            max_rsi_1h: 75.0,
            parabolic_lookback_minutes: 15,
            max_parabolic_move_pct: 8.0,
            cooldown_hours: 4.0,
            flash_trailing_enabled: true,
            flash_breakeven_pct: dec!(0.5),
            flash_trailing_pct: dec!(0.8),
            partial_tp_enabled: true,
            partial_tp_trigger_pct: dec!(0.8),
            partial_tp_sell_pct: dec!(50),
            auto_breakeven_enabled: true,
            breakeven_trigger_r: dec!(1),
            breakeven_fee_offset: true,
            trailing_stop_enabled: true,
            trailing_atr_multiplier: dec!(2),
            trailing_tighten_r: dec!(2),
            trailing_tight_multiplier: dec!(1),
        }
    }
}

impl TradingSettings {
    /// Parse the scaling-in chunk list into fractions of the target quantity.
    ///
    /// Returns `None` when the list is empty or contains a non-positive or
    /// unparsable entry.
    pub fn scaling_in_fractions(&self) -> Option<Vec<Decimal>> {
        let mut fractions = Vec::new();
        for part in self.scaling_in_percents.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let pct: Decimal = part.parse().ok()?;
            if pct <= Decimal::ZERO {
                return None;
            }
            fractions.push(pct / dec!(100));
        }
        if fractions.is_empty() {
            None
        } else {
            Some(fractions)
        }
    }
}

/// Named override profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    /// Directional market (high ADX)
    Trending,
    /// Sideways market
    Ranging,
    /// High ATR% market
    Volatile,
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileName::Trending => "trending",
            ProfileName::Ranging => "ranging",
            ProfileName::Volatile => "volatile",
        };
        f.write_str(name)
    }
}

/// Sparse settings overlay; keys are `TradingSettings` field names
pub type SettingsOverride = toml::Table;

/// Profile selection and overlays
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    /// Pick a profile from the market regime at entry
    #[serde(default)]
    pub auto_select: bool,
    /// ATR% of price at or above which the market counts as volatile
    #[serde(default = "default_volatile_atr_pct")]
    pub volatile_atr_pct: f64,
    /// ADX at or above which the market counts as trending
    #[serde(default = "default_trending_adx")]
    pub trending_adx: f64,
    /// Overlays per profile
    #[serde(default)]
    pub overrides: HashMap<ProfileName, SettingsOverride>,
}

fn default_volatile_atr_pct() -> f64 {
    5.0
}
fn default_trending_adx() -> f64 {
    25.0
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            auto_select: false,
            volatile_atr_pct: default_volatile_atr_pct(),
            trending_adx: default_trending_adx(),
            overrides: HashMap::new(),
        }
    }
}

impl ProfilesConfig {
    /// Check that every overlay merges cleanly onto `base`
    pub fn validate(&self, base: &TradingSettings) -> anyhow::Result<()> {
        for (name, overlay) in &self.overrides {
            apply_profile(base, overlay)
                .map_err(|e| anyhow::anyhow!("Invalid profile '{}': {}", name, e))?;
        }
        Ok(())
    }

    /// Settings to freeze into a new position given the entry regime
    pub fn effective_settings(
        &self,
        base: &TradingSettings,
        regime: Option<MarketRegime>,
    ) -> anyhow::Result<(TradingSettings, Option<ProfileName>)> {
        if !self.auto_select {
            return Ok((base.clone(), None));
        }
        let Some(regime) = regime else {
            return Ok((base.clone(), None));
        };
        let name = select_profile(&regime, self.trending_adx, self.volatile_atr_pct);
        match self.overrides.get(&name) {
            Some(overlay) => Ok((apply_profile(base, overlay)?, Some(name))),
            None => Ok((base.clone(), Some(name))),
        }
    }
}

/// Market regime inputs for profile selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketRegime {
    pub adx: f64,
    pub atr_pct: f64,
}

/// Map a market regime to a profile name
pub fn select_profile(regime: &MarketRegime, trending_adx: f64, volatile_atr_pct: f64) -> ProfileName {
    if regime.atr_pct >= volatile_atr_pct {
        ProfileName::Volatile
    } else if regime.adx >= trending_adx {
        ProfileName::Trending
    } else {
        ProfileName::Ranging
    }
}

/// Merge an overlay onto the base settings without touching the base.
///
/// Unknown keys are rejected so typos in profile tables fail at load time.
pub fn apply_profile(
    base: &TradingSettings,
    overlay: &SettingsOverride,
) -> anyhow::Result<TradingSettings> {
    let mut merged = serde_json::to_value(base)?;
    let fields = merged
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Settings did not serialize to an object"))?;

    for (key, value) in overlay {
        if !fields.contains_key(key) {
            anyhow::bail!("Unknown setting '{}'", key);
        }
        fields.insert(key.clone(), serde_json::to_value(value)?);
    }

    Ok(serde_json::from_value(merged)?)
}
