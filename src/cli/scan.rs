//! Scan command implementation

use crate::config::Config;
use crate::discovery::PairDiscovery;
use crate::exchange::BinanceRest;
use chrono::Utc;
use clap::Args;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Print at most this many pairs
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,
}

impl ScanArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let rest = BinanceRest::new(&config.exchange)?;
        let mut discovery = PairDiscovery::new(config.discovery.clone());
        let mut pairs = discovery.scan(&rest, Utc::now()).await?;
        pairs.sort_by(|a, b| {
            b.macro_analysis
                .trend_score
                .total_cmp(&a.macro_analysis.trend_score)
                .then_with(|| b.volume.cmp(&a.volume))
        });

        println!("{} pairs in universe", pairs.len());
        println!(
            "{:<14} {:>14} {:>18} {:>8} {:>7} {:>7}",
            "SYMBOL", "PRICE", "QUOTE VOLUME", "CHG %", "4H", "RSI 1H"
        );
        for pair in pairs.iter().take(self.limit) {
            println!(
                "{:<14} {:>14} {:>18} {:>8} {:>7.2} {:>7.1}",
                pair.symbol,
                pair.price,
                pair.volume.round(),
                pair.price_change_pct.round_dp(2),
                pair.macro_analysis.trend_score,
                pair.macro_analysis.rsi_1h
            );
        }
        Ok(())
    }
}
