//! Status command implementation

use crate::config::Config;
use crate::persistence::open_store;
use crate::state::BotState;
use chrono::Utc;

/// Print persisted balance, breaker state and open positions
pub async fn show_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.persistence)?;
    let mut state = BotState::new(
        config.trading.clone(),
        config.profiles.clone(),
        config.exchange.mode,
        config.breaker.btc_drop_window_minutes,
        Utc::now(),
    );
    state.restore(store.as_ref()).await?;

    println!("hotlist-trader status");
    println!("  Mode: {:?}", config.exchange.mode);
    println!("  Balance: {}", state.balance.round_dp(2));
    println!("  Daily PnL: {}", state.daily_pnl.round_dp(2));
    println!("  Circuit breaker: {}", state.breaker_status);
    println!(
        "  Streak: {} wins / {} losses",
        state.consecutive_wins, state.consecutive_losses
    );
    println!("  Closed trades: {}", state.history.len());
    println!("  Open positions: {}", state.positions.len());
    for p in &state.positions {
        let last = state
            .last_prices
            .get(&p.symbol)
            .map(|price| price.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {:<12} qty {} entry {} stop {} tp {} last {}",
            p.symbol, p.quantity, p.entry_price, p.stop_loss, p.take_profit, last
        );
    }
    Ok(())
}
