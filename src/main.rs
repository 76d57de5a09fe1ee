use clap::Parser;
use hotlist_trader::cli::{show_status, Cli, Commands};
use hotlist_trader::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    hotlist_trader::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(mode = ?config.exchange.mode, "Starting bot");
            args.execute(config).await?;
        }
        Commands::Scan(args) => {
            args.execute(&config).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Mode: {:?}", config.exchange.mode);
            println!(
                "  Discovery: quote={} min_volume={} every {}s",
                config.discovery.quote_asset,
                config.discovery.min_quote_volume,
                config.discovery.interval_secs
            );
            println!(
                "  Analyzer: hotlist>={} mtf={} ignition={}",
                config.analyzer.hotlist_threshold,
                config.analyzer.mtf_enabled,
                config.analyzer.ignition_enabled
            );
            println!(
                "  Trading: size={}% max_positions={} balance={}",
                config.trading.position_size_pct,
                config.trading.max_open_positions,
                config.trading.initial_balance
            );
            println!(
                "  Breaker: drawdown={}% losses={} btc warn/halt={}/{}%",
                config.breaker.max_daily_drawdown_pct,
                config.breaker.consecutive_loss_limit,
                config.breaker.btc_drop_warn_pct,
                config.breaker.btc_drop_halt_pct
            );
            println!(
                "  Persistence: {:?} at {}",
                config.persistence.backend,
                config.persistence.path.display()
            );
        }
    }

    Ok(())
}
