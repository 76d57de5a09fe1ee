//! Run command implementation

use crate::bot::{Bot, BotDeps};
use crate::breaker::CircuitBreakerStatus;
use crate::config::Config;
use crate::events::EventBus;
use crate::exchange::{BinanceRest, ExecutionApi, MarketDataApi};
use crate::feed::{BinanceFeed, MarketFeed};
use crate::persistence::{keys, open_store};
use crate::sentiment::{FearGreedClient, SentimentSource};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Clear a persisted circuit breaker halt before starting
    #[arg(long)]
    pub reset_breaker: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        config.require_credentials()?;

        let events = EventBus::default();
        let rest = Arc::new(BinanceRest::new(&config.exchange)?);
        let market: Arc<dyn MarketDataApi> = rest.clone();
        let execution: Option<Arc<dyn ExecutionApi>> = if config.exchange.mode.places_orders() {
            Some(rest)
        } else {
            None
        };
        let feed: Arc<dyn MarketFeed> = Arc::new(BinanceFeed::new(
            config.exchange.ws_url.clone(),
            Duration::from_millis(config.stream.base_backoff_ms),
            Duration::from_millis(config.stream.max_backoff_ms),
        ));
        let sentiment: Option<Arc<dyn SentimentSource>> = if config.sentiment.enabled {
            Some(Arc::new(FearGreedClient::new(&config.sentiment)?))
        } else {
            None
        };
        let store = open_store(&config.persistence)?;

        if self.reset_breaker {
            store
                .set_scalar(
                    keys::BREAKER_STATUS,
                    serde_json::to_value(CircuitBreakerStatus::None)?,
                )
                .await?;
            tracing::warn!("Circuit breaker reset by operator");
        }

        let bot = Bot::new(
            config,
            BotDeps {
                market,
                execution,
                feed,
                store,
                sentiment,
                events,
            },
        );
        bot.run().await
    }
}
