//! End-to-end tests driving the coordinator through a scripted feed

mod common;

use async_trait::async_trait;
use common::{now, MockMarket};
use hotlist_trader::bot::{Bot, BotDeps};
use hotlist_trader::config::{Config, StoreBackend};
use hotlist_trader::discovery::StrategyType;
use hotlist_trader::events::EventBus;
use hotlist_trader::feed::{FeedEvent, MarketFeed, StreamCommand};
use hotlist_trader::market::{Interval, StreamId};
use hotlist_trader::persistence::{MemoryStore, StateStore};
use hotlist_trader::trading::{NewPosition, Position, TradingSettings};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

type FeedChannels = (mpsc::Receiver<FeedEvent>, mpsc::Sender<StreamCommand>);

/// Feed handing out channels prepared by the test
struct ScriptedFeed {
    channels: Mutex<Option<FeedChannels>>,
}

#[async_trait]
impl MarketFeed for ScriptedFeed {
    async fn start(&self) -> anyhow::Result<FeedChannels> {
        self.channels
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("feed already started"))
    }
}

struct Running {
    events: mpsc::Sender<FeedEvent>,
    commands: mpsc::Receiver<StreamCommand>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    shutdown: oneshot::Sender<()>,
}

fn test_config() -> Config {
    let mut config = Config::parse(include_str!("../../config.toml.example")).unwrap();
    config.persistence.backend = StoreBackend::Memory;
    config.sentiment.enabled = false;
    config.telemetry.metrics_port = 0;
    config
}

fn start_bot(store: Arc<dyn StateStore>) -> Running {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let feed = ScriptedFeed {
        channels: Mutex::new(Some((event_rx, cmd_tx))),
    };

    let bot = Bot::new(
        test_config(),
        BotDeps {
            market: Arc::new(MockMarket::new()),
            execution: None,
            feed: Arc::new(feed),
            store,
            sentiment: None,
            events: EventBus::default(),
        },
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(bot.run_until(async move {
        let _ = shutdown_rx.await;
    }));

    Running {
        events: event_tx,
        commands: cmd_rx,
        handle,
        shutdown: shutdown_tx,
    }
}

fn open_position(symbol: &str) -> Position {
    Position::open(NewPosition {
        mode: hotlist_trader::config::TradingMode::Virtual,
        symbol: symbol.to_string(),
        strategy: StrategyType::Momentum,
        fill_price: dec!(100),
        fill_quantity: dec!(2),
        target_quantity: dec!(2),
        stop_loss: dec!(98),
        take_profit: dec!(104),
        scale_in: None,
        hotlist_score: 6.0,
        settings: TradingSettings::default(),
        opened_at: now(),
    })
}

#[test]
fn test_example_config_loads() {
    let config = test_config();
    assert_eq!(config.stream.btc_symbol, "BTCUSDT");
    assert!(!config.sentiment.enabled);
    assert_eq!(config.persistence.backend, StoreBackend::Memory);
}

#[tokio::test]
async fn test_connect_subscribes_btc_and_open_positions() {
    let store = Arc::new(MemoryStore::new());
    store.insert_trade(&open_position("SOLUSDT")).await.unwrap();

    let mut bot = start_bot(store);
    bot.events.send(FeedEvent::Connected).await.unwrap();

    let command = timeout(WAIT, bot.commands.recv())
        .await
        .expect("no subscription command")
        .expect("command channel closed");
    let StreamCommand::Subscribe(streams) = command else {
        panic!("expected a subscribe, got {:?}", command);
    };
    assert!(streams.contains(&StreamId::kline("BTCUSDT", Interval::M1)));
    assert!(streams.contains(&StreamId::ticker("SOLUSDT")));

    bot.shutdown.send(()).unwrap();
    let result = timeout(WAIT, bot.handle).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_reconnect_resubscribes_everything() {
    let mut bot = start_bot(Arc::new(MemoryStore::new()));

    bot.events.send(FeedEvent::Connected).await.unwrap();
    let first = timeout(WAIT, bot.commands.recv()).await.unwrap().unwrap();

    bot.events
        .send(FeedEvent::Reconnecting { attempt: 1 })
        .await
        .unwrap();
    bot.events.send(FeedEvent::Connected).await.unwrap();
    let second = timeout(WAIT, bot.commands.recv()).await.unwrap().unwrap();

    assert!(matches!(second, StreamCommand::Subscribe(_)));
    assert_eq!(first, second);

    bot.shutdown.send(()).unwrap();
    assert!(timeout(WAIT, bot.handle).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_feed_disconnect_stops_bot_with_error() {
    let bot = start_bot(Arc::new(MemoryStore::new()));
    bot.events.send(FeedEvent::Disconnected).await.unwrap();

    let result = timeout(WAIT, bot.handle).await.unwrap().unwrap();
    assert!(result.is_err());
}
