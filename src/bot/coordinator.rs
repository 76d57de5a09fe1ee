//! Coordinator event loop: feed events, analyzer outputs and timers

use crate::analyzer::{AnalyzerOutputs, HotlistChange, HydrationRequest, RealtimeAnalyzer};
use crate::config::Config;
use crate::discovery::{PairDiscovery, ScannedPair};
use crate::events::{BotEvent, EventBus, LogLevel};
use crate::exchange::{ExecutionApi, MarketDataApi};
use crate::feed::{FeedEvent, MarketFeed, StreamCommand};
use crate::market::{Candle, Interval, MarketEvent};
use crate::persistence::StateStore;
use crate::sentiment::{SentimentReading, SentimentSource};
use crate::state::BotState;
use crate::stream::{desired_streams, SubscriptionManager};
use crate::telemetry::{set_gauge, GaugeMetric};
use crate::trading::{EngineDeps, OpenOutcome, TradeCandidate, TradingEngine};
use anyhow::Context;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Position management cadence
const TICK_INTERVAL: Duration = Duration::from_secs(1);

type HydrationResult = (HydrationRequest, anyhow::Result<Vec<Candle>>);

/// External collaborators
pub struct BotDeps {
    pub market: Arc<dyn MarketDataApi>,
    pub execution: Option<Arc<dyn ExecutionApi>>,
    pub feed: Arc<dyn MarketFeed>,
    pub store: Arc<dyn StateStore>,
    pub sentiment: Option<Arc<dyn SentimentSource>>,
    pub events: EventBus,
}

pub struct Bot {
    config: Config,
    state: BotState,
    analyzer: RealtimeAnalyzer,
    outputs: Option<AnalyzerOutputs>,
    engine: TradingEngine,
    subscriptions: SubscriptionManager,
    market: Arc<dyn MarketDataApi>,
    feed: Arc<dyn MarketFeed>,
    store: Arc<dyn StateStore>,
    sentiment: Option<Arc<dyn SentimentSource>>,
    events: EventBus,
}

impl Bot {
    pub fn new(config: Config, deps: BotDeps) -> Self {
        let mode = config.exchange.mode;
        let state = BotState::new(
            config.trading.clone(),
            config.profiles.clone(),
            mode,
            config.breaker.btc_drop_window_minutes,
            Utc::now(),
        );
        let (analyzer, outputs) = RealtimeAnalyzer::new(config.analyzer.clone(), deps.events.clone());
        let engine = TradingEngine::new(
            mode,
            EngineDeps {
                market: Arc::clone(&deps.market),
                execution: deps.execution,
                store: Arc::clone(&deps.store),
                events: deps.events.clone(),
            },
            config.breaker.clone(),
            config.stream.btc_symbol.clone(),
        );

        Self {
            config,
            state,
            analyzer,
            outputs: Some(outputs),
            engine,
            subscriptions: SubscriptionManager::new(),
            market: deps.market,
            feed: deps.feed,
            store: deps.store,
            sentiment: deps.sentiment,
            events: deps.events,
        }
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the event loop until `shutdown` resolves or the feed stops
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        let AnalyzerOutputs {
            hotlist: mut hotlist_rx,
            candidates: mut candidate_rx,
            hydration: mut hydration_rx,
        } = self.outputs.take().context("Bot already started")?;

        self.startup().await?;

        let (mut feed_rx, cmd_tx) = self.feed.start().await.context("Failed to start market feed")?;
        let (scan_tx, mut scan_rx) = mpsc::channel::<Vec<ScannedPair>>(4);
        let (sentiment_tx, mut sentiment_rx) = mpsc::channel::<SentimentReading>(4);
        let (hydrated_tx, mut hydrated_rx) = mpsc::unbounded_channel::<HydrationResult>();

        let mut tasks = vec![self.spawn_discovery(scan_tx)];
        tasks.extend(self.spawn_sentiment(sentiment_tx));

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut resync =
            tokio::time::interval(Duration::from_secs(self.config.stream.resync_interval_secs.max(1)));
        resync.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(mode = ?self.engine.mode(), balance = %self.state.balance, "Bot started");
        self.events
            .log(LogLevel::Info, format!("Bot started in {:?} mode", self.engine.mode()));

        let result = loop {
            let batch_deadline = self.analyzer.batch_deadline();

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break Ok(());
                }

                event = feed_rx.recv() => match event {
                    Some(FeedEvent::Disconnected) | None => {
                        break Err(anyhow::anyhow!("Market feed stopped"));
                    }
                    Some(event) => self.on_feed_event(event, &cmd_tx).await,
                },

                Some(change) = hotlist_rx.recv() => {
                    self.on_hotlist_change(&change);
                    self.sync_subscriptions(&cmd_tx).await;
                }

                Some(candidate) = candidate_rx.recv() => {
                    self.on_candidate(candidate).await;
                    self.sync_subscriptions(&cmd_tx).await;
                }

                Some(request) = hydration_rx.recv() => {
                    self.spawn_hydration(request, hydrated_tx.clone());
                }

                Some((request, result)) = hydrated_rx.recv() => {
                    self.on_hydrated(request, result);
                }

                Some(pairs) = scan_rx.recv() => {
                    self.analyzer.on_scan(&mut self.state, pairs);
                    self.sync_subscriptions(&cmd_tx).await;
                }

                Some(reading) = sentiment_rx.recv() => {
                    self.on_sentiment(reading).await;
                }

                _ = sleep_until_opt(batch_deadline) => {
                    self.analyzer.flush_due(&mut self.state, Instant::now(), Utc::now());
                }

                _ = tick.tick() => {
                    self.on_tick().await;
                }

                _ = resync.tick() => {
                    self.sync_subscriptions(&cmd_tx).await;
                    self.persist_prices().await;
                }
            }
        };

        for task in tasks {
            task.abort();
        }
        self.shutdown().await;
        result
    }

    async fn startup(&mut self) -> anyhow::Result<()> {
        self.state
            .restore(self.store.as_ref())
            .await
            .context("Failed to restore state")?;

        match self.engine.load_filters().await {
            Ok(count) => tracing::info!(count, "Loaded symbol filters"),
            Err(e) => tracing::warn!(error = %e, "Failed to load symbol filters, will retry per symbol"),
        }

        self.engine.evaluate_breaker(&mut self.state, Utc::now()).await;
        set_gauge(GaugeMetric::BreakerState, self.state.breaker_status.ordinal() as f64);
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.state.persist_scalars(self.store.as_ref()).await {
            tracing::error!(error = %e, "Failed to persist state on shutdown");
        }
        self.persist_prices().await;
        tracing::info!(
            balance = %self.state.balance,
            open = self.state.positions.len(),
            "Bot stopped"
        );
    }

    fn spawn_discovery(&self, tx: mpsc::Sender<Vec<ScannedPair>>) -> JoinHandle<()> {
        let mut discovery = PairDiscovery::new(self.config.discovery.clone());
        let market = Arc::clone(&self.market);
        let period = Duration::from_secs(self.config.discovery.interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match discovery.scan(market.as_ref(), Utc::now()).await {
                    Ok(pairs) => {
                        if tx.send(pairs).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Discovery scan failed"),
                }
            }
        })
    }

    fn spawn_sentiment(&self, tx: mpsc::Sender<SentimentReading>) -> Option<JoinHandle<()>> {
        if !self.config.sentiment.enabled {
            return None;
        }
        let source = Arc::clone(self.sentiment.as_ref()?);
        let period = Duration::from_secs(self.config.sentiment.poll_interval_secs.max(1));

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match source.fetch().await {
                    Ok(reading) => {
                        if tx.send(reading).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Sentiment fetch failed"),
                }
            }
        }))
    }

    fn spawn_hydration(&self, request: HydrationRequest, tx: mpsc::UnboundedSender<HydrationResult>) {
        let market = Arc::clone(&self.market);
        tokio::spawn(async move {
            let limit = request.interval.hydration_limit();
            let result = market
                .fetch_klines(&request.symbol, request.interval, limit)
                .await;
            let _ = tx.send((request, result));
        });
    }

    async fn on_feed_event(&mut self, event: FeedEvent, cmd_tx: &mpsc::Sender<StreamCommand>) {
        match event {
            FeedEvent::Connected => {
                let desired = desired_streams(&self.state, &self.config.stream.btc_symbol);
                let commands = self.subscriptions.on_connected(&desired);
                send_commands(cmd_tx, commands).await;
            }
            FeedEvent::Reconnecting { attempt } => {
                tracing::debug!(attempt, "Feed reconnecting, subscriptions dropped");
                self.subscriptions.on_disconnected();
            }
            FeedEvent::Disconnected => {}
            FeedEvent::Market(MarketEvent::Ticker(ticker)) => {
                self.analyzer.on_ticker(&mut self.state, &ticker);
            }
            FeedEvent::Market(MarketEvent::Kline {
                symbol,
                interval,
                candle,
                is_final,
            }) => self.on_kline(&symbol, interval, candle, is_final).await,
        }
    }

    async fn on_kline(&mut self, symbol: &str, interval: Interval, candle: Candle, is_final: bool) {
        let now = Utc::now();

        if is_final && interval == Interval::M1 && symbol == self.config.stream.btc_symbol {
            self.state
                .btc_monitor
                .record(candle.close_datetime(), candle.close);
            self.engine.evaluate_breaker(&mut self.state, now).await;
        }

        self.analyzer
            .on_kline(&mut self.state, symbol, interval, candle, is_final, now, Instant::now());

        if is_final && interval == Interval::M5 && self.state.has_position(symbol) {
            if let Err(e) = self
                .engine
                .try_scale_in(&mut self.state, symbol, &candle, now)
                .await
            {
                tracing::warn!(symbol, error = %e, "Scale-in failed");
            }
        }
    }

    fn on_hotlist_change(&self, change: &HotlistChange) {
        let verb = if change.admitted { "joined" } else { "left" };
        self.events
            .log(LogLevel::Info, format!("{} {} the hotlist", change.symbol, verb));
    }

    async fn on_candidate(&mut self, candidate: TradeCandidate) {
        let now = Utc::now();
        match self
            .engine
            .try_open(&mut self.state, self.analyzer.klines(), &candidate, now)
            .await
        {
            Ok(OpenOutcome::Opened(id)) => {
                tracing::debug!(symbol = %candidate.symbol, %id, "Candidate opened");
            }
            Ok(OpenOutcome::Rejected(reason)) => {
                tracing::debug!(symbol = %candidate.symbol, %reason, "Candidate rejected");
            }
            Err(e) => {
                tracing::error!(symbol = %candidate.symbol, error = %e, "Failed to open position");
                self.events.log(
                    LogLevel::Error,
                    format!("{} entry failed: {}", candidate.symbol, e),
                );
            }
        }
    }

    fn on_hydrated(&mut self, request: HydrationRequest, result: anyhow::Result<Vec<Candle>>) {
        match result {
            Ok(candles) => self.analyzer.apply_hydration(
                &mut self.state,
                &request.symbol,
                request.interval,
                candles,
                Utc::now(),
            ),
            Err(e) => {
                tracing::warn!(
                    symbol = %request.symbol,
                    interval = %request.interval,
                    error = %e,
                    "History fetch failed"
                );
                self.analyzer
                    .hydration_failed(&request.symbol, request.interval);
            }
        }
    }

    async fn on_sentiment(&mut self, reading: SentimentReading) {
        tracing::info!(value = reading.value, classification = %reading.classification, "Fear & Greed update");
        self.events.publish(BotEvent::FearAndGreedUpdate {
            value: reading.value,
            classification: reading.classification.clone(),
        });
        self.state.sentiment = Some(reading);
        self.engine.evaluate_breaker(&mut self.state, Utc::now()).await;
    }

    async fn on_tick(&mut self) {
        let now = Utc::now();
        self.engine
            .tick(&mut self.state, self.analyzer.klines(), now)
            .await;
        self.analyzer.expire_pending(&mut self.state, now);

        set_gauge(GaugeMetric::Balance, self.state.balance.to_f64().unwrap_or_default());
        set_gauge(GaugeMetric::DailyPnl, self.state.daily_pnl.to_f64().unwrap_or_default());
        set_gauge(GaugeMetric::OpenPositions, self.state.positions.len() as f64);
    }

    async fn sync_subscriptions(&mut self, cmd_tx: &mpsc::Sender<StreamCommand>) {
        let desired = desired_streams(&self.state, &self.config.stream.btc_symbol);
        let commands = self.subscriptions.sync(&desired);
        send_commands(cmd_tx, commands).await;
    }

    async fn persist_prices(&self) {
        for symbol in self.state.open_symbols() {
            let Some(price) = self.state.last_prices.get(&symbol) else {
                continue;
            };
            if let Err(e) = self.store.set_last_price(&symbol, *price).await {
                tracing::warn!(%symbol, error = %e, "Failed to persist last price");
            }
        }
    }
}

async fn send_commands(cmd_tx: &mpsc::Sender<StreamCommand>, commands: Vec<StreamCommand>) {
    for command in commands {
        if cmd_tx.send(command).await.is_err() {
            tracing::warn!("Feed command channel closed");
            return;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
