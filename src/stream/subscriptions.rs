//! Desired stream set and subscription diffing

use crate::feed::StreamCommand;
use crate::market::{Interval, StreamId};
use crate::state::BotState;
use crate::telemetry::{set_gauge, GaugeMetric};
use std::collections::BTreeSet;

/// Streams the current state needs
pub fn desired_streams(state: &BotState, btc_symbol: &str) -> BTreeSet<StreamId> {
    let mut desired = BTreeSet::new();

    for symbol in state.scanner.keys() {
        desired.insert(StreamId::ticker(symbol.as_str()));
        desired.insert(StreamId::kline(symbol.as_str(), Interval::M15));
    }
    for position in &state.positions {
        desired.insert(StreamId::ticker(position.symbol.as_str()));
    }
    for symbol in &state.hotlist {
        desired.insert(StreamId::kline(symbol.as_str(), Interval::M1));
        desired.insert(StreamId::kline(symbol.as_str(), Interval::M5));
    }
    desired.insert(StreamId::kline(btc_symbol, Interval::M1));

    desired
}

/// Tracks what the feed is subscribed to and emits the deltas
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    subscribed: BTreeSet<StreamId>,
    connected: bool,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribed(&self) -> &BTreeSet<StreamId> {
        &self.subscribed
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Diff against the desired set: at most one unsubscribe batch and one
    /// subscribe batch. Nothing is sent while disconnected; the reconnect
    /// restores the full set.
    pub fn sync(&mut self, desired: &BTreeSet<StreamId>) -> Vec<StreamCommand> {
        if !self.connected {
            return Vec::new();
        }

        let removed: Vec<StreamId> = self.subscribed.difference(desired).cloned().collect();
        let added: Vec<StreamId> = desired.difference(&self.subscribed).cloned().collect();

        let mut commands = Vec::with_capacity(2);
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "Unsubscribing streams");
            commands.push(StreamCommand::Unsubscribe(removed));
        }
        if !added.is_empty() {
            tracing::debug!(count = added.len(), "Subscribing streams");
            commands.push(StreamCommand::Subscribe(added));
        }

        self.subscribed = desired.clone();
        set_gauge(GaugeMetric::Subscriptions, self.subscribed.len() as f64);
        commands
    }

    /// Link dropped; the venue forgets every subscription
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.subscribed.clear();
        set_gauge(GaugeMetric::Subscriptions, 0.0);
    }

    /// Link (re)established: resubscribe the full desired set
    pub fn on_connected(&mut self, desired: &BTreeSet<StreamId>) -> Vec<StreamCommand> {
        self.connected = true;
        self.subscribed.clear();
        let commands = self.sync(desired);
        tracing::info!(streams = self.subscribed.len(), "Subscriptions restored");
        commands
    }
}
