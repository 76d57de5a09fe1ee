//! hotlist-trader: Multi-timeframe momentum bot for spot crypto markets
//!
//! This library provides the core components for:
//! - Pair discovery with a 4h macro trend score
//! - A realtime hotlist driven by closed 15m, 1m and 5m candles
//! - Live stream subscriptions limited to relevant symbols
//! - Entry gating, sizing, scale-in, stops and partial exits
//! - A layered circuit breaker with BTC crash liquidation
//! - Virtual, paper and live execution
//! - JSON or in-memory persistence
//! - Logging and Prometheus metrics

pub mod analyzer;
pub mod bot;
pub mod breaker;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod events;
pub mod exchange;
pub mod feed;
pub mod indicators;
pub mod market;
pub mod persistence;
pub mod sentiment;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod trading;
pub mod ws;
