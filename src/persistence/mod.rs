//! Persistence collaborator
//!
//! A scalar key/value table, a trade table keyed by position id and a
//! last-price cache. Only single-row atomicity is assumed.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::{PersistenceConfig, StoreBackend};
use crate::trading::Position;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Scalar keys written by the bot
pub mod keys {
    pub const BALANCE: &str = "balance";
    pub const BREAKER_STATUS: &str = "circuit_breaker_status";
    pub const DAY_START_BALANCE: &str = "day_start_balance";
    pub const DAILY_PNL: &str = "daily_pnl";
    pub const CONSECUTIVE_WINS: &str = "consecutive_wins";
    pub const CONSECUTIVE_LOSSES: &str = "consecutive_losses";
    pub const CURRENT_DAY: &str = "current_day";
    pub const COOLDOWNS: &str = "cooldowns";
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Trade {0} already exists")]
    Duplicate(Uuid),
    #[error("Trade {0} not found")]
    NotFound(Uuid),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// State store contract
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_scalar(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    async fn set_scalar(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
    async fn insert_trade(&self, position: &Position) -> Result<(), StoreError>;
    async fn update_trade(&self, position: &Position) -> Result<(), StoreError>;
    async fn load_trades(&self) -> Result<Vec<Position>, StoreError>;
    async fn set_last_price(&self, symbol: &str, price: Decimal) -> Result<(), StoreError>;
    async fn load_last_prices(&self) -> Result<HashMap<String, Decimal>, StoreError>;
}

/// Open the configured backend
pub fn open_store(config: &PersistenceConfig) -> anyhow::Result<Arc<dyn StateStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Json => Ok(Arc::new(JsonFileStore::open(&config.path)?)),
    }
}
