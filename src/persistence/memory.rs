//! In-memory store

use super::{StateStore, StoreError};
use crate::trading::Position;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Volatile store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    scalars: RwLock<HashMap<String, serde_json::Value>>,
    trades: RwLock<HashMap<Uuid, Position>>,
    prices: RwLock<HashMap<String, Decimal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_scalar(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.scalars.read().await.get(key).cloned())
    }

    async fn set_scalar(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.scalars.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn insert_trade(&self, position: &Position) -> Result<(), StoreError> {
        let mut trades = self.trades.write().await;
        if trades.contains_key(&position.id) {
            return Err(StoreError::Duplicate(position.id));
        }
        trades.insert(position.id, position.clone());
        Ok(())
    }

    async fn update_trade(&self, position: &Position) -> Result<(), StoreError> {
        let mut trades = self.trades.write().await;
        match trades.get_mut(&position.id) {
            Some(existing) => {
                *existing = position.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(position.id)),
        }
    }

    async fn load_trades(&self) -> Result<Vec<Position>, StoreError> {
        let mut trades: Vec<Position> = self.trades.read().await.values().cloned().collect();
        trades.sort_by_key(|p| p.opened_at);
        Ok(trades)
    }

    async fn set_last_price(&self, symbol: &str, price: Decimal) -> Result<(), StoreError> {
        self.prices.write().await.insert(symbol.to_string(), price);
        Ok(())
    }

    async fn load_last_prices(&self) -> Result<HashMap<String, Decimal>, StoreError> {
        Ok(self.prices.read().await.clone())
    }
}
