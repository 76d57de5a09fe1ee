//! JSON-file store
//!
//! One document per table under the data directory. Every write replaces
//! the document through a temp file and rename, and the cached table only
//! changes after the rename succeeded.

use super::{StateStore, StoreError};
use crate::trading::Position;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

const SCALARS_FILE: &str = "state.json";
const TRADES_FILE: &str = "trades.json";
const PRICES_FILE: &str = "prices.json";

#[derive(Debug, Default)]
struct Tables {
    scalars: HashMap<String, serde_json::Value>,
    trades: HashMap<Uuid, Position>,
    prices: HashMap<String, Decimal>,
}

/// Durable store backed by JSON documents
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

fn read_table<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

impl JsonFileStore {
    /// Open (creating if needed) a store in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let tables = Tables {
            scalars: read_table(&dir.join(SCALARS_FILE))?,
            trades: read_table(&dir.join(TRADES_FILE))?,
            prices: read_table(&dir.join(PRICES_FILE))?,
        };

        tracing::info!(
            path = %dir.display(),
            trades = tables.trades.len(),
            "Opened JSON state store"
        );

        Ok(Self {
            dir,
            tables: Mutex::new(tables),
        })
    }

    async fn write_table<T: Serialize>(&self, file: &str, table: &T) -> Result<(), StoreError> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        let content = serde_json::to_vec_pretty(table)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get_scalar(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.tables.lock().await.scalars.get(key).cloned())
    }

    async fn set_scalar(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.scalars.clone();
        next.insert(key.to_string(), value);
        self.write_table(SCALARS_FILE, &next).await?;
        tables.scalars = next;
        Ok(())
    }

    async fn insert_trade(&self, position: &Position) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.trades.contains_key(&position.id) {
            return Err(StoreError::Duplicate(position.id));
        }
        let mut next = tables.trades.clone();
        next.insert(position.id, position.clone());
        self.write_table(TRADES_FILE, &next).await?;
        tables.trades = next;
        Ok(())
    }

    async fn update_trade(&self, position: &Position) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.trades.contains_key(&position.id) {
            return Err(StoreError::NotFound(position.id));
        }
        let mut next = tables.trades.clone();
        next.insert(position.id, position.clone());
        self.write_table(TRADES_FILE, &next).await?;
        tables.trades = next;
        Ok(())
    }

    async fn load_trades(&self) -> Result<Vec<Position>, StoreError> {
        let mut trades: Vec<Position> = self.tables.lock().await.trades.values().cloned().collect();
        trades.sort_by_key(|p| p.opened_at);
        Ok(trades)
    }

    async fn set_last_price(&self, symbol: &str, price: Decimal) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.prices.clone();
        next.insert(symbol.to_string(), price);
        self.write_table(PRICES_FILE, &next).await?;
        tables.prices = next;
        Ok(())
    }

    async fn load_last_prices(&self) -> Result<HashMap<String, Decimal>, StoreError> {
        Ok(self.tables.lock().await.prices.clone())
    }
}
