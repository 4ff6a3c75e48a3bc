//! Trade and settings persistence
//!
//! The engine talks to a `TradeStore` trait; two implementations ship here:
//! a SQLite store for the service binary and an in-memory store for paper
//! trading and tests. The engine never deletes trade records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{BotSettings, BotSettingsPatch};
use crate::error::EngineError;
use crate::gateway::TradeDirection;

/// Trade lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
    Pending,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
            TradeStatus::Pending => "pending",
        }
    }

    fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "open" => Ok(TradeStatus::Open),
            "closed" => Ok(TradeStatus::Closed),
            "pending" => Ok(TradeStatus::Pending),
            other => Err(EngineError::Data(format!("unknown trade status: {}", other))),
        }
    }
}

/// Durable record of one submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub account_id: String,
    /// Broker ticket returned by the gateway
    pub ticket: i64,
    pub symbol: String,
    pub direction: TradeDirection,
    pub volume: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub profit: Option<f64>,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// False for trades placed by manual intervention
    pub automated: bool,
}

/// Persistence collaborator contract
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert a new trade record
    async fn create_trade(&self, record: &TradeRecord) -> Result<(), EngineError>;

    /// Mark a trade closed with its exit price and realized profit
    async fn close_trade(
        &self,
        trade_id: &str,
        exit_price: f64,
        profit: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError>;

    /// Settings for one account, `None` when never configured
    async fn get_bot_settings(&self, account_id: &str) -> Result<Option<BotSettings>, EngineError>;

    /// Apply a partial settings update, creating defaults first if absent
    async fn update_bot_settings(
        &self,
        account_id: &str,
        patch: &BotSettingsPatch,
    ) -> Result<BotSettings, EngineError>;
}

// ────────────────────────────────────────────────
// SQLite store
// ────────────────────────────────────────────────

/// SQLite-backed store for trades and bot settings
///
/// The connection lives behind a blocking mutex; every call hops onto the
/// blocking pool so the decision loop never stalls on disk I/O.
pub struct SqliteTradeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTradeStore {
    /// Open (or create) the database and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = Connection::open(path)
            .map_err(|e| EngineError::Config(format!("failed to open sqlite db: {}", e)))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::Config(format!("failed to open sqlite db: {}", e)))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), EngineError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id          TEXT PRIMARY KEY,
                account_id  TEXT NOT NULL,
                ticket      INTEGER NOT NULL,
                symbol      TEXT NOT NULL,
                direction   TEXT NOT NULL,
                volume      REAL NOT NULL,
                entry_price REAL NOT NULL,
                exit_price  REAL,
                stop_loss   REAL,
                take_profit REAL,
                profit      REAL,
                status      TEXT NOT NULL,
                opened_at   TEXT NOT NULL,
                closed_at   TEXT,
                automated   INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_account ON trades(account_id);
            CREATE TABLE IF NOT EXISTS bot_settings (
                account_id  TEXT PRIMARY KEY,
                settings    TEXT NOT NULL
            );",
        )
        .map_err(|e| EngineError::Config(format!("failed to init schema: {}", e)))
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, EngineError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| EngineError::Data("sqlite connection poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| EngineError::Data(format!("blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn create_trade(&self, record: &TradeRecord) -> Result<(), EngineError> {
        let r = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO trades (id, account_id, ticket, symbol, direction, volume,
                    entry_price, exit_price, stop_loss, take_profit, profit, status,
                    opened_at, closed_at, automated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    r.id,
                    r.account_id,
                    r.ticket,
                    r.symbol,
                    r.direction.as_str(),
                    r.volume,
                    r.entry_price,
                    r.exit_price,
                    r.stop_loss,
                    r.take_profit,
                    r.profit,
                    r.status.as_str(),
                    r.opened_at.to_rfc3339(),
                    r.closed_at.map(|t| t.to_rfc3339()),
                    r.automated as i64,
                ],
            )
            .map_err(|e| EngineError::Data(format!("insert trade failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn close_trade(
        &self,
        trade_id: &str,
        exit_price: f64,
        profit: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let id = trade_id.to_string();
        self.with_conn(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE trades SET exit_price = ?1, profit = ?2, closed_at = ?3,
                        status = 'closed'
                     WHERE id = ?4",
                    params![exit_price, profit, closed_at.to_rfc3339(), id],
                )
                .map_err(|e| EngineError::Data(format!("close trade failed: {}", e)))?;
            if updated == 0 {
                return Err(EngineError::Data(format!("no trade with id {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn get_bot_settings(&self, account_id: &str) -> Result<Option<BotSettings>, EngineError> {
        let account = account_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT settings FROM bot_settings WHERE account_id = ?1")
                .map_err(|e| EngineError::Data(format!("prepare failed: {}", e)))?;
            let mut rows = stmt
                .query(params![account])
                .map_err(|e| EngineError::Data(format!("query failed: {}", e)))?;
            match rows
                .next()
                .map_err(|e| EngineError::Data(format!("row fetch failed: {}", e)))?
            {
                Some(row) => {
                    let raw: String = row
                        .get(0)
                        .map_err(|e| EngineError::Data(format!("column read failed: {}", e)))?;
                    let settings = serde_json::from_str(&raw)
                        .map_err(|e| EngineError::Data(format!("malformed settings json: {}", e)))?;
                    Ok(Some(settings))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn update_bot_settings(
        &self,
        account_id: &str,
        patch: &BotSettingsPatch,
    ) -> Result<BotSettings, EngineError> {
        let mut settings = self
            .get_bot_settings(account_id)
            .await?
            .unwrap_or_default();
        settings.apply(patch);

        let account = account_id.to_string();
        let stored = settings.clone();
        self.with_conn(move |conn| {
            let raw = serde_json::to_string(&stored)
                .map_err(|e| EngineError::Data(format!("settings serialize failed: {}", e)))?;
            conn.execute(
                "INSERT INTO bot_settings (account_id, settings) VALUES (?1, ?2)
                 ON CONFLICT(account_id) DO UPDATE SET settings = excluded.settings",
                params![account, raw],
            )
            .map_err(|e| EngineError::Data(format!("settings upsert failed: {}", e)))?;
            Ok(())
        })
        .await?;
        Ok(settings)
    }
}

// ────────────────────────────────────────────────
// In-memory store (paper mode / tests)
// ────────────────────────────────────────────────

/// In-memory store with the same contract as the SQLite one
#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: Mutex<Vec<TradeRecord>>,
    settings: Mutex<HashMap<String, BotSettings>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed settings for an account (what an admin UI would do)
    pub fn seed_settings(&self, account_id: &str, settings: BotSettings) {
        self.settings
            .lock()
            .unwrap()
            .insert(account_id.to_string(), settings);
    }

    /// Snapshot of all persisted trades
    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn create_trade(&self, record: &TradeRecord) -> Result<(), EngineError> {
        self.trades.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn close_trade(
        &self,
        trade_id: &str,
        exit_price: f64,
        profit: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut trades = self.trades.lock().unwrap();
        let trade = trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or_else(|| EngineError::Data(format!("no trade with id {}", trade_id)))?;
        trade.exit_price = Some(exit_price);
        trade.profit = Some(profit);
        trade.closed_at = Some(closed_at);
        trade.status = TradeStatus::Closed;
        Ok(())
    }

    async fn get_bot_settings(&self, account_id: &str) -> Result<Option<BotSettings>, EngineError> {
        Ok(self.settings.lock().unwrap().get(account_id).cloned())
    }

    async fn update_bot_settings(
        &self,
        account_id: &str,
        patch: &BotSettingsPatch,
    ) -> Result<BotSettings, EngineError> {
        let mut map = self.settings.lock().unwrap();
        let settings = map.entry(account_id.to_string()).or_default();
        settings.apply(patch);
        Ok(settings.clone())
    }
}
