//! Execution gateway and news calendar collaborator contracts
//!
//! The engine treats both as pure request/response boundaries: no locks are
//! held across calls, and every call is wrapped in a timeout by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Trade direction as understood by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }
}

/// Account snapshot read from the gateway; never mutated by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
    pub currency: String,
}

/// Current quote for one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolPrice {
    pub bid: f64,
    pub ask: f64,
}

/// Order as handed to the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: TradeDirection,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Successful submission result
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub ticket: i64,
    pub fill_price: f64,
    pub fill_volume: f64,
}

/// Result of closing an open position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseResult {
    pub price: f64,
    pub profit: f64,
}

/// Market data & execution gateway contract
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Whether the gateway currently holds a broker connection
    async fn is_connected(&self) -> bool;

    /// Balance/equity snapshot for the account this gateway serves
    async fn account_info(&self) -> Result<AccountInfo, EngineError>;

    /// Current bid/ask; `Connectivity` error for unknown symbols
    async fn symbol_price(&self, symbol: &str) -> Result<SymbolPrice, EngineError>;

    /// Submit a market order; `Execution` error on rejection
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderFill, EngineError>;

    /// Close an open position by broker ticket
    async fn close_position(&self, ticket: i64) -> Result<CloseResult, EngineError>;
}

/// Economic-calendar collaborator
#[async_trait]
pub trait NewsCalendar: Send + Sync {
    /// True when any listed currency has a high-impact event scheduled
    /// within the next `within_minutes` minutes
    async fn has_high_impact_event(
        &self,
        currencies: &[String],
        within_minutes: u32,
    ) -> Result<bool, EngineError>;
}
