//! Paper trading collaborators
//!
//! A simulated execution gateway (random-walk quotes, ticket bookkeeping)
//! and a static news calendar, so the binary runs the full decision loop
//! end to end without a broker connection.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::EngineError;
use crate::gateway::{
    AccountInfo, CloseResult, ExecutionGateway, NewsCalendar, OrderFill, OrderRequest, SymbolPrice,
    TradeDirection,
};

/// Spread applied to simulated quotes
const PAPER_SPREAD: f64 = 0.0002;
/// Per-tick random walk step as a fraction of price
const WALK_STEP_PCT: f64 = 0.0008;

#[derive(Debug, Clone)]
struct PaperPosition {
    symbol: String,
    direction: TradeDirection,
    volume: f64,
    entry_price: f64,
}

#[derive(Debug, Default)]
struct PaperBook {
    prices: HashMap<String, f64>,
    positions: HashMap<i64, PaperPosition>,
    next_ticket: i64,
}

/// In-memory gateway with a random-walk price feed
pub struct PaperGateway {
    balance: Mutex<f64>,
    book: Mutex<PaperBook>,
}

impl PaperGateway {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: Mutex::new(starting_balance),
            book: Mutex::new(PaperBook {
                next_ticket: 1000,
                ..Default::default()
            }),
        }
    }

    /// Advance the random walk and return the new bid
    fn walk_price(&self, symbol: &str) -> f64 {
        let mut book = self.book.lock().unwrap();
        let price = book
            .prices
            .entry(symbol.to_string())
            .or_insert_with(|| seed_price(symbol));
        let step = rand::thread_rng().gen_range(-WALK_STEP_PCT..WALK_STEP_PCT);
        *price *= 1.0 + step;
        *price
    }
}

/// Starting quote for a simulated symbol
fn seed_price(symbol: &str) -> f64 {
    // JPY crosses trade in the hundreds; everything else near parity
    if symbol.to_uppercase().ends_with("JPY") {
        150.0
    } else {
        1.1000
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn account_info(&self) -> Result<AccountInfo, EngineError> {
        let balance = *self.balance.lock().unwrap();
        Ok(AccountInfo {
            balance,
            equity: balance,
            currency: "USD".to_string(),
        })
    }

    async fn symbol_price(&self, symbol: &str) -> Result<SymbolPrice, EngineError> {
        if symbol.len() < 6 {
            return Err(EngineError::Connectivity(format!(
                "unknown symbol: {}",
                symbol
            )));
        }
        let bid = self.walk_price(symbol);
        Ok(SymbolPrice {
            bid,
            ask: bid + PAPER_SPREAD,
        })
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderFill, EngineError> {
        if request.volume <= 0.0 {
            return Err(EngineError::Execution(format!(
                "rejected order: volume {:.2} below broker minimum",
                request.volume
            )));
        }

        let mut book = self.book.lock().unwrap();
        let bid = *book
            .prices
            .get(&request.symbol)
            .ok_or_else(|| EngineError::Execution(format!("no quote for {}", request.symbol)))?;
        let fill_price = match request.direction {
            TradeDirection::Buy => bid + PAPER_SPREAD,
            TradeDirection::Sell => bid,
        };

        let ticket = book.next_ticket;
        book.next_ticket += 1;
        book.positions.insert(
            ticket,
            PaperPosition {
                symbol: request.symbol.clone(),
                direction: request.direction,
                volume: request.volume,
                entry_price: fill_price,
            },
        );

        Ok(OrderFill {
            ticket,
            fill_price,
            fill_volume: request.volume,
        })
    }

    async fn close_position(&self, ticket: i64) -> Result<CloseResult, EngineError> {
        let mut book = self.book.lock().unwrap();
        let position = book
            .positions
            .remove(&ticket)
            .ok_or_else(|| EngineError::Execution(format!("no open position {}", ticket)))?;

        let price = *book
            .prices
            .get(&position.symbol)
            .unwrap_or(&position.entry_price);
        let points = match position.direction {
            TradeDirection::Buy => price - position.entry_price,
            TradeDirection::Sell => position.entry_price - price,
        };
        let profit = points * position.volume * 100_000.0;

        *self.balance.lock().unwrap() += profit;
        Ok(CloseResult { price, profit })
    }
}

/// Calendar with a fixed answer, for paper runs and tests
pub struct StaticCalendar {
    high_impact: bool,
}

impl StaticCalendar {
    /// No events scheduled, ever
    pub fn quiet() -> Self {
        Self { high_impact: false }
    }

    /// Permanently inside a high-impact window
    pub fn busy() -> Self {
        Self { high_impact: true }
    }
}

#[async_trait]
impl NewsCalendar for StaticCalendar {
    async fn has_high_impact_event(
        &self,
        _currencies: &[String],
        _within_minutes: u32,
    ) -> Result<bool, EngineError> {
        Ok(self.high_impact)
    }
}
