//! Execution orchestration
//!
//! Last stage of the pipeline: submit the sized order through the gateway,
//! persist the resulting trade, and emit a trade-executed event. Failed
//! submissions are reported, never retried; the admitted signal is not
//! re-queued.

use chrono::Utc;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::engine::signal::{SignalAction, TradingSignal};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::gateway::{ExecutionGateway, OrderRequest, TradeDirection};
use crate::persistence::{TradeRecord, TradeStatus, TradeStore};

/// Submits sized orders and records the outcome
pub struct ExecutionOrchestrator {
    gateway: Arc<dyn ExecutionGateway>,
    store: Arc<dyn TradeStore>,
    events: EventBus,
    gateway_timeout: Duration,
}

impl ExecutionOrchestrator {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        store: Arc<dyn TradeStore>,
        events: EventBus,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            events,
            gateway_timeout,
        }
    }

    /// Submit an admitted, sized signal; persist and announce the fill
    pub async fn execute(
        &self,
        account_id: &str,
        signal: &TradingSignal,
        volume: f64,
    ) -> Result<TradeRecord, EngineError> {
        let direction = match signal.action {
            SignalAction::Buy => TradeDirection::Buy,
            SignalAction::Sell => TradeDirection::Sell,
            SignalAction::Close => {
                return Err(EngineError::Execution(
                    "close signals carry a ticket, not an order".to_string(),
                ))
            }
        };

        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            direction,
            volume,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
        };

        let fill = tokio::time::timeout(self.gateway_timeout, self.gateway.submit_order(&request))
            .await
            .map_err(|_| {
                EngineError::Connectivity(format!(
                    "order submission timed out after {:?}",
                    self.gateway_timeout
                ))
            })??;

        let record = TradeRecord {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            ticket: fill.ticket,
            symbol: signal.symbol.clone(),
            direction,
            volume: fill.fill_volume,
            entry_price: fill.fill_price,
            exit_price: None,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            profit: None,
            status: TradeStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            automated: true,
        };

        self.store.create_trade(&record).await?;
        info!(
            "💹 {} {} {:.2} lots @ {:.5} (ticket {}): {}",
            record.direction.as_str(),
            record.symbol,
            record.volume,
            record.entry_price,
            record.ticket,
            signal.reason
        );
        self.events.emit(EngineEvent::TradeExecuted {
            account_id: account_id.to_string(),
            trade: record.clone(),
        });

        Ok(record)
    }

    /// Close an open position through the gateway and settle the record
    pub async fn close_trade(&self, trade: &TradeRecord) -> Result<TradeRecord, EngineError> {
        let result = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.close_position(trade.ticket),
        )
        .await
        .map_err(|_| {
            EngineError::Connectivity(format!(
                "close timed out after {:?}",
                self.gateway_timeout
            ))
        })??;

        let closed_at = Utc::now();
        self.store
            .close_trade(&trade.id, result.price, result.profit, closed_at)
            .await?;

        let mut closed = trade.clone();
        closed.exit_price = Some(result.price);
        closed.profit = Some(result.profit);
        closed.closed_at = Some(closed_at);
        closed.status = TradeStatus::Closed;

        info!(
            "🏁 Closed {} ticket {} @ {:.5}, profit {:.2}",
            closed.symbol, closed.ticket, result.price, result.profit
        );
        self.events.emit(EngineEvent::TradeExecuted {
            account_id: closed.account_id.clone(),
            trade: closed.clone(),
        });
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AccountInfo, CloseResult, OrderFill, SymbolPrice};
    use crate::persistence::InMemoryTradeStore;
    use async_trait::async_trait;

    struct ScriptedGateway {
        reject: bool,
    }

    #[async_trait]
    impl ExecutionGateway for ScriptedGateway {
        async fn is_connected(&self) -> bool {
            true
        }

        async fn account_info(&self) -> Result<AccountInfo, EngineError> {
            Ok(AccountInfo {
                balance: 100_000.0,
                equity: 100_000.0,
                currency: "USD".to_string(),
            })
        }

        async fn symbol_price(&self, _symbol: &str) -> Result<SymbolPrice, EngineError> {
            Ok(SymbolPrice {
                bid: 1.1000,
                ask: 1.1002,
            })
        }

        async fn submit_order(&self, request: &OrderRequest) -> Result<OrderFill, EngineError> {
            if self.reject || request.volume <= 0.0 {
                return Err(EngineError::Execution("order rejected".to_string()));
            }
            Ok(OrderFill {
                ticket: 7001,
                fill_price: 1.1001,
                fill_volume: request.volume,
            })
        }

        async fn close_position(&self, _ticket: i64) -> Result<CloseResult, EngineError> {
            Ok(CloseResult {
                price: 1.1100,
                profit: 99.0,
            })
        }
    }

    fn buy_signal() -> TradingSignal {
        TradingSignal {
            symbol: "EURUSD".to_string(),
            action: SignalAction::Buy,
            confidence: 0.7,
            reason: "bullish crossover".to_string(),
            stop_loss: Some(1.0945),
            take_profit: Some(1.1110),
        }
    }

    fn orchestrator(reject: bool, store: Arc<InMemoryTradeStore>, events: EventBus) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            Arc::new(ScriptedGateway { reject }),
            store,
            events,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_execute_persists_and_emits() {
        let store = Arc::new(InMemoryTradeStore::new());
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let orchestrator = orchestrator(false, store.clone(), events);

        let record = orchestrator
            .execute("acct-1", &buy_signal(), 1.0)
            .await
            .unwrap();
        assert_eq!(record.ticket, 7001);
        assert_eq!(record.status, TradeStatus::Open);
        assert_eq!(store.trades().len(), 1);

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(envelope.event, EngineEvent::TradeExecuted { .. }));
    }

    #[tokio::test]
    async fn test_rejection_persists_nothing() {
        let store = Arc::new(InMemoryTradeStore::new());
        let orchestrator = orchestrator(true, store.clone(), EventBus::new(8));

        let err = orchestrator
            .execute("acct-1", &buy_signal(), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
        assert!(store.trades().is_empty());
    }

    #[tokio::test]
    async fn test_zero_volume_is_submitted_and_rejected_by_gateway() {
        let store = Arc::new(InMemoryTradeStore::new());
        let orchestrator = orchestrator(false, store.clone(), EventBus::new(8));

        let err = orchestrator
            .execute("acct-1", &buy_signal(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }

    #[tokio::test]
    async fn test_close_trade_settles_record() {
        let store = Arc::new(InMemoryTradeStore::new());
        let orchestrator = orchestrator(false, store.clone(), EventBus::new(8));

        let open = orchestrator
            .execute("acct-1", &buy_signal(), 0.5)
            .await
            .unwrap();
        let closed = orchestrator.close_trade(&open).await.unwrap();

        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.profit, Some(99.0));
        assert_eq!(store.trades()[0].status, TradeStatus::Closed);
    }
}
