//! Per-account supervisor registry
//!
//! Owns one `BotSupervisor` per account and exposes the public engine API:
//! start, stop, status, update settings. Double starts are rejected inside
//! the supervisor, under its start lock, so concurrent calls through the
//! registry stay safe.

use dashmap::DashMap;
use log::info;
use std::sync::Arc;

use crate::config::{BotSettings, BotSettingsPatch, EngineConfig};
use crate::engine::supervisor::{BotStatus, BotSupervisor};
use crate::error::EngineError;
use crate::events::EventBus;
use crate::gateway::{ExecutionGateway, NewsCalendar};
use crate::persistence::TradeStore;

/// Keyed map of running/stopped supervisors, one per account
pub struct BotRegistry {
    engine_cfg: EngineConfig,
    gateway: Arc<dyn ExecutionGateway>,
    calendar: Arc<dyn NewsCalendar>,
    store: Arc<dyn TradeStore>,
    events: EventBus,
    bots: DashMap<String, Arc<BotSupervisor>>,
}

impl BotRegistry {
    pub fn new(
        engine_cfg: EngineConfig,
        gateway: Arc<dyn ExecutionGateway>,
        calendar: Arc<dyn NewsCalendar>,
        store: Arc<dyn TradeStore>,
        events: EventBus,
    ) -> Self {
        Self {
            engine_cfg,
            gateway,
            calendar,
            store,
            events,
            bots: DashMap::new(),
        }
    }

    /// Start (or restart) the decision loop for an account
    ///
    /// Rejects accounts that are already running; an account in the error
    /// state may be restarted explicitly this way.
    pub async fn start(&self, account_id: &str) -> Result<(), EngineError> {
        self.supervisor(account_id).start().await
    }

    /// Stop the decision loop; success even when nothing is running
    pub async fn stop(&self, account_id: &str) -> Result<(), EngineError> {
        // Clone out of the map before awaiting; never hold a map guard
        // across an await
        let supervisor = self.bots.get(account_id).map(|entry| entry.value().clone());
        match supervisor {
            Some(supervisor) => supervisor.stop().await,
            None => Ok(()),
        }
    }

    /// Lifecycle state for an account (`Stopped` when never started)
    pub fn status(&self, account_id: &str) -> BotStatus {
        self.bots
            .get(account_id)
            .map(|entry| entry.value().status())
            .unwrap_or(BotStatus::Stopped)
    }

    /// Persist a settings patch; a running supervisor picks it up on its
    /// next tick
    pub async fn update_settings(
        &self,
        account_id: &str,
        patch: &BotSettingsPatch,
    ) -> Result<BotSettings, EngineError> {
        let supervisor = self.bots.get(account_id).map(|entry| entry.value().clone());
        match supervisor {
            Some(supervisor) => supervisor.update_settings(patch).await,
            None => self.store.update_bot_settings(account_id, patch).await,
        }
    }

    /// Stop every running account (shutdown path)
    pub async fn stop_all(&self) {
        let supervisors: Vec<Arc<BotSupervisor>> = self
            .bots
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for supervisor in supervisors {
            if supervisor.status() == BotStatus::Running {
                info!("Stopping {}", supervisor.account_id());
                let _ = supervisor.stop().await;
            }
        }
    }

    fn supervisor(&self, account_id: &str) -> Arc<BotSupervisor> {
        self.bots
            .entry(account_id.to_string())
            .or_insert_with(|| {
                Arc::new(BotSupervisor::new(
                    account_id.to_string(),
                    self.engine_cfg.clone(),
                    self.gateway.clone(),
                    self.calendar.clone(),
                    self.store.clone(),
                    self.events.clone(),
                ))
            })
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AccountInfo, CloseResult, OrderFill, OrderRequest, SymbolPrice};
    use crate::persistence::InMemoryTradeStore;
    use async_trait::async_trait;

    struct FlatGateway;

    #[async_trait]
    impl ExecutionGateway for FlatGateway {
        async fn is_connected(&self) -> bool {
            true
        }
        async fn account_info(&self) -> Result<AccountInfo, EngineError> {
            Ok(AccountInfo {
                balance: 10_000.0,
                equity: 10_000.0,
                currency: "USD".to_string(),
            })
        }
        async fn symbol_price(&self, _symbol: &str) -> Result<SymbolPrice, EngineError> {
            Ok(SymbolPrice {
                bid: 1.1,
                ask: 1.1002,
            })
        }
        async fn submit_order(&self, _request: &OrderRequest) -> Result<OrderFill, EngineError> {
            Ok(OrderFill {
                ticket: 1,
                fill_price: 1.1,
                fill_volume: 0.1,
            })
        }
        async fn close_position(&self, _ticket: i64) -> Result<CloseResult, EngineError> {
            Ok(CloseResult {
                price: 1.1,
                profit: 0.0,
            })
        }
    }

    struct QuietCalendar;

    #[async_trait]
    impl NewsCalendar for QuietCalendar {
        async fn has_high_impact_event(
            &self,
            _currencies: &[String],
            _within_minutes: u32,
        ) -> Result<bool, EngineError> {
            Ok(false)
        }
    }

    fn registry(store: Arc<InMemoryTradeStore>) -> BotRegistry {
        BotRegistry::new(
            EngineConfig::default(),
            Arc::new(FlatGateway),
            Arc::new(QuietCalendar),
            store,
            EventBus::new(16),
        )
    }

    #[tokio::test]
    async fn test_unknown_account_reports_stopped() {
        let registry = registry(Arc::new(InMemoryTradeStore::new()));
        assert_eq!(registry.status("nobody"), BotStatus::Stopped);
        // Stopping an account that never started is a success
        registry.stop("nobody").await.unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected_then_restartable() {
        let store = Arc::new(InMemoryTradeStore::new());
        store.seed_settings("acct-1", BotSettings::default());
        let registry = registry(store);

        registry.start("acct-1").await.unwrap();
        assert_eq!(registry.status("acct-1"), BotStatus::Running);

        let err = registry.start("acct-1").await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        registry.stop("acct-1").await.unwrap();
        assert_eq!(registry.status("acct-1"), BotStatus::Stopped);

        // Explicit restart after stop is allowed
        registry.start("acct-1").await.unwrap();
        registry.stop_all().await;
        assert_eq!(registry.status("acct-1"), BotStatus::Stopped);
    }

    #[tokio::test]
    async fn test_update_settings_without_running_bot_persists() {
        let store = Arc::new(InMemoryTradeStore::new());
        let registry = registry(store.clone());

        let settings = registry
            .update_settings(
                "acct-2",
                &BotSettingsPatch {
                    symbols: Some(vec!["USDJPY".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(settings.symbols, vec!["USDJPY".to_string()]);
        assert!(store.get_bot_settings("acct-2").await.unwrap().is_some());
    }
}
