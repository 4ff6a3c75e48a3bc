//! Per-account lifecycle supervisor
//!
//! Drives the stopped → running → stopped state machine for one account,
//! owns the pipeline components, and runs the periodic evaluation tick.
//! Ticks are strictly sequential within an account: the shutdown signal is
//! only raced against the interval, never against an in-flight pipeline,
//! so an order in flight always completes (and persists) or reports its
//! failure before the task exits.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{BotSettings, BotSettingsPatch, EngineConfig};
use crate::engine::admission::{AdmissionController, AdmissionDecision};
use crate::engine::executor::ExecutionOrchestrator;
use crate::engine::history::PriceHistory;
use crate::engine::signal::{SignalGenerator, StrategyKind};
use crate::engine::sizer::RiskSizer;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::gateway::{ExecutionGateway, NewsCalendar};
use crate::persistence::TradeStore;

/// Supervisor lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Stopped,
    Running,
    Error(String),
}

/// One full evaluation pass over the account's symbols
///
/// Owns the price history and cooldown state exclusively; both are
/// discarded when the supervisor stops.
pub struct TickPipeline {
    account_id: String,
    engine_cfg: EngineConfig,
    history: PriceHistory,
    generator: SignalGenerator,
    admission: AdmissionController,
    executor: ExecutionOrchestrator,
    gateway: Arc<dyn ExecutionGateway>,
    calendar: Arc<dyn NewsCalendar>,
    events: EventBus,
}

impl TickPipeline {
    pub fn new(
        account_id: String,
        engine_cfg: EngineConfig,
        gateway: Arc<dyn ExecutionGateway>,
        calendar: Arc<dyn NewsCalendar>,
        store: Arc<dyn TradeStore>,
        events: EventBus,
    ) -> Self {
        let executor = ExecutionOrchestrator::new(
            gateway.clone(),
            store,
            events.clone(),
            Duration::from_millis(engine_cfg.gateway_timeout_ms),
        );
        Self {
            account_id,
            history: PriceHistory::new(engine_cfg.history_cap),
            generator: SignalGenerator::new(engine_cfg.min_history_len),
            admission: AdmissionController::new(engine_cfg.min_confidence, engine_cfg.cooldown_secs),
            executor,
            gateway,
            calendar,
            events,
            engine_cfg,
        }
    }

    /// Evaluate every configured symbol once
    ///
    /// A single symbol's failure is reported and never halts the loop or
    /// the other symbols.
    pub async fn run_tick(&mut self, settings: &BotSettings) {
        for symbol in settings.symbols.clone() {
            if let Err(e) = self.evaluate_symbol(settings, &symbol).await {
                warn!("⚠️  {} {}: {}", self.account_id, symbol, e);
                self.events.emit(EngineEvent::Error {
                    account_id: self.account_id.clone(),
                    symbol: Some(symbol.clone()),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Full pipeline for one symbol: price → history → signal → admission →
    /// sizing → execution
    async fn evaluate_symbol(
        &mut self,
        settings: &BotSettings,
        symbol: &str,
    ) -> Result<(), EngineError> {
        let timeout = Duration::from_millis(self.engine_cfg.gateway_timeout_ms);

        let price = tokio::time::timeout(timeout, self.gateway.symbol_price(symbol))
            .await
            .map_err(|_| EngineError::Connectivity(format!("{}: price fetch timed out", symbol)))??;

        self.history.record(symbol, price.bid);
        let series = self.history.get(symbol);

        let strategy = StrategyKind::resolve(settings);
        let signal = match self.generator.evaluate(symbol, &series, strategy) {
            Some(signal) => signal,
            None => return Ok(()),
        };
        debug!(
            "{} {}: candidate {:?} ({})",
            self.account_id, symbol, signal.action, signal.reason
        );

        let decision = tokio::time::timeout(
            timeout,
            self.admission
                .admit(&signal, self.calendar.as_ref(), settings.news_window_minutes),
        )
        .await
        .map_err(|_| EngineError::Connectivity(format!("{}: news query timed out", symbol)))??;

        match decision {
            AdmissionDecision::Rejected { reason } => {
                debug!("{} {}: signal discarded ({})", self.account_id, symbol, reason);
                return Ok(());
            }
            AdmissionDecision::NewsBlocked { reason } => {
                info!("📰 {} {}: {}", self.account_id, symbol, reason);
                self.events.emit(EngineEvent::NewsPause {
                    account_id: self.account_id.clone(),
                    symbol: symbol.to_string(),
                    reason,
                });
                return Ok(());
            }
            AdmissionDecision::Admitted => {}
        }

        let account = tokio::time::timeout(timeout, self.gateway.account_info())
            .await
            .map_err(|_| EngineError::Connectivity("account info timed out".to_string()))??;

        let sizer = RiskSizer::new(settings.risk_per_trade);
        let volume = sizer.volume(&signal, account.balance, price.bid);

        self.executor.execute(&self.account_id, &signal, volume).await?;
        Ok(())
    }
}

/// Supervises the decision loop for exactly one account
pub struct BotSupervisor {
    account_id: String,
    engine_cfg: EngineConfig,
    gateway: Arc<dyn ExecutionGateway>,
    calendar: Arc<dyn NewsCalendar>,
    store: Arc<dyn TradeStore>,
    events: EventBus,
    status: Arc<Mutex<BotStatus>>,
    settings: Arc<RwLock<BotSettings>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BotSupervisor {
    pub fn new(
        account_id: String,
        engine_cfg: EngineConfig,
        gateway: Arc<dyn ExecutionGateway>,
        calendar: Arc<dyn NewsCalendar>,
        store: Arc<dyn TradeStore>,
        events: EventBus,
    ) -> Self {
        Self {
            account_id,
            engine_cfg,
            gateway,
            calendar,
            store,
            events,
            status: Arc::new(Mutex::new(BotStatus::Stopped)),
            settings: Arc::new(RwLock::new(BotSettings::default())),
            shutdown: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Current lifecycle state
    pub fn status(&self) -> BotStatus {
        self.status.lock().unwrap().clone()
    }

    /// Load settings, verify gateway connectivity, and begin the tick loop
    ///
    /// Fails with a configuration error when no settings exist for the
    /// account and a connectivity error when the gateway is disconnected;
    /// in both cases the supervisor stays stopped.
    pub async fn start(&self) -> Result<(), EngineError> {
        // The task slot doubles as a start lock: the status check, the
        // Running transition, and the spawn all happen under it, so two
        // concurrent starts cannot both pass validation.
        let mut task_slot = self.task.lock().await;
        if self.status() == BotStatus::Running {
            return Err(EngineError::Config(format!(
                "account {} is already running",
                self.account_id
            )));
        }

        let settings = self
            .store
            .get_bot_settings(&self.account_id)
            .await?
            .ok_or_else(|| {
                EngineError::Config(format!("no bot settings for account {}", self.account_id))
            })?;

        let connected = tokio::time::timeout(
            Duration::from_millis(self.engine_cfg.gateway_timeout_ms),
            self.gateway.is_connected(),
        )
        .await
        .unwrap_or(false);
        if !connected {
            return Err(EngineError::Connectivity(
                "execution gateway is disconnected".to_string(),
            ));
        }

        *self.settings.write().unwrap() = settings;
        self.transition(BotStatus::Running);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().unwrap() = Some(shutdown_tx);

        let mut pipeline = TickPipeline::new(
            self.account_id.clone(),
            self.engine_cfg.clone(),
            self.gateway.clone(),
            self.calendar.clone(),
            self.store.clone(),
            self.events.clone(),
        );
        let settings_handle = self.settings.clone();
        let tick_period = Duration::from_secs(self.engine_cfg.tick_interval_secs);
        let gateway_timeout = Duration::from_millis(self.engine_cfg.gateway_timeout_ms);
        let gateway = self.gateway.clone();
        let status = self.status.clone();
        let events = self.events.clone();
        let account_id = self.account_id.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("🚀 {}: decision loop started ({:?} tick)", account_id, tick_period);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("{}: shutdown received", account_id);
                        break;
                    }
                    _ = interval.tick() => {
                        // Re-verify the session each tick; a dead gateway
                        // parks the account in the error state until an
                        // explicit start
                        let connected =
                            tokio::time::timeout(gateway_timeout, gateway.is_connected())
                                .await
                                .unwrap_or(false);
                        if !connected {
                            warn!("💔 {}: execution gateway disconnected", account_id);
                            transition_status(
                                &status,
                                &events,
                                &account_id,
                                BotStatus::Error("execution gateway disconnected".to_string()),
                            );
                            break;
                        }
                        // Snapshot settings once per tick; updates land between ticks
                        let snapshot = settings_handle.read().unwrap().clone();
                        pipeline.run_tick(&snapshot).await;
                    }
                }
            }
            info!("🛑 {}: decision loop exited", account_id);
        });
        *task_slot = Some(handle);

        Ok(())
    }

    /// Stop the tick loop; the in-flight tick finishes its current symbol
    ///
    /// Idempotent: stopping an already-stopped supervisor is a no-op
    /// success.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let shutdown = self.shutdown.lock().unwrap().take();
        match shutdown {
            Some(tx) => {
                let _ = tx.send(true);
            }
            None => return Ok(()),
        }

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("{}: loop task join failed: {}", self.account_id, e);
            }
        }

        self.transition(BotStatus::Stopped);
        Ok(())
    }

    /// Persist a settings patch and swap the snapshot between ticks
    pub async fn update_settings(
        &self,
        patch: &BotSettingsPatch,
    ) -> Result<BotSettings, EngineError> {
        let updated = self
            .store
            .update_bot_settings(&self.account_id, patch)
            .await?;
        *self.settings.write().unwrap() = updated.clone();
        info!("🔧 {}: settings updated", self.account_id);
        Ok(updated)
    }

    /// Cancel the tick loop and park the account in the error state
    ///
    /// Counterpart to `stop` for fatal conditions: the loop is shut down
    /// the same way, but the account reports `Error` and only an explicit
    /// `start` resumes it.
    pub async fn mark_error(&self, message: impl Into<String>) {
        let shutdown = self.shutdown.lock().unwrap().take();
        if let Some(tx) = shutdown {
            let _ = tx.send(true);
        }

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("{}: loop task join failed: {}", self.account_id, e);
            }
        }

        self.transition(BotStatus::Error(message.into()));
    }

    fn transition(&self, status: BotStatus) {
        transition_status(&self.status, &self.events, &self.account_id, status);
    }
}

fn transition_status(status: &Mutex<BotStatus>, events: &EventBus, account_id: &str, next: BotStatus) {
    {
        let mut guard = status.lock().unwrap();
        if *guard == next {
            return;
        }
        info!("{}: {:?} → {:?}", account_id, *guard, next);
        *guard = next.clone();
    }
    events.emit(EngineEvent::StatusChanged {
        account_id: account_id.to_string(),
        status: next,
    });
}
