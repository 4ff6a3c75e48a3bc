//! 🤖 Auto-Trader Service - Per-Account Trading Decision Engine
//!
//! Wires the decision engine to a paper execution gateway and a SQLite
//! trade store, starts the configured account's supervisor, logs engine
//! events, and shuts down cleanly on Ctrl-C.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;

use auto_trader::config::{BotSettingsPatch, Config};
use auto_trader::events::{EngineEvent, EventBus};
use auto_trader::paper::{PaperGateway, StaticCalendar};
use auto_trader::persistence::{SqliteTradeStore, TradeStore};
use auto_trader::registry::BotRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log level can come from it
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.log_level),
    )
    .init();
    info!("✅ Configuration: Loaded");

    print_banner(&config);

    // Trade store (SQLite)
    if let Some(parent) = config.database.sqlite_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    let store: Arc<dyn TradeStore> = Arc::new(
        SqliteTradeStore::open(&config.database.sqlite_path)
            .context("Failed to open trade store")?,
    );
    info!("✅ Trade store: {}", config.database.sqlite_path.display());

    // Paper collaborators (swap for a broker bridge in production)
    let gateway = Arc::new(PaperGateway::new(config.paper.starting_balance));
    let calendar = Arc::new(StaticCalendar::quiet());
    info!(
        "✅ Gateway: paper mode (${:.2} balance)",
        config.paper.starting_balance
    );

    // Event bus + console subscriber
    let events = EventBus::new(256);
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(envelope) = event_rx.recv().await {
            match envelope.event {
                EngineEvent::TradeExecuted { account_id, trade } => info!(
                    "📣 [{}] trade {}: {} {} {:.2} @ {:.5}",
                    account_id,
                    trade.id,
                    trade.direction.as_str(),
                    trade.symbol,
                    trade.volume,
                    trade.entry_price
                ),
                EngineEvent::StatusChanged { account_id, status } => {
                    info!("📣 [{}] status: {:?}", account_id, status)
                }
                EngineEvent::NewsPause {
                    account_id,
                    symbol,
                    reason,
                } => info!("📣 [{}] news pause on {}: {}", account_id, symbol, reason),
                EngineEvent::Error {
                    account_id,
                    symbol,
                    message,
                } => warn!(
                    "📣 [{}] error{}: {}",
                    account_id,
                    symbol.map(|s| format!(" on {}", s)).unwrap_or_default(),
                    message
                ),
            }
        }
    });

    let registry = BotRegistry::new(
        config.engine.clone(),
        gateway,
        calendar,
        store.clone(),
        events,
    );

    // Make sure the demo account has settings, then start it
    let account_id = config.paper.account_id.clone();
    if store.get_bot_settings(&account_id).await?.is_none() {
        registry
            .update_settings(&account_id, &BotSettingsPatch::default())
            .await?;
        info!("✅ Settings: defaults created for {}", account_id);
    }

    match registry.start(&account_id).await {
        Ok(()) => info!("🚀 Account {} running", account_id),
        Err(e) => {
            error!("❌ Failed to start {}: {}", account_id, e);
            return Err(anyhow::anyhow!(e));
        }
    }

    // Run until Ctrl-C
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Shutdown requested, stopping accounts...");
    registry.stop_all().await;
    info!("👋 Goodbye");
    Ok(())
}

fn print_banner(config: &Config) {
    info!("╔══════════════════════════════════════════╗");
    info!("║        AUTO-TRADER DECISION ENGINE       ║");
    info!("╠══════════════════════════════════════════╣");
    info!("║ Tick interval : {:>3}s                     ║", config.engine.tick_interval_secs);
    info!("║ Cooldown      : {:>3}s                     ║", config.engine.cooldown_secs);
    info!("║ History cap   : {:>3} prices               ║", config.engine.history_cap);
    info!("║ Min history   : {:>3} prices               ║", config.engine.min_history_len);
    info!("╚══════════════════════════════════════════╝");
}
