//! Configuration management for the auto-trader service
//!
//! Two layers: process-level `Config` loaded from environment variables
//! (via .env file), and per-account `BotSettings` owned by the persistence
//! store and snapshotted by each supervisor between ticks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Process-level configuration for the engine service
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub paper: PaperConfig,
}

/// Decision-loop timing and limits
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Evaluation tick period (seconds)
    pub tick_interval_secs: u64,
    /// Bound on every external call: price fetch, news query, order submit (milliseconds)
    pub gateway_timeout_ms: u64,
    /// Minimum gap between two admitted signals for one symbol (seconds)
    pub cooldown_secs: u64,
    /// Per-symbol price history cap (FIFO eviction past this)
    pub history_cap: usize,
    /// Minimum recorded prices before any signal is generated
    pub min_history_len: usize,
    /// Confidence floor below which signals are discarded
    pub min_confidence: f64,
}

/// Trade store configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite path for trades and bot settings
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Defaults for the paper-trading binary wiring
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Account the binary starts a supervisor for
    pub account_id: String,
    /// Simulated account balance
    pub starting_balance: f64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Expects a .env file in the working directory or environment variables
    /// to be set. Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (ignoring error if not found)
        let _ = dotenv::dotenv();

        Ok(Config {
            engine: EngineConfig {
                tick_interval_secs: get_env_u64("TICK_INTERVAL_SECS", 10)?,
                gateway_timeout_ms: get_env_u64("GATEWAY_TIMEOUT_MS", 5000)?,
                cooldown_secs: get_env_u64("SIGNAL_COOLDOWN_SECS", 300)?,
                history_cap: get_env_usize("PRICE_HISTORY_CAP", 200)?,
                min_history_len: get_env_usize("MIN_HISTORY_LEN", 50)?,
                min_confidence: get_env_f64("MIN_CONFIDENCE", 0.5)?,
            },
            database: DatabaseConfig {
                sqlite_path: PathBuf::from(get_env_string("SQLITE_PATH", "./data/auto_trader.db")?),
            },
            logging: LoggingConfig {
                log_level: get_env_string("LOG_LEVEL", "info")?,
            },
            paper: PaperConfig {
                account_id: get_env_string("ACCOUNT_ID", "paper-001")?,
                starting_balance: get_env_f64("PAPER_BALANCE", 100_000.0)?,
            },
        })
    }

    /// Validate configuration values are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_interval_secs == 0 {
            anyhow::bail!("TICK_INTERVAL_SECS must be at least 1");
        }
        if self.engine.gateway_timeout_ms == 0 {
            anyhow::bail!("GATEWAY_TIMEOUT_MS must be at least 1");
        }
        if self.engine.history_cap < self.engine.min_history_len {
            anyhow::bail!(
                "PRICE_HISTORY_CAP ({}) below MIN_HISTORY_LEN ({})",
                self.engine.history_cap,
                self.engine.min_history_len
            );
        }
        if !(0.0..=1.0).contains(&self.engine.min_confidence) {
            anyhow::bail!("MIN_CONFIDENCE must be within [0, 1]");
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 10,
            gateway_timeout_ms: 5000,
            cooldown_secs: 300,
            history_cap: 200,
            min_history_len: 50,
            min_confidence: 0.5,
        }
    }
}

/// Per-account bot settings, owned by the trade store
///
/// The supervisor holds an immutable snapshot and swaps it only between
/// ticks, never mid-evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Strategy name ("ma_crossover" or "rsi"); unknown names fall back to MA crossover
    pub strategy: String,
    /// Risk budget per trade as a fraction of balance (0.01 = 1%)
    pub risk_per_trade: f64,
    /// Advisory daily loss cap as a fraction of balance; not enforced by the engine
    pub max_daily_loss: f64,
    /// Symbols evaluated each tick
    pub symbols: Vec<String>,
    /// News-avoidance window (minutes)
    pub news_window_minutes: u32,
    /// Fast SMA window
    pub fast_period: usize,
    /// Slow SMA window
    pub slow_period: usize,
    /// RSI lookback
    pub rsi_period: usize,
    /// RSI level above which a SELL is signalled
    pub rsi_overbought: f64,
    /// RSI level below which a BUY is signalled
    pub rsi_oversold: f64,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            strategy: "ma_crossover".to_string(),
            risk_per_trade: 0.01,
            max_daily_loss: 0.05,
            symbols: vec!["EURUSD".to_string()],
            news_window_minutes: 30,
            fast_period: 10,
            slow_period: 30,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

impl BotSettings {
    /// Apply a partial update, leaving unset fields untouched
    pub fn apply(&mut self, patch: &BotSettingsPatch) {
        if let Some(v) = &patch.strategy {
            self.strategy = v.clone();
        }
        if let Some(v) = patch.risk_per_trade {
            self.risk_per_trade = v;
        }
        if let Some(v) = patch.max_daily_loss {
            self.max_daily_loss = v;
        }
        if let Some(v) = &patch.symbols {
            self.symbols = v.clone();
        }
        if let Some(v) = patch.news_window_minutes {
            self.news_window_minutes = v;
        }
        if let Some(v) = patch.fast_period {
            self.fast_period = v;
        }
        if let Some(v) = patch.slow_period {
            self.slow_period = v;
        }
        if let Some(v) = patch.rsi_period {
            self.rsi_period = v;
        }
        if let Some(v) = patch.rsi_overbought {
            self.rsi_overbought = v;
        }
        if let Some(v) = patch.rsi_oversold {
            self.rsi_oversold = v;
        }
    }
}

/// Partial settings update; `None` fields are left as-is
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotSettingsPatch {
    pub strategy: Option<String>,
    pub risk_per_trade: Option<f64>,
    pub max_daily_loss: Option<f64>,
    pub symbols: Option<Vec<String>>,
    pub news_window_minutes: Option<u32>,
    pub fast_period: Option<usize>,
    pub slow_period: Option<usize>,
    pub rsi_period: Option<usize>,
    pub rsi_overbought: Option<f64>,
    pub rsi_oversold: Option<f64>,
}

// ────────────────────────────────────────────────
// Environment variable helpers
// ────────────────────────────────────────────────

fn get_env_string(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn get_env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(val) => val
            .parse()
            .with_context(|| format!("Invalid u64 for {}: {}", key, val)),
        Err(_) => Ok(default),
    }
}

fn get_env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(val) => val
            .parse()
            .with_context(|| format!("Invalid usize for {}: {}", key, val)),
        Err(_) => Ok(default),
    }
}

fn get_env_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(val) => val
            .parse()
            .with_context(|| format!("Invalid f64 for {}: {}", key, val)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut settings = BotSettings::default();
        let patch = BotSettingsPatch {
            risk_per_trade: Some(0.02),
            symbols: Some(vec!["GBPUSD".to_string(), "USDJPY".to_string()]),
            ..Default::default()
        };

        settings.apply(&patch);

        assert_eq!(settings.risk_per_trade, 0.02);
        assert_eq!(settings.symbols.len(), 2);
        // Untouched fields keep their defaults
        assert_eq!(settings.strategy, "ma_crossover");
        assert_eq!(settings.rsi_period, 14);
    }

    #[test]
    fn test_validate_rejects_small_history_cap() {
        let mut config = Config {
            engine: EngineConfig::default(),
            database: DatabaseConfig {
                sqlite_path: PathBuf::from(":memory:"),
            },
            logging: LoggingConfig {
                log_level: "info".to_string(),
            },
            paper: PaperConfig {
                account_id: "paper-001".to_string(),
                starting_balance: 100_000.0,
            },
        };
        assert!(config.validate().is_ok());

        config.engine.history_cap = 10;
        assert!(config.validate().is_err());
    }
}
