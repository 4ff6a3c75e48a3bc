//! Signal generation
//!
//! Produces at most one directional signal per symbol per evaluation from
//! the recorded price history and the strategy resolved from the settings
//! snapshot. Refuses to act below a hard minimum of recorded history,
//! independent of strategy parameters.

use log::debug;
use serde::Serialize;

use crate::config::BotSettings;
use crate::engine::indicators::{relative_strength_index, simple_moving_average};

/// MA-crossover confidence (fixed by the strategy)
const MA_CROSSOVER_CONFIDENCE: f64 = 0.7;
/// RSI-threshold confidence (fixed by the strategy)
const RSI_CONFIDENCE: f64 = 0.6;
/// Stop-loss distance as a fraction of current price
const STOP_LOSS_PCT: f64 = 0.005;
/// Take-profit distance as a fraction of current price
const TAKE_PROFIT_PCT: f64 = 0.01;

/// Direction of a generated signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Close,
}

/// Ephemeral output of one strategy evaluation
///
/// Consumed immediately by the admission controller; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSignal {
    pub symbol: String,
    pub action: SignalAction,
    /// In [0, 1]; gated against the admission confidence floor
    pub confidence: f64,
    pub reason: String,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Strategy resolved once per evaluation from the settings snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyKind {
    MaCrossover { fast: usize, slow: usize },
    RsiThreshold { period: usize, overbought: f64, oversold: f64 },
}

impl StrategyKind {
    /// Resolve the strategy name from settings
    ///
    /// Unrecognized names fall back to the MA crossover (explicit default,
    /// not an error).
    pub fn resolve(settings: &BotSettings) -> Self {
        match settings.strategy.as_str() {
            "rsi" | "rsi_threshold" => StrategyKind::RsiThreshold {
                period: settings.rsi_period,
                overbought: settings.rsi_overbought,
                oversold: settings.rsi_oversold,
            },
            "ma_crossover" => StrategyKind::MaCrossover {
                fast: settings.fast_period,
                slow: settings.slow_period,
            },
            other => {
                debug!("Unknown strategy '{}', falling back to MA crossover", other);
                StrategyKind::MaCrossover {
                    fast: settings.fast_period,
                    slow: settings.slow_period,
                }
            }
        }
    }
}

/// Turns recorded history into at most one signal per symbol per tick
pub struct SignalGenerator {
    /// Hard minimum-data guard, independent of strategy parameters
    min_history_len: usize,
}

impl SignalGenerator {
    pub fn new(min_history_len: usize) -> Self {
        Self { min_history_len }
    }

    /// Evaluate one symbol's history under the resolved strategy
    pub fn evaluate(
        &self,
        symbol: &str,
        series: &[f64],
        strategy: StrategyKind,
    ) -> Option<TradingSignal> {
        if series.len() < self.min_history_len {
            debug!(
                "{}: {} of {} prices recorded, holding off",
                symbol,
                series.len(),
                self.min_history_len
            );
            return None;
        }

        match strategy {
            StrategyKind::MaCrossover { fast, slow } => self.evaluate_crossover(symbol, series, fast, slow),
            StrategyKind::RsiThreshold {
                period,
                overbought,
                oversold,
            } => self.evaluate_rsi(symbol, series, period, overbought, oversold),
        }
    }

    /// Bullish/bearish crossover of fast vs slow SMA between the previous
    /// point and now
    fn evaluate_crossover(
        &self,
        symbol: &str,
        series: &[f64],
        fast: usize,
        slow: usize,
    ) -> Option<TradingSignal> {
        let current = *series.last()?;
        let previous = &series[..series.len() - 1];

        let fast_now = simple_moving_average(series, fast);
        let slow_now = simple_moving_average(series, slow);
        let fast_prev = simple_moving_average(previous, fast);
        let slow_prev = simple_moving_average(previous, slow);

        if fast_prev <= slow_prev && fast_now > slow_now {
            return Some(TradingSignal {
                symbol: symbol.to_string(),
                action: SignalAction::Buy,
                confidence: MA_CROSSOVER_CONFIDENCE,
                reason: format!(
                    "bullish crossover: fast SMA {:.5} crossed above slow SMA {:.5}",
                    fast_now, slow_now
                ),
                stop_loss: Some(current * (1.0 - STOP_LOSS_PCT)),
                take_profit: Some(current * (1.0 + TAKE_PROFIT_PCT)),
            });
        }
        if fast_prev >= slow_prev && fast_now < slow_now {
            return Some(TradingSignal {
                symbol: symbol.to_string(),
                action: SignalAction::Sell,
                confidence: MA_CROSSOVER_CONFIDENCE,
                reason: format!(
                    "bearish crossover: fast SMA {:.5} crossed below slow SMA {:.5}",
                    fast_now, slow_now
                ),
                stop_loss: Some(current * (1.0 + STOP_LOSS_PCT)),
                take_profit: Some(current * (1.0 - TAKE_PROFIT_PCT)),
            });
        }
        None
    }

    /// RSI beyond the configured bands; no stop attached (the sizer falls
    /// back to its default distance)
    fn evaluate_rsi(
        &self,
        symbol: &str,
        series: &[f64],
        period: usize,
        overbought: f64,
        oversold: f64,
    ) -> Option<TradingSignal> {
        let rsi = relative_strength_index(series, period);

        if rsi < oversold {
            return Some(TradingSignal {
                symbol: symbol.to_string(),
                action: SignalAction::Buy,
                confidence: RSI_CONFIDENCE,
                reason: format!("RSI {:.1} below oversold {:.1}", rsi, oversold),
                stop_loss: None,
                take_profit: None,
            });
        }
        if rsi > overbought {
            return Some(TradingSignal {
                symbol: symbol.to_string(),
                action: SignalAction::Sell,
                confidence: RSI_CONFIDENCE,
                reason: format!("RSI {:.1} above overbought {:.1}", rsi, overbought),
                stop_loss: None,
                take_profit: None,
            });
        }
        None
    }
}
