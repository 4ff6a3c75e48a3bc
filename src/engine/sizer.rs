//! Risk-based position sizing
//!
//! Converts an admitted signal into an order volume bounded by the
//! account's risk budget and a hard one-lot ceiling. Uses a fixed
//! 100,000 units-per-lot pip-value approximation for every instrument.

use log::debug;

use crate::engine::signal::TradingSignal;

/// Units per standard lot (pip-value approximation)
const UNITS_PER_LOT: f64 = 100_000.0;
/// Hard ceiling on computed volume, in lots
const MAX_LOT: f64 = 1.0;
/// Stop distance assumed when the signal carries no stop-loss
const DEFAULT_STOP_PCT: f64 = 0.005;

/// Sizes admitted signals against the account risk budget
#[derive(Debug, Clone, Copy)]
pub struct RiskSizer {
    /// Fraction of balance risked per trade (0.01 = 1%)
    risk_per_trade: f64,
}

impl RiskSizer {
    pub fn new(risk_per_trade: f64) -> Self {
        Self { risk_per_trade }
    }

    /// Order volume in lots, rounded to two decimals, capped at 1.0
    ///
    /// A result of 0.00 is returned as-is; the gateway rejects it and the
    /// rejection surfaces as an execution error.
    pub fn volume(&self, signal: &TradingSignal, balance: f64, current_price: f64) -> f64 {
        let risk_amount = balance * self.risk_per_trade;
        let stop_distance = match signal.stop_loss {
            Some(stop) => (current_price - stop).abs(),
            None => current_price * DEFAULT_STOP_PCT,
        };

        if stop_distance <= 0.0 {
            debug!("{}: zero stop distance, sizing at cap", signal.symbol);
            return MAX_LOT;
        }

        let raw = risk_amount / (stop_distance * UNITS_PER_LOT);
        let capped = raw.min(MAX_LOT);
        (capped * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signal::SignalAction;

    fn signal(stop_loss: Option<f64>) -> TradingSignal {
        TradingSignal {
            symbol: "EURUSD".to_string(),
            action: SignalAction::Buy,
            confidence: 0.7,
            reason: "test".to_string(),
            stop_loss,
            take_profit: None,
        }
    }

    #[test]
    fn test_default_stop_caps_at_one_lot() {
        // $100k balance, 1% risk, default 0.5% stop at 1.1000:
        // stop distance 0.0055, risk $1000, raw 1.818 → capped at 1.00
        let sizer = RiskSizer::new(0.01);
        let volume = sizer.volume(&signal(None), 100_000.0, 1.1000);
        assert_eq!(volume, 1.0);
    }

    #[test]
    fn test_explicit_stop_distance() {
        // risk $500, stop distance 0.0100 → 500 / 1000 = 0.5 lots
        let sizer = RiskSizer::new(0.01);
        let volume = sizer.volume(&signal(Some(1.0900)), 50_000.0, 1.1000);
        assert_eq!(volume, 0.5);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        // risk $123, stop distance 0.0055 → 0.2236... → 0.22
        let sizer = RiskSizer::new(0.01);
        let volume = sizer.volume(&signal(None), 12_300.0, 1.1000);
        assert_eq!(volume, 0.22);
    }

    #[test]
    fn test_tiny_balance_rounds_to_zero_lot() {
        // A 0.00 volume is not special-cased; the gateway rejects it
        let sizer = RiskSizer::new(0.01);
        let volume = sizer.volume(&signal(None), 100.0, 1.1000);
        assert_eq!(volume, 0.0);
    }

    #[test]
    fn test_never_exceeds_cap() {
        let sizer = RiskSizer::new(0.05);
        for balance in [1_000.0, 100_000.0, 10_000_000.0] {
            let volume = sizer.volume(&signal(None), balance, 1.1000);
            assert!(volume <= 1.0, "balance {} → volume {}", balance, volume);
            // Two-decimal invariant
            assert_eq!((volume * 100.0).round() / 100.0, volume);
        }
    }
}
