//! Signal admission control
//!
//! Three independent gates between a generated signal and execution:
//! confidence floor, per-symbol cooldown, and the news-avoidance check.
//! Any gate failing discards the signal with no partial effects; the
//! cooldown timestamp moves only on admission, never on discard.

use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::signal::TradingSignal;
use crate::error::EngineError;
use crate::gateway::NewsCalendar;

/// Outcome of running a signal through the gates
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// All gates passed; the cooldown timestamp has been advanced
    Admitted,
    /// Confidence below floor or cooldown still active
    Rejected { reason: String },
    /// High-impact event inside the avoidance window; caller raises NewsPause
    NewsBlocked { reason: String },
}

/// Gates generated signals on confidence, cooldown, and news
pub struct AdmissionController {
    min_confidence: f64,
    cooldown_secs: u64,
    /// symbol → epoch seconds of the last admitted signal
    last_admitted: Mutex<HashMap<String, u64>>,
}

impl AdmissionController {
    pub fn new(min_confidence: f64, cooldown_secs: u64) -> Self {
        Self {
            min_confidence,
            cooldown_secs,
            last_admitted: Mutex::new(HashMap::new()),
        }
    }

    /// Run all three gates against a signal
    ///
    /// The news query is the only external call; the cooldown
    /// read-modify-write happens under one lock so two concurrent
    /// evaluations of the same symbol can never both admit.
    pub async fn admit(
        &self,
        signal: &TradingSignal,
        calendar: &dyn NewsCalendar,
        news_window_minutes: u32,
    ) -> Result<AdmissionDecision, EngineError> {
        self.admit_at(signal, calendar, news_window_minutes, now_secs())
            .await
    }

    /// Same as [`admit`](Self::admit) with an explicit clock, so tests can
    /// drive time without sleeping
    pub async fn admit_at(
        &self,
        signal: &TradingSignal,
        calendar: &dyn NewsCalendar,
        news_window_minutes: u32,
        now: u64,
    ) -> Result<AdmissionDecision, EngineError> {
        // 1. Confidence floor
        if signal.confidence < self.min_confidence {
            return Ok(AdmissionDecision::Rejected {
                reason: format!(
                    "confidence {:.2} below floor {:.2}",
                    signal.confidence, self.min_confidence
                ),
            });
        }

        // 2. Cooldown pre-check without taking the admission slot
        if let Some(remaining) = self.cooldown_remaining(&signal.symbol, now) {
            return Ok(AdmissionDecision::Rejected {
                reason: format!("cooldown active: {}s remaining", remaining),
            });
        }

        // 3. News gate
        let currencies = symbol_currencies(&signal.symbol);
        if !currencies.is_empty()
            && calendar
                .has_high_impact_event(&currencies, news_window_minutes)
                .await?
        {
            return Ok(AdmissionDecision::NewsBlocked {
                reason: format!(
                    "high-impact event within {} minutes for {}",
                    news_window_minutes,
                    currencies.join("/")
                ),
            });
        }

        // Commit: re-check and advance the cooldown under one lock
        let mut map = self
            .last_admitted
            .lock()
            .map_err(|_| EngineError::Data("cooldown map poisoned".to_string()))?;
        if let Some(last) = map.get(&signal.symbol) {
            if now.saturating_sub(*last) < self.cooldown_secs {
                let remaining = self.cooldown_secs - now.saturating_sub(*last);
                return Ok(AdmissionDecision::Rejected {
                    reason: format!("cooldown active: {}s remaining", remaining),
                });
            }
        }
        map.insert(signal.symbol.clone(), now);
        debug!("{}: signal admitted ({})", signal.symbol, signal.reason);
        Ok(AdmissionDecision::Admitted)
    }

    fn cooldown_remaining(&self, symbol: &str, now: u64) -> Option<u64> {
        let map = self.last_admitted.lock().ok()?;
        let last = map.get(symbol)?;
        let elapsed = now.saturating_sub(*last);
        if elapsed < self.cooldown_secs {
            Some(self.cooldown_secs - elapsed)
        } else {
            None
        }
    }
}

/// Derive the two 3-letter currency codes from a 6-letter pair symbol
///
/// Non-standard symbols yield an empty list, which skips the news gate.
pub fn symbol_currencies(symbol: &str) -> Vec<String> {
    let code: String = symbol.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if code.len() < 6 {
        return Vec::new();
    }
    vec![code[..3].to_uppercase(), code[3..6].to_uppercase()]
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signal::SignalAction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCalendar {
        high_impact: bool,
        queries: AtomicUsize,
    }

    impl FixedCalendar {
        fn quiet() -> Self {
            Self {
                high_impact: false,
                queries: AtomicUsize::new(0),
            }
        }

        fn busy() -> Self {
            Self {
                high_impact: true,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsCalendar for FixedCalendar {
        async fn has_high_impact_event(
            &self,
            _currencies: &[String],
            _within_minutes: u32,
        ) -> Result<bool, EngineError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.high_impact)
        }
    }

    fn signal(confidence: f64) -> TradingSignal {
        TradingSignal {
            symbol: "EURUSD".to_string(),
            action: SignalAction::Buy,
            confidence,
            reason: "test".to_string(),
            stop_loss: None,
            take_profit: None,
        }
    }

    #[test]
    fn test_symbol_currency_derivation() {
        assert_eq!(symbol_currencies("EURUSD"), vec!["EUR", "USD"]);
        assert_eq!(symbol_currencies("gbpjpy"), vec!["GBP", "JPY"]);
        assert!(symbol_currencies("BTC").is_empty());
    }

    #[tokio::test]
    async fn test_low_confidence_rejected_before_news_query() {
        let controller = AdmissionController::new(0.5, 300);
        let calendar = FixedCalendar::quiet();

        let decision = controller
            .admit_at(&signal(0.4), &calendar, 30, 1000)
            .await
            .unwrap();
        assert!(matches!(decision, AdmissionDecision::Rejected { .. }));
        assert_eq!(calendar.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_second_signal_within_window() {
        let controller = AdmissionController::new(0.5, 300);
        let calendar = FixedCalendar::quiet();

        let first = controller
            .admit_at(&signal(0.9), &calendar, 30, 1000)
            .await
            .unwrap();
        assert_eq!(first, AdmissionDecision::Admitted);

        // 299 seconds later: still inside the window, any confidence
        let second = controller
            .admit_at(&signal(1.0), &calendar, 30, 1299)
            .await
            .unwrap();
        assert!(matches!(second, AdmissionDecision::Rejected { .. }));

        // 300 seconds after the first admission: allowed again
        let third = controller
            .admit_at(&signal(0.7), &calendar, 30, 1300)
            .await
            .unwrap();
        assert_eq!(third, AdmissionDecision::Admitted);
    }

    #[tokio::test]
    async fn test_news_block_does_not_consume_cooldown() {
        let controller = AdmissionController::new(0.5, 300);
        let busy = FixedCalendar::busy();
        let quiet = FixedCalendar::quiet();

        let blocked = controller
            .admit_at(&signal(0.9), &busy, 30, 1000)
            .await
            .unwrap();
        assert!(matches!(blocked, AdmissionDecision::NewsBlocked { .. }));

        // The discard must not have started a cooldown
        let admitted = controller
            .admit_at(&signal(0.9), &quiet, 30, 1001)
            .await
            .unwrap();
        assert_eq!(admitted, AdmissionDecision::Admitted);
    }

    #[tokio::test]
    async fn test_cooldowns_are_per_symbol() {
        let controller = AdmissionController::new(0.5, 300);
        let calendar = FixedCalendar::quiet();

        let mut eur = signal(0.9);
        let mut gbp = signal(0.9);
        gbp.symbol = "GBPUSD".to_string();

        assert_eq!(
            controller.admit_at(&eur, &calendar, 30, 1000).await.unwrap(),
            AdmissionDecision::Admitted
        );
        assert_eq!(
            controller.admit_at(&gbp, &calendar, 30, 1001).await.unwrap(),
            AdmissionDecision::Admitted
        );

        eur.confidence = 1.0;
        assert!(matches!(
            controller.admit_at(&eur, &calendar, 30, 1002).await.unwrap(),
            AdmissionDecision::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn test_calendar_failure_propagates_as_error() {
        struct FailingCalendar;
        #[async_trait]
        impl NewsCalendar for FailingCalendar {
            async fn has_high_impact_event(
                &self,
                _currencies: &[String],
                _within_minutes: u32,
            ) -> Result<bool, EngineError> {
                Err(EngineError::Connectivity("calendar down".to_string()))
            }
        }

        let controller = AdmissionController::new(0.5, 300);
        let err = controller
            .admit_at(&signal(0.9), &FailingCalendar, 30, 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Connectivity(_)));
    }
}
