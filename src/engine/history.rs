//! Per-symbol bounded price history
//!
//! Append-only with FIFO eviction past the cap. Owned by exactly one
//! supervisor instance; discarded on stop.

use std::collections::{HashMap, VecDeque};

/// Bounded per-symbol sequence of observed bid prices
#[derive(Debug)]
pub struct PriceHistory {
    cap: usize,
    series: HashMap<String, VecDeque<f64>>,
}

impl PriceHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            series: HashMap::new(),
        }
    }

    /// Append one observation, evicting the oldest once the cap is reached
    pub fn record(&mut self, symbol: &str, price: f64) {
        let buf = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.cap.min(256)));
        buf.push_back(price);
        while buf.len() > self.cap {
            buf.pop_front();
        }
    }

    /// Current sequence in observation order; empty for unknown symbols
    pub fn get(&self, symbol: &str) -> Vec<f64> {
        self.series
            .get(symbol)
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of recorded observations for a symbol
    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_symbol_is_empty() {
        let history = PriceHistory::new(200);
        assert!(history.get("EURUSD").is_empty());
        assert!(history.is_empty("EURUSD"));
    }

    #[test]
    fn test_record_preserves_order() {
        let mut history = PriceHistory::new(200);
        history.record("EURUSD", 1.1);
        history.record("EURUSD", 1.2);
        history.record("EURUSD", 1.3);
        assert_eq!(history.get("EURUSD"), vec![1.1, 1.2, 1.3]);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut history = PriceHistory::new(3);
        for price in [1.0, 2.0, 3.0, 4.0, 5.0] {
            history.record("EURUSD", price);
        }
        assert_eq!(history.get("EURUSD"), vec![3.0, 4.0, 5.0]);
        assert_eq!(history.len("EURUSD"), 3);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut history = PriceHistory::new(2);
        history.record("EURUSD", 1.1);
        history.record("GBPUSD", 1.3);
        history.record("EURUSD", 1.2);
        assert_eq!(history.get("EURUSD"), vec![1.1, 1.2]);
        assert_eq!(history.get("GBPUSD"), vec![1.3]);
    }
}
