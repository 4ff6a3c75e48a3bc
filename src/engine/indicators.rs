//! Indicator math
//!
//! Pure functions over an ordered price series. Degenerate inputs never
//! error: they yield neutral values, and the signal generator refuses to
//! act on histories that are too short to trust.

/// Average of the last `period` values
///
/// Averages whatever is available when the series is shorter than `period`;
/// 0.0 on an empty series. Callers that need a strict window must gate on
/// length themselves.
pub fn simple_moving_average(series: &[f64], period: usize) -> f64 {
    if series.is_empty() || period == 0 {
        return 0.0;
    }
    let window = &series[series.len().saturating_sub(period)..];
    window.iter().sum::<f64>() / window.len() as f64
}

/// Wilder-style RSI over the last `period` price changes
///
/// Neutral 50.0 when fewer than `period + 1` points exist or the window is
/// flat; 100.0 when there are gains and no losses.
pub fn relative_strength_index(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period + 1 {
        return 50.0;
    }

    let window = &series[series.len() - period - 1..];
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain_sum += delta;
        } else {
            loss_sum += -delta;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0;
        }
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_full_window() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(simple_moving_average(&series, 3), 4.0);
        assert_eq!(simple_moving_average(&series, 5), 3.0);
    }

    #[test]
    fn test_sma_short_series_averages_available() {
        let series = vec![2.0, 4.0];
        assert_eq!(simple_moving_average(&series, 10), 3.0);
    }

    #[test]
    fn test_sma_empty_is_zero() {
        assert_eq!(simple_moving_average(&[], 5), 0.0);
    }

    #[test]
    fn test_rsi_insufficient_data_is_neutral() {
        let series: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        assert_eq!(relative_strength_index(&series, 14), 50.0);
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        let series = vec![1.1; 20];
        assert_eq!(relative_strength_index(&series, 14), 50.0);
    }

    #[test]
    fn test_rsi_monotone_up_is_100() {
        let series: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.001).collect();
        assert_eq!(relative_strength_index(&series, 14), 100.0);
    }

    #[test]
    fn test_rsi_monotone_down_approaches_0() {
        let series: Vec<f64> = (0..30).map(|i| 2.0 - i as f64 * 0.001).collect();
        let rsi = relative_strength_index(&series, 14);
        assert!(rsi < 1e-9, "expected ~0, got {}", rsi);
    }

    #[test]
    fn test_rsi_mixed_window_in_range() {
        let series = vec![
            1.0, 1.02, 1.01, 1.03, 1.02, 1.04, 1.03, 1.05, 1.04, 1.06, 1.05, 1.07, 1.06, 1.08,
            1.07, 1.09,
        ];
        let rsi = relative_strength_index(&series, 14);
        assert!(rsi > 50.0 && rsi < 100.0, "got {}", rsi);
    }
}
