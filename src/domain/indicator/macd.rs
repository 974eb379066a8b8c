//! MACD (Moving Average Convergence Divergence).
//!
//! DIF = EMA(C, fast) - EMA(C, slow)
//! DEA = EMA(DIF, signal)
//! Histogram = (DIF - DEA) * 2
//!
//! EMAs are the recursive form seeded with the first close, so the lines exist
//! from bar 0; callers mask them behind the series warm-up.

use crate::domain::rolling::{ewm_span, rolling_mean};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub struct MacdLines {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub histogram: Vec<f64>,
    /// Rolling mean of DIF, used as a trend filter.
    pub dif_trend: Vec<f64>,
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
    trend_window: usize,
) -> MacdLines {
    let ema_fast = ewm_span(closes, fast as f64, false);
    let ema_slow = ewm_span(closes, slow as f64, false);

    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let dea = ewm_span(&dif, signal as f64, false);
    let histogram = dif
        .iter()
        .zip(dea.iter())
        .map(|(d, e)| (d - e) * 2.0)
        .collect();
    let dif_trend = rolling_mean(&dif, trend_window);

    MacdLines {
        dif,
        dea,
        histogram,
        dif_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_flat_prices_are_zero() {
        let closes = vec![10.0; 30];
        let lines = calculate_macd(&closes, 12, 26, 9, 5);
        assert!(lines.dif.iter().all(|v| v.abs() < 1e-12));
        assert!(lines.dea.iter().all(|v| v.abs() < 1e-12));
        assert!(lines.histogram.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn macd_rising_prices_positive_dif() {
        let closes: Vec<f64> = (0..40).map(|i| 10.0 + i as f64 * 0.1).collect();
        let lines = calculate_macd(&closes, 12, 26, 9, 5);
        assert!(lines.dif[39] > 0.0);
        assert!(lines.dif[39] > lines.dea[39]);
        assert!(lines.histogram[39] > 0.0);
    }

    #[test]
    fn macd_first_step_by_hand() {
        let closes = vec![10.0, 11.0];
        let lines = calculate_macd(&closes, 12, 26, 9, 2);
        let fast = 10.0 + (2.0 / 13.0) * 1.0;
        let slow = 10.0 + (2.0 / 27.0) * 1.0;
        let dif = fast - slow;
        let dea = 0.0 + (2.0 / 10.0) * dif;
        assert!((lines.dif[1] - dif).abs() < 1e-12);
        assert!((lines.dea[1] - dea).abs() < 1e-12);
        assert!((lines.histogram[1] - (dif - dea) * 2.0).abs() < 1e-12);
        assert!(lines.dif_trend[0].is_nan());
        assert!((lines.dif_trend[1] - dif / 2.0).abs() < 1e-12);
    }
}
