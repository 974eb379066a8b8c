//! KDJ stochastic oscillator (K and D lines).
//!
//! RSV = (C - LLV(L, n)) / (HHV(H, n) - LLV(L, n)) * 100
//! K = EWM(RSV, com), D = EWM(K, com)
//!
//! A flat window (HHV == LLV) leaves RSV undefined for that bar; the
//! smoothing then carries the previous K forward.

use crate::domain::rolling::{ewm_com, rolling_max, rolling_min};

pub const DEFAULT_WINDOW: usize = 9;
pub const DEFAULT_COM: f64 = 2.0;

pub struct KdjLines {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_rsv(highs: &[f64], lows: &[f64], closes: &[f64], window: usize) -> Vec<f64> {
    let lowest = rolling_min(lows, window);
    let highest = rolling_max(highs, window);

    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let range = highest[i] - lowest[i];
            if range.is_nan() || range == 0.0 {
                f64::NAN
            } else {
                (c - lowest[i]) / range * 100.0
            }
        })
        .collect()
}

pub fn calculate_kdj(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    window: usize,
    com: f64,
    adjust: bool,
) -> KdjLines {
    let rsv = calculate_rsv(highs, lows, closes, window);
    let k = ewm_com(&rsv, com, adjust);
    let d = ewm_com(&k, com, adjust);
    KdjLines { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsv_undefined_before_window() {
        let highs = vec![11.0; 12];
        let lows = vec![9.0; 12];
        let closes = vec![10.0; 12];
        let rsv = calculate_rsv(&highs, &lows, &closes, 9);
        assert!(rsv[7].is_nan());
        assert!((rsv[8] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rsv_flat_window_is_undefined() {
        let flat = vec![10.0; 10];
        let rsv = calculate_rsv(&flat, &flat, &flat, 9);
        assert!(rsv[9].is_nan());
    }

    #[test]
    fn rsv_close_at_high_is_100() {
        let highs: Vec<f64> = (0..9).map(|i| 10.0 + i as f64).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
        let closes = highs.clone();
        let rsv = calculate_rsv(&highs, &lows, &closes, 9);
        assert!((rsv[8] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn kdj_constant_rsv_converges() {
        let highs = vec![11.0; 20];
        let lows = vec![9.0; 20];
        let closes = vec![10.0; 20];
        let lines = calculate_kdj(&highs, &lows, &closes, 9, 2.0, true);
        assert!(lines.k[7].is_nan());
        assert!((lines.k[19] - 50.0).abs() < 1e-9);
        assert!((lines.d[19] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn kdj_stays_in_bounds() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 10.0 + ((i * 13) % 17) as f64 * 0.2)
            .collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.3).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.3).collect();
        let lines = calculate_kdj(&highs, &lows, &closes, 9, 2.0, true);
        for v in lines.k.iter().chain(lines.d.iter()).filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v));
        }
    }
}
