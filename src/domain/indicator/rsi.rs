//! RSI (Relative Strength Index) over simple rolling averages.
//!
//! gain[i] = max(C[i] - C[i-1], 0), loss[i] = max(C[i-1] - C[i], 0)
//! with the first change counted as zero movement.
//! RSI = 100 - 100 / (1 + mean(gain, n) / mean(loss, n))
//! If mean(loss, n) == 0: RSI = 100
//!
//! Warmup: first n-1 bars are undefined.

use crate::domain::rolling::rolling_mean;

pub const DEFAULT_PERIOD: usize = 6;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let change = if i == 0 {
            0.0
        } else {
            closes[i] - closes[i - 1]
        };
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(&gain, &loss)| {
            if gain.is_nan() || loss.is_nan() {
                f64::NAN
            } else if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect()
}
