//! Indicator engine: derives one [`IndicatorSnapshot`] per bar.
//!
//! Indicators are computed column-wise from the [`rolling`](crate::domain::rolling)
//! primitives and then sliced into per-bar snapshots. Every derived value is
//! an `Option<f64>`: `None` before the series warm-up, and `None` wherever a
//! window is incomplete or a denominator is zero. Snapshot `i` depends only on
//! bars `0..=i`.

pub mod kdj;
pub mod macd;
pub mod rsi;

use crate::domain::price::{PriceBar, PriceSeries};
use crate::domain::rolling::{
    diff, obv, rolling_max, rolling_mean, rolling_slope, safe_div, shift,
};
use chrono::NaiveDate;

/// Window lengths and smoothing parameters for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub ma_short: usize,
    pub ma_mid: usize,
    pub ma_long: usize,
    pub ma_trend: usize,
    pub rsi_period: usize,
    pub kdj_window: usize,
    pub kdj_com: f64,
    /// Normalised (`true`) or recursive (`false`) KDJ smoothing.
    pub kdj_adjust: bool,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub dif_trend_window: usize,
    pub volume_window: usize,
    pub turnover_window: usize,
    pub breakout_window: usize,
    pub slope_window: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            ma_short: 5,
            ma_mid: 10,
            ma_long: 20,
            ma_trend: 60,
            rsi_period: rsi::DEFAULT_PERIOD,
            kdj_window: kdj::DEFAULT_WINDOW,
            kdj_com: kdj::DEFAULT_COM,
            kdj_adjust: true,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            dif_trend_window: 60,
            volume_window: 5,
            turnover_window: 30,
            breakout_window: 40,
            slope_window: 5,
        }
    }
}

impl WindowConfig {
    /// Number of bars needed before every indicator is defined.
    ///
    /// Lagged columns (volume baseline, prior high) need one extra bar.
    pub fn warmup_len(&self) -> usize {
        [
            self.ma_short,
            self.ma_mid,
            self.ma_long,
            self.ma_trend,
            self.rsi_period,
            self.kdj_window,
            self.macd_slow,
            self.dif_trend_window,
            self.volume_window + 1,
            self.turnover_window,
            self.breakout_window + 1,
            self.ma_short + self.slope_window - 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
        .max(2)
    }
}

/// Derived indicator values for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: Option<f64>,
    /// Close-to-close change in percent.
    pub change_pct: Option<f64>,
    pub rsi: Option<f64>,
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    /// MA5[i] - MA5[i-1].
    pub ma5_delta: Option<f64>,
    /// Least-squares slope of the trailing MA5 values.
    pub ma5_slope: Option<f64>,
    /// (C - MA20) / MA20 * 100.
    pub bias20: Option<f64>,
    /// Mean volume of the previous `volume_window` bars.
    pub volume_baseline: Option<f64>,
    /// Volume / lagged volume baseline.
    pub volume_ratio: Option<f64>,
    pub avg_turnover: Option<f64>,
    pub dif: Option<f64>,
    pub dea: Option<f64>,
    pub macd_hist: Option<f64>,
    pub dif_trend: Option<f64>,
    /// Highest high of the `breakout_window` bars before this one.
    pub prior_high: Option<f64>,
    pub obv: Option<f64>,
    /// (MA60 - C) / C * 100.
    pub profit_potential: Option<f64>,
}

fn defined(value: f64) -> Option<f64> {
    if value.is_finite() { Some(value) } else { None }
}

/// Compute one snapshot per bar.
pub fn compute(series: &PriceSeries, config: &WindowConfig) -> Vec<IndicatorSnapshot> {
    let bars = series.bars();
    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();
    let volumes = series.volumes();

    let rsi = rsi::calculate_rsi(&closes, config.rsi_period);
    let kdj = kdj::calculate_kdj(
        &highs,
        &lows,
        &closes,
        config.kdj_window,
        config.kdj_com,
        config.kdj_adjust,
    );
    let macd = macd::calculate_macd(
        &closes,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
        config.dif_trend_window,
    );

    let ma5 = rolling_mean(&closes, config.ma_short);
    let ma10 = rolling_mean(&closes, config.ma_mid);
    let ma20 = rolling_mean(&closes, config.ma_long);
    let ma60 = rolling_mean(&closes, config.ma_trend);
    let ma5_delta = diff(&ma5);
    let ma5_slope = rolling_slope(&ma5, config.slope_window);

    let volume_baseline = rolling_mean(&shift(&volumes, 1), config.volume_window);
    let avg_turnover = rolling_mean(&series.turnovers(), config.turnover_window);
    let prior_high = rolling_max(&shift(&highs, 1), config.breakout_window);
    let obv = obv(&closes, &volumes);
    let prev_close = shift(&closes, 1);

    let first_valid = config.warmup_len() - 1;

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let warm = i >= first_valid;
            let v = |x: f64| if warm { defined(x) } else { None };
            let close = bar.close;

            IndicatorSnapshot {
                index: i,
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close,
                volume: volumes[i],
                amount: bar.amount,
                change_pct: v(safe_div(close - prev_close[i], prev_close[i]) * 100.0),
                rsi: v(rsi[i]),
                k: v(kdj.k[i]),
                d: v(kdj.d[i]),
                ma5: v(ma5[i]),
                ma10: v(ma10[i]),
                ma20: v(ma20[i]),
                ma60: v(ma60[i]),
                ma5_delta: v(ma5_delta[i]),
                ma5_slope: v(ma5_slope[i]),
                bias20: v(safe_div(close - ma20[i], ma20[i]) * 100.0),
                volume_baseline: v(volume_baseline[i]),
                volume_ratio: v(safe_div(volumes[i], volume_baseline[i])),
                avg_turnover: v(avg_turnover[i]),
                dif: v(macd.dif[i]),
                dea: v(macd.dea[i]),
                macd_hist: v(macd.histogram[i]),
                dif_trend: v(macd.dif_trend[i]),
                prior_high: v(prior_high[i]),
                obv: v(obv[i]),
                profit_potential: v(safe_div(ma60[i] - close, close) * 100.0),
            }
        })
        .collect()
}

/// Snapshot of the last bar of the series, if any.
pub fn latest(series: &PriceSeries, config: &WindowConfig) -> Option<IndicatorSnapshot> {
    compute(series, config).pop()
}

/// Percent gap between `prev_close` and the open of `bar`.
pub fn open_gap_pct(prev_close: f64, bar: &PriceBar) -> f64 {
    PriceBar::pct_from(prev_close, bar.open)
}
