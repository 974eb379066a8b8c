#![allow(dead_code)]

use chrono::NaiveDate;
use revscan::domain::backtest::BacktestConfig;
use revscan::domain::error::RevscanError;
pub use revscan::domain::price::{PriceBar, PriceSeries};
use revscan::domain::signal::{Band, FilterProfile, MomentumFilter};
use revscan::ports::series_source::SeriesSource;
use std::collections::HashMap;

pub struct MockSeriesSource {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockSeriesSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl SeriesSource for MockSeriesSource {
    fn list_codes(&self) -> Result<Vec<String>, RevscanError> {
        let mut codes: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        codes.sort();
        Ok(codes)
    }

    fn load(&self, code: &str) -> Result<PriceSeries, RevscanError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(RevscanError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(code)
            .cloned()
            .ok_or_else(|| RevscanError::DataSource {
                reason: format!("no data for {code}"),
            })?;
        PriceSeries::new(code, bars)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(i: usize) -> NaiveDate {
    date(2023, 1, 2) + chrono::Duration::days(i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: i64) -> PriceBar {
    PriceBar {
        date: day(i),
        open,
        high,
        low,
        close,
        volume,
        turnover: Some(1.0),
        amount: Some(close * volume as f64 * 100.0),
    }
}

/// A bar that opens, peaks and bottoms within `spread` of `close`.
pub fn flat_bar(i: usize, close: f64, spread: f64) -> PriceBar {
    make_bar(i, close, close + spread, close - spread, close, 1000)
}

/// Deterministic oscillating series, `count` bars starting at `start_price`.
pub fn generate_bars(count: usize, start_price: f64) -> Vec<PriceBar> {
    (0..count)
        .map(|i| {
            let wave = ((i * 7) % 11) as f64 - 5.0;
            let drift = (i / 25) as f64 * 0.15;
            let close = start_price + wave * 0.12 - drift;
            make_bar(
                i,
                close - 0.03,
                close + 0.15,
                close - 0.15,
                close,
                1000 + ((i * 3) % 7) as i64 * 100,
            )
        })
        .collect()
}

/// Steady decline with a bounce every 13 bars; produces deeply oversold days.
pub fn generate_selloff(count: usize, start_price: f64) -> Vec<PriceBar> {
    let mut close = start_price;
    (0..count)
        .map(|i| {
            let prev = close;
            close *= if i % 13 == 12 { 1.03 } else { 0.992 };
            let volume = if i % 13 == 12 { 1400 } else { 1000 };
            make_bar(
                i,
                prev,
                prev.max(close) * 1.004,
                prev.min(close) * 0.996,
                close,
                volume,
            )
        })
        .collect()
}

pub fn series(code: &str, bars: Vec<PriceBar>) -> PriceSeries {
    PriceSeries::new(code, bars).unwrap()
}

/// Oversold on RSI alone.
pub fn rsi_only_profile(max_rsi: f64) -> FilterProfile {
    FilterProfile {
        momentum: MomentumFilter {
            rsi: Some(Band::at_most(max_rsi)),
            kdj_k: None,
            kdj_golden_cross: false,
        },
        ..FilterProfile::permissive("rsi_only")
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        workers: 2,
        ..BacktestConfig::default()
    }
}
