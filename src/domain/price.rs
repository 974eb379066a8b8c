//! Daily price bars and per-security series.

use crate::domain::error::RevscanError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Turnover rate in percent.
    pub turnover: Option<f64>,
    /// Traded amount in currency units.
    pub amount: Option<f64>,
}

impl PriceBar {
    /// Percent move from `base` to `price`.
    pub fn pct_from(base: f64, price: f64) -> f64 {
        (price - base) / base * 100.0
    }
}

/// An ordered series of daily bars for one security.
///
/// Construction validates that dates are strictly increasing, that prices
/// are positive and that open and close lie within the day's low-high range.
/// The bars are immutable afterwards.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    code: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(code: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, RevscanError> {
        let code = code.into();

        for (i, bar) in bars.iter().enumerate() {
            if !(bar.open > 0.0 && bar.high > 0.0 && bar.low > 0.0 && bar.close > 0.0) {
                return Err(RevscanError::MalformedSeries {
                    code,
                    reason: format!("non-positive price on {}", bar.date),
                });
            }
            let range = bar.low..=bar.high;
            if !(range.contains(&bar.open) && range.contains(&bar.close)) {
                return Err(RevscanError::MalformedSeries {
                    code,
                    reason: format!(
                        "open {} or close {} outside low-high range [{}, {}] on {}",
                        bar.open, bar.close, bar.low, bar.high, bar.date
                    ),
                });
            }
            if bar.volume < 0 {
                return Err(RevscanError::MalformedSeries {
                    code,
                    reason: format!("negative volume on {}", bar.date),
                });
            }
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(RevscanError::MalformedSeries {
                    code,
                    reason: format!(
                        "dates not strictly increasing at {} (after {})",
                        bar.date,
                        bars[i - 1].date
                    ),
                });
            }
        }

        Ok(Self { code, bars })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index)
    }

    /// The first `len` bars as a new series.
    pub fn truncated(&self, len: usize) -> PriceSeries {
        PriceSeries {
            code: self.code.clone(),
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }

    /// Turnover column with missing rows as NaN.
    pub fn turnovers(&self) -> Vec<f64> {
        self.bars
            .iter()
            .map(|b| b.turnover.unwrap_or(f64::NAN))
            .collect()
    }
}
