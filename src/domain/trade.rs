//! Forward trade simulation under a fixed exit policy.
//!
//! One [`OpenTrade`] walks forward from the entry bar one day at a time. On
//! each day the running peak is updated with the day's high, then the exit
//! rules are checked in priority order:
//!
//! 1. stop-loss on the day's low (return pinned to the threshold)
//! 2. life-line on the configured day (actual close return)
//! 3. trailing stop once the peak return reached the trigger
//!
//! A trade still open when the horizon (or the series) runs out expires at
//! the close of the last bar it reached.

use crate::domain::error::RevscanError;
use crate::domain::price::{PriceBar, PriceSeries};
use chrono::NaiveDate;
use std::fmt;

/// Early exit on a fixed day when the trade has not confirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifeLine {
    /// Trading day after entry on which the check runs (1-based).
    pub day: usize,
    /// Minimum close return in percent required on that day.
    pub threshold: f64,
}

/// Exit rule parameters. All returns are percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPolicy {
    pub stop_loss: f64,
    pub trailing_trigger: f64,
    /// Fraction of the peak gain given back that closes the trade.
    pub trailing_drawback: f64,
    /// Minimum reported return on a trailing exit.
    pub trailing_floor: Option<f64>,
    pub life_line: Option<LifeLine>,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy {
            stop_loss: -5.0,
            trailing_trigger: 10.0,
            trailing_drawback: 0.3,
            trailing_floor: Some(2.0),
            life_line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    StoppedOut,
    LifeLineExit,
    TrailingStopExit,
    HorizonExpired,
}

impl ExitReason {
    pub const ALL: [ExitReason; 4] = [
        ExitReason::StoppedOut,
        ExitReason::LifeLineExit,
        ExitReason::TrailingStopExit,
        ExitReason::HorizonExpired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StoppedOut => "STOPPED_OUT",
            ExitReason::LifeLineExit => "LIFE_LINE_EXIT",
            ExitReason::TrailingStopExit => "TRAILING_STOP_EXIT",
            ExitReason::HorizonExpired => "HORIZON_EXPIRED",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one (entry, horizon) simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrade {
    pub code: String,
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub horizon: usize,
    pub exit_index: usize,
    pub exit_date: NaiveDate,
    pub exit_reason: ExitReason,
    pub return_pct: f64,
    /// Highest high-based return reached while the trade was open.
    pub peak_return: f64,
    /// Next day's open relative to the entry close, in percent.
    pub next_open_gap: Option<f64>,
}

impl SimulatedTrade {
    pub fn holding_days(&self) -> usize {
        self.exit_index - self.entry_index
    }

    pub fn is_win(&self) -> bool {
        self.return_pct > 0.0
    }
}

/// Running state of a trade between entry and exit.
#[derive(Debug, Clone)]
pub struct OpenTrade<'a> {
    policy: &'a ExitPolicy,
    entry_price: f64,
    peak_price: f64,
    days_held: usize,
}

impl<'a> OpenTrade<'a> {
    pub fn new(entry_price: f64, policy: &'a ExitPolicy) -> Self {
        OpenTrade {
            policy,
            entry_price,
            peak_price: entry_price,
            days_held: 0,
        }
    }

    pub fn peak_return(&self) -> f64 {
        PriceBar::pct_from(self.entry_price, self.peak_price)
    }

    /// Advance one trading day. Returns the exit reason and realised return
    /// if the trade closes on `bar`.
    pub fn step(&mut self, bar: &PriceBar) -> Option<(ExitReason, f64)> {
        self.days_held += 1;
        if bar.high > self.peak_price {
            self.peak_price = bar.high;
        }

        let policy = self.policy;
        let low_return = PriceBar::pct_from(self.entry_price, bar.low);
        if low_return <= policy.stop_loss {
            return Some((ExitReason::StoppedOut, policy.stop_loss));
        }

        let close_return = PriceBar::pct_from(self.entry_price, bar.close);

        if let Some(life_line) = policy.life_line {
            if self.days_held == life_line.day && close_return < life_line.threshold {
                return Some((ExitReason::LifeLineExit, close_return));
            }
        }

        if self.peak_return() >= policy.trailing_trigger {
            let gain = self.peak_price - self.entry_price;
            let drawback = (self.peak_price - bar.close) / gain;
            if drawback >= policy.trailing_drawback {
                let ret = match policy.trailing_floor {
                    Some(floor) => close_return.max(floor),
                    None => close_return,
                };
                return Some((ExitReason::TrailingStopExit, ret));
            }
        }

        None
    }
}

/// Simulate a trade entered at the close of `entry_index` and held for at
/// most `horizon` trading days.
pub fn simulate(
    series: &PriceSeries,
    entry_index: usize,
    horizon: usize,
    policy: &ExitPolicy,
) -> Result<SimulatedTrade, RevscanError> {
    let fail = |reason: String| RevscanError::Simulation {
        code: series.code().to_string(),
        index: entry_index,
        reason,
    };

    if horizon == 0 {
        return Err(fail("horizon must be at least one day".into()));
    }
    let entry = series
        .bar(entry_index)
        .ok_or_else(|| fail(format!("entry beyond series of {} bars", series.len())))?;
    if entry_index + 1 >= series.len() {
        return Err(fail("no bar after entry to hold through".into()));
    }

    let mut trade = OpenTrade::new(entry.close, policy);
    let last = (entry_index + horizon).min(series.len() - 1);
    let bars = series.bars();
    let next_open_gap = bars
        .get(entry_index + 1)
        .map(|next| PriceBar::pct_from(entry.close, next.open));

    let make = |exit_index: usize, reason: ExitReason, return_pct: f64, peak: f64| SimulatedTrade {
        code: series.code().to_string(),
        entry_index,
        entry_date: entry.date,
        entry_price: entry.close,
        horizon,
        exit_index,
        exit_date: bars[exit_index].date,
        exit_reason: reason,
        return_pct,
        peak_return: peak,
        next_open_gap,
    };

    for (offset, bar) in bars[entry_index + 1..=last].iter().enumerate() {
        if let Some((reason, ret)) = trade.step(bar) {
            return Ok(make(
                entry_index + 1 + offset,
                reason,
                ret,
                trade.peak_return(),
            ));
        }
    }

    let ret = PriceBar::pct_from(entry.close, bars[last].close);
    Ok(make(last, ExitReason::HorizonExpired, ret, trade.peak_return()))
}
