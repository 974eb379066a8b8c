//! Backtest driver.
//!
//! Each security is an independent task on the [`WorkerPool`]: compute the
//! indicator snapshots once, scan the valid day range for entry signals, and
//! simulate every signal once per configured horizon. Per-security errors are
//! returned as [`SeriesFailure`] values and never abort the run.

use crate::domain::error::{RevscanError, SeriesFailure};
use crate::domain::indicator::{self, WindowConfig};
use crate::domain::price::{PriceBar, PriceSeries};
use crate::domain::signal::{self, Band, FilterProfile};
use crate::domain::summary::{self, PeriodSummary};
use crate::domain::trade::{self, ExitPolicy, SimulatedTrade};
use crate::domain::universe::Universe;
use crate::domain::worker_pool::{WorkerPool, default_workers};
use crate::ports::series_source::SeriesSource;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{debug, info, warn};

pub const DEFAULT_HORIZONS: [usize; 4] = [3, 5, 10, 20];
pub const DEFAULT_MIN_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub windows: WindowConfig,
    pub horizons: Vec<usize>,
    /// Series shorter than this are skipped.
    pub min_history: usize,
    /// Only scan the last N bars of each series.
    pub lookback: Option<usize>,
    /// Accepted band for the next day's open gap, in percent.
    pub entry_gap: Option<Band>,
    pub workers: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            windows: WindowConfig::default(),
            horizons: DEFAULT_HORIZONS.to_vec(),
            min_history: DEFAULT_MIN_HISTORY,
            lookback: None,
            entry_gap: None,
            workers: default_workers(),
        }
    }
}

impl BacktestConfig {
    pub fn max_horizon(&self) -> usize {
        self.horizons.iter().copied().max().unwrap_or(0)
    }

    /// Bars a series needs before it is processed at all.
    pub fn required_history(&self) -> usize {
        self.min_history.max(self.windows.warmup_len())
    }

    /// Day indices scanned for signals in a series of `len` bars.
    ///
    /// Starts at the first fully warmed-up bar and stops early enough that
    /// the longest horizon fits inside the series.
    pub fn scan_range(&self, len: usize) -> Range<usize> {
        let mut start = self.windows.warmup_len() - 1;
        if let Some(lookback) = self.lookback {
            start = start.max(len.saturating_sub(lookback));
        }
        let end = len.saturating_sub(self.max_horizon());
        start..end.max(start)
    }
}

/// Everything one security contributed to a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOutcome {
    pub code: String,
    pub bars: usize,
    pub signals: usize,
    /// Signals dropped by the entry gap gate.
    pub gated: usize,
    pub trades: Vec<SimulatedTrade>,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub summaries: BTreeMap<usize, PeriodSummary>,
    /// All trades ordered by (code, entry index, horizon).
    pub trades: Vec<SimulatedTrade>,
    pub series_processed: usize,
    pub signal_count: usize,
    pub gated_count: usize,
    /// Securities skipped for insufficient history.
    pub skipped: Vec<SeriesFailure>,
    pub failures: Vec<SeriesFailure>,
}

impl BacktestResult {
    pub fn summary_list(&self) -> Vec<PeriodSummary> {
        self.summaries.values().cloned().collect()
    }
}

/// Process one security end to end.
pub fn process_series(
    series: &PriceSeries,
    profile: &FilterProfile,
    policy: &ExitPolicy,
    config: &BacktestConfig,
) -> Result<SeriesOutcome, RevscanError> {
    let required = config.required_history();
    if series.len() < required {
        return Err(RevscanError::InsufficientHistory {
            code: series.code().to_string(),
            bars: series.len(),
            minimum: required,
        });
    }

    let snapshots = indicator::compute(series, &config.windows);
    let range = config.scan_range(series.len());
    let signals = signal::scan_signals(series.code(), &snapshots, profile, range);

    let mut gated = 0usize;
    let mut trades = Vec::with_capacity(signals.len() * config.horizons.len());

    for sig in &signals {
        if let Some(band) = config.entry_gap {
            let next_open_gap = series
                .bar(sig.index + 1)
                .map(|next| PriceBar::pct_from(sig.snapshot.close, next.open));
            if !next_open_gap.is_some_and(|gap| band.contains(gap)) {
                gated += 1;
                continue;
            }
        }
        for &horizon in &config.horizons {
            trades.push(trade::simulate(series, sig.index, horizon, policy)?);
        }
    }

    debug!(
        code = series.code(),
        bars = series.len(),
        signals = signals.len(),
        gated,
        "processed series"
    );

    Ok(SeriesOutcome {
        code: series.code().to_string(),
        bars: series.len(),
        signals: signals.len(),
        gated,
        trades,
    })
}

fn isolate(code: &str, result: Result<SeriesOutcome, RevscanError>) -> Result<SeriesOutcome, SeriesFailure> {
    result.map_err(|error| SeriesFailure {
        code: code.to_string(),
        error,
    })
}

/// Run over in-memory series.
pub fn run(
    universe: &[PriceSeries],
    profile: &FilterProfile,
    policy: &ExitPolicy,
    config: &BacktestConfig,
) -> Result<BacktestResult, RevscanError> {
    if universe.is_empty() {
        return Err(RevscanError::EmptyUniverse {
            reason: "no price series supplied".to_string(),
        });
    }
    let pool = WorkerPool::new(config.workers)?;
    info!(
        securities = universe.len(),
        workers = pool.workers(),
        profile = %profile.name,
        "starting backtest"
    );

    let outcomes = pool.map(universe, |series| {
        isolate(series.code(), process_series(series, profile, policy, config))
    });
    aggregate(outcomes, config)
}

/// Run over a universe loaded on demand from `source`, one load per task.
pub fn run_from_source(
    source: &dyn SeriesSource,
    universe: &Universe,
    profile: &FilterProfile,
    policy: &ExitPolicy,
    config: &BacktestConfig,
) -> Result<BacktestResult, RevscanError> {
    if universe.is_empty() {
        return Err(RevscanError::EmptyUniverse {
            reason: "no securities selected".to_string(),
        });
    }
    let pool = WorkerPool::new(config.workers)?;
    info!(
        securities = universe.count(),
        workers = pool.workers(),
        profile = %profile.name,
        "starting backtest"
    );

    let outcomes = pool.map(&universe.codes, |code| {
        let result = source
            .load(code)
            .and_then(|series| process_series(&series, profile, policy, config));
        isolate(code, result)
    });
    aggregate(outcomes, config)
}

/// Fold per-security results into a run result. Independent of the order
/// of `outcomes`.
pub fn aggregate(
    outcomes: Vec<Result<SeriesOutcome, SeriesFailure>>,
    config: &BacktestConfig,
) -> Result<BacktestResult, RevscanError> {
    let total = outcomes.len();
    let mut trades = Vec::new();
    let mut series_processed = 0usize;
    let mut signal_count = 0usize;
    let mut gated_count = 0usize;
    let mut skipped = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(o) => {
                series_processed += 1;
                signal_count += o.signals;
                gated_count += o.gated;
                trades.extend(o.trades);
            }
            Err(f) if matches!(f.error, RevscanError::InsufficientHistory { .. }) => {
                debug!("skipping {}", f);
                skipped.push(f);
            }
            Err(f) => {
                warn!("series failed: {}", f);
                failures.push(f);
            }
        }
    }

    if series_processed == 0 && skipped.is_empty() {
        return Err(RevscanError::EmptyUniverse {
            reason: format!("all {} securities failed to load or process", total),
        });
    }

    trades.sort_by(|a, b| {
        (a.code.as_str(), a.entry_index, a.horizon).cmp(&(b.code.as_str(), b.entry_index, b.horizon))
    });
    skipped.sort_by(|a, b| a.code.cmp(&b.code));
    failures.sort_by(|a, b| a.code.cmp(&b.code));

    let summaries = summary::summarize(&config.horizons, &trades);

    info!(
        processed = series_processed,
        skipped = skipped.len(),
        failed = failures.len(),
        signals = signal_count,
        trades = trades.len(),
        "backtest complete"
    );

    Ok(BacktestResult {
        summaries,
        trades,
        series_processed,
        signal_count,
        gated_count,
        skipped,
        failures,
    })
}
