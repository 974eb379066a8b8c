//! Per-horizon aggregation of simulated trades.
//!
//! Trades are put in (code, entry index, horizon) order before summing, so
//! a summary depends only on the set of trades and never on the order in
//! which securities finished processing.

use crate::domain::trade::{ExitReason, SimulatedTrade};
use std::collections::BTreeMap;
use std::fmt;

/// Peak return at or above which a trade counts as a burst.
pub const BURST_THRESHOLD: f64 = 10.0;
/// Realised return at or above which a trade counts as retained.
pub const RETENTION_THRESHOLD: f64 = 5.0;

/// Bucket of the next-day open gap after a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GapBucket {
    /// At or below -1%.
    GapDown,
    /// Above -1%, up to and including 1.5%.
    Flat,
    /// Above 1.5%, up to and including 5%.
    GapUp,
    /// Above 5%.
    Surge,
}

impl GapBucket {
    pub fn of(gap_pct: f64) -> Self {
        if gap_pct <= -1.0 {
            GapBucket::GapDown
        } else if gap_pct <= 1.5 {
            GapBucket::Flat
        } else if gap_pct <= 5.0 {
            GapBucket::GapUp
        } else {
            GapBucket::Surge
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GapBucket::GapDown => "<= -1%",
            GapBucket::Flat => "-1% .. 1.5%",
            GapBucket::GapUp => "1.5% .. 5%",
            GapBucket::Surge => "> 5%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BucketStats {
    pub count: usize,
    pub mean_return: f64,
}

/// Aggregate outcome of all trades for one holding horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub horizon: usize,
    pub count: usize,
    pub wins: usize,
    /// Percent of trades with a positive return.
    pub win_rate: f64,
    pub mean_return: f64,
    pub exit_counts: BTreeMap<ExitReason, usize>,
    /// Percent of trades whose peak reached [`BURST_THRESHOLD`].
    pub burst_rate: f64,
    /// Percent of trades that realised at least [`RETENTION_THRESHOLD`].
    pub retention_rate: f64,
    pub gap_buckets: BTreeMap<GapBucket, BucketStats>,
}

impl PeriodSummary {
    /// Summarise the trades of one horizon.
    pub fn compute(horizon: usize, trades: &[&SimulatedTrade]) -> Self {
        let mut sorted: Vec<&SimulatedTrade> = trades.to_vec();
        sorted.sort_by(|a, b| {
            (a.code.as_str(), a.entry_index, a.horizon).cmp(&(
                b.code.as_str(),
                b.entry_index,
                b.horizon,
            ))
        });

        let count = sorted.len();
        let mut wins = 0usize;
        let mut bursts = 0usize;
        let mut retained = 0usize;
        let mut total_return = 0.0_f64;
        let mut exit_counts: BTreeMap<ExitReason, usize> = BTreeMap::new();
        let mut bucket_sums: BTreeMap<GapBucket, (usize, f64)> = BTreeMap::new();

        for trade in &sorted {
            if trade.is_win() {
                wins += 1;
            }
            if trade.peak_return >= BURST_THRESHOLD {
                bursts += 1;
            }
            if trade.return_pct >= RETENTION_THRESHOLD {
                retained += 1;
            }
            total_return += trade.return_pct;
            *exit_counts.entry(trade.exit_reason).or_insert(0) += 1;

            if let Some(gap) = trade.next_open_gap {
                let entry = bucket_sums.entry(GapBucket::of(gap)).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += trade.return_pct;
            }
        }

        let pct = |n: usize| {
            if count > 0 {
                n as f64 / count as f64 * 100.0
            } else {
                0.0
            }
        };
        let mean_return = if count > 0 {
            total_return / count as f64
        } else {
            0.0
        };

        let gap_buckets = bucket_sums
            .into_iter()
            .map(|(bucket, (n, sum))| {
                (
                    bucket,
                    BucketStats {
                        count: n,
                        mean_return: sum / n as f64,
                    },
                )
            })
            .collect();

        PeriodSummary {
            horizon,
            count,
            wins,
            win_rate: pct(wins),
            mean_return,
            exit_counts,
            burst_rate: pct(bursts),
            retention_rate: pct(retained),
            gap_buckets,
        }
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exit_counts.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for PeriodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}d  trades {:>6}  win {:>6.2}%  mean {:>+7.2}%  burst {:>6.2}%  retain {:>6.2}%",
            self.horizon,
            self.count,
            self.win_rate,
            self.mean_return,
            self.burst_rate,
            self.retention_rate
        )
    }
}

/// Group trades by horizon and summarise each configured horizon.
///
/// Horizons without trades still get an (empty) summary.
pub fn summarize(horizons: &[usize], trades: &[SimulatedTrade]) -> BTreeMap<usize, PeriodSummary> {
    horizons
        .iter()
        .map(|&h| {
            let of_horizon: Vec<&SimulatedTrade> = trades.iter().filter(|t| t.horizon == h).collect();
            (h, PeriodSummary::compute(h, &of_horizon))
        })
        .collect()
}
