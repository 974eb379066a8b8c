//! Latest-day screener: which securities signal on their most recent bar.

use crate::domain::error::{RevscanError, SeriesFailure};
use crate::domain::indicator::{self, IndicatorSnapshot, WindowConfig};
use crate::domain::price::PriceSeries;
use crate::domain::signal::{self, FilterProfile, Verdict};
use crate::domain::universe::Universe;
use crate::domain::worker_pool::WorkerPool;
use crate::ports::series_source::SeriesSource;
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit {
    pub code: String,
    pub date: NaiveDate,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug)]
pub struct ScanResult {
    /// Hits sorted by RSI ascending, then code.
    pub hits: Vec<ScanHit>,
    pub scanned: usize,
    pub failures: Vec<SeriesFailure>,
}

/// Evaluate the last bar of `series` against `profile`.
pub fn scan_latest(
    series: &PriceSeries,
    profile: &FilterProfile,
    windows: &WindowConfig,
) -> Result<Option<ScanHit>, RevscanError> {
    let needed = windows.warmup_len() + 1;
    if series.len() < needed {
        return Err(RevscanError::InsufficientHistory {
            code: series.code().to_string(),
            bars: series.len(),
            minimum: needed,
        });
    }

    let mut snapshots = indicator::compute(series, windows);
    let (Some(today), Some(yesterday)) = (snapshots.pop(), snapshots.pop()) else {
        return Ok(None);
    };

    match signal::explain(&today, &yesterday, profile) {
        Verdict::Pass => Ok(Some(ScanHit {
            code: series.code().to_string(),
            date: today.date,
            snapshot: today,
        })),
        verdict => {
            debug!(code = series.code(), ?verdict, "no signal on latest bar");
            Ok(None)
        }
    }
}

fn by_rsi(a: &ScanHit, b: &ScanHit) -> Ordering {
    let ra = a.snapshot.rsi.unwrap_or(f64::INFINITY);
    let rb = b.snapshot.rsi.unwrap_or(f64::INFINITY);
    ra.total_cmp(&rb).then_with(|| a.code.cmp(&b.code))
}

/// Scan every security in `universe` on the pool.
pub fn run_scan(
    source: &dyn SeriesSource,
    universe: &Universe,
    profile: &FilterProfile,
    windows: &WindowConfig,
    pool: &WorkerPool,
) -> Result<ScanResult, RevscanError> {
    if universe.is_empty() {
        return Err(RevscanError::EmptyUniverse {
            reason: "no securities selected".to_string(),
        });
    }

    let results = pool.map(&universe.codes, |code| {
        source
            .load(code)
            .and_then(|series| scan_latest(&series, profile, windows))
            .map_err(|error| SeriesFailure {
                code: code.clone(),
                error,
            })
    });

    let mut hits = Vec::new();
    let mut failures = Vec::new();
    let mut scanned = 0usize;
    for result in results {
        match result {
            Ok(hit) => {
                scanned += 1;
                hits.extend(hit);
            }
            Err(f) if matches!(f.error, RevscanError::InsufficientHistory { .. }) => {
                debug!("skipping {}", f);
            }
            Err(f) => {
                warn!("scan failed: {}", f);
                failures.push(f);
            }
        }
    }
    hits.sort_by(by_rsi);

    info!(scanned, hits = hits.len(), failed = failures.len(), "scan complete");
    Ok(ScanResult {
        hits,
        scanned,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceBar;

    fn make_series(code: &str, n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 10.2 + (i % 3) as f64 * 0.1,
                low: 9.8,
                close: 10.0 + (i % 4) as f64 * 0.05,
                volume: 1000,
                turnover: Some(1.0),
                amount: None,
            })
            .collect();
        PriceSeries::new(code, bars).unwrap()
    }

    #[test]
    fn scan_latest_permissive_hits_last_bar() {
        let s = make_series("A", 80);
        let hit = scan_latest(&s, &FilterProfile::permissive("all"), &WindowConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(hit.snapshot.index, 79);
        assert_eq!(hit.date, s.bars()[79].date);
    }

    #[test]
    fn scan_latest_strict_profile_misses() {
        let s = make_series("A", 80);
        let hit =
            scan_latest(&s, &FilterProfile::oversold_reversal(), &WindowConfig::default()).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn scan_latest_short_series() {
        let s = make_series("A", 40);
        let err = scan_latest(&s, &FilterProfile::permissive("all"), &WindowConfig::default())
            .unwrap_err();
        assert!(matches!(err, RevscanError::InsufficientHistory { .. }));
    }

    #[test]
    fn hits_order_by_rsi_then_code() {
        let s = make_series("A", 80);
        let base = scan_latest(&s, &FilterProfile::permissive("all"), &WindowConfig::default())
            .unwrap()
            .unwrap();
        let with = |code: &str, rsi: Option<f64>| {
            let mut h = base.clone();
            h.code = code.to_string();
            h.snapshot.rsi = rsi;
            h
        };
        let mut hits = vec![
            with("C", Some(30.0)),
            with("B", None),
            with("A", Some(30.0)),
            with("D", Some(12.0)),
        ];
        hits.sort_by(by_rsi);
        let codes: Vec<&str> = hits.iter().map(|h| h.code.as_str()).collect();
        assert_eq!(codes, vec!["D", "A", "C", "B"]);
    }
}
