//! CSV report writer for trade logs, period summaries and scan hits.

use crate::domain::error::RevscanError;
use crate::domain::scan::ScanHit;
use crate::domain::summary::{GapBucket, PeriodSummary};
use crate::domain::trade::{ExitReason, SimulatedTrade};
use crate::domain::universe::SecurityNames;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::path::Path;

/// Writes report CSVs, attaching security names when a name list is known.
#[derive(Debug, Default)]
pub struct CsvReportAdapter {
    names: SecurityNames,
}

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(names: SecurityNames) -> Self {
        CsvReportAdapter { names }
    }
}

#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    code: &'a str,
    name: Option<&'a str>,
    entry_date: String,
    entry_price: f64,
    horizon: usize,
    exit_date: String,
    holding_days: usize,
    exit_reason: &'static str,
    return_pct: f64,
    peak_return: f64,
    next_open_gap: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    horizon: usize,
    count: usize,
    wins: usize,
    win_rate: f64,
    mean_return: f64,
    stopped_out: usize,
    life_line_exit: usize,
    trailing_stop_exit: usize,
    horizon_expired: usize,
    burst_rate: f64,
    retention_rate: f64,
    gap_down_mean: Option<f64>,
    flat_mean: Option<f64>,
    gap_up_mean: Option<f64>,
    surge_mean: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ScanRow<'a> {
    code: &'a str,
    name: Option<&'a str>,
    date: String,
    close: f64,
    rsi: Option<f64>,
    k: Option<f64>,
    bias20: Option<f64>,
    volume_ratio: Option<f64>,
    profit_potential: Option<f64>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl<'a> TradeRow<'a> {
    fn new(t: &'a SimulatedTrade, names: &'a SecurityNames) -> Self {
        TradeRow {
            code: &t.code,
            name: names.get(&t.code),
            entry_date: t.entry_date.to_string(),
            entry_price: t.entry_price,
            horizon: t.horizon,
            exit_date: t.exit_date.to_string(),
            holding_days: t.holding_days(),
            exit_reason: t.exit_reason.as_str(),
            return_pct: round2(t.return_pct),
            peak_return: round2(t.peak_return),
            next_open_gap: t.next_open_gap.map(round2),
        }
    }
}

impl From<&PeriodSummary> for SummaryRow {
    fn from(s: &PeriodSummary) -> Self {
        let bucket = |b: GapBucket| s.gap_buckets.get(&b).map(|st| round2(st.mean_return));
        SummaryRow {
            horizon: s.horizon,
            count: s.count,
            wins: s.wins,
            win_rate: round2(s.win_rate),
            mean_return: round2(s.mean_return),
            stopped_out: s.exits(ExitReason::StoppedOut),
            life_line_exit: s.exits(ExitReason::LifeLineExit),
            trailing_stop_exit: s.exits(ExitReason::TrailingStopExit),
            horizon_expired: s.exits(ExitReason::HorizonExpired),
            burst_rate: round2(s.burst_rate),
            retention_rate: round2(s.retention_rate),
            gap_down_mean: bucket(GapBucket::GapDown),
            flat_mean: bucket(GapBucket::Flat),
            gap_up_mean: bucket(GapBucket::GapUp),
            surge_mean: bucket(GapBucket::Surge),
        }
    }
}

impl<'a> ScanRow<'a> {
    fn new(h: &'a ScanHit, names: &'a SecurityNames) -> Self {
        let s = &h.snapshot;
        ScanRow {
            code: &h.code,
            name: names.get(&h.code),
            date: h.date.to_string(),
            close: s.close,
            rsi: s.rsi.map(round2),
            k: s.k.map(round2),
            bias20: s.bias20.map(round2),
            volume_ratio: s.volume_ratio.map(round2),
            profit_potential: s.profit_potential.map(round2),
        }
    }
}

fn write_rows<T: Serialize>(rows: impl IntoIterator<Item = T>, output_path: &str) -> Result<(), RevscanError> {
    let report_err = |e: csv::Error| RevscanError::Report {
        reason: format!("failed to write {}: {}", output_path, e),
    };

    if let Some(parent) = Path::new(output_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(output_path).map_err(report_err)?;
    for row in rows {
        writer.serialize(row).map_err(report_err)?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(
        &self,
        trades: &[SimulatedTrade],
        output_path: &str,
    ) -> Result<(), RevscanError> {
        write_rows(trades.iter().map(|t| TradeRow::new(t, &self.names)), output_path)
    }

    fn write_summaries(
        &self,
        summaries: &[PeriodSummary],
        output_path: &str,
    ) -> Result<(), RevscanError> {
        write_rows(summaries.iter().map(SummaryRow::from), output_path)
    }

    fn write_scan(&self, hits: &[ScanHit], output_path: &str) -> Result<(), RevscanError> {
        write_rows(hits.iter().map(|h| ScanRow::new(h, &self.names)), output_path)
    }
}
