//! Report output port trait.

use crate::domain::error::RevscanError;
use crate::domain::scan::ScanHit;
use crate::domain::summary::PeriodSummary;
use crate::domain::trade::SimulatedTrade;

/// Port for persisting run results.
pub trait ReportPort {
    fn write_trades(&self, trades: &[SimulatedTrade], output_path: &str)
    -> Result<(), RevscanError>;

    fn write_summaries(
        &self,
        summaries: &[PeriodSummary],
        output_path: &str,
    ) -> Result<(), RevscanError>;

    fn write_scan(&self, hits: &[ScanHit], output_path: &str) -> Result<(), RevscanError>;
}
