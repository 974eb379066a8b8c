//! Price series source port trait.
//!
//! Implementations are shared read-only across worker threads, hence the
//! `Sync` bound.

use crate::domain::error::RevscanError;
use crate::domain::price::PriceSeries;

pub trait SeriesSource: Sync {
    /// Identifiers of every security the source can load.
    fn list_codes(&self) -> Result<Vec<String>, RevscanError>;

    /// Load the full ordered history of one security.
    fn load(&self, code: &str) -> Result<PriceSeries, RevscanError>;
}
