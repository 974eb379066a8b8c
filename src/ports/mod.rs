//! Port traits at the I/O seams of the domain.

pub mod config_port;
pub mod report_port;
pub mod series_source;
