//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod price;
pub mod rolling;
pub mod scan;
pub mod signal;
pub mod summary;
pub mod trade;
pub mod universe;
pub mod worker_pool;
