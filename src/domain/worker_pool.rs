//! Bounded worker pool for per-security tasks.

use crate::domain::error::RevscanError;
use rayon::prelude::*;

/// Number of workers when none is configured: the available CPU cores.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A fixed-size thread pool. Each task runs to completion on one worker;
/// results come back in input order regardless of completion order.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, RevscanError> {
        if workers == 0 {
            return Err(RevscanError::config_invalid(
                "backtest",
                "workers",
                "must be at least 1",
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("revscan-worker-{i}"))
            .build()
            .map_err(|e| RevscanError::config_invalid("backtest", "workers", e.to_string()))?;
        Ok(WorkerPool { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `task` to every item on the pool.
    pub fn map<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool
            .install(|| items.par_iter().map(|item| task(item)).collect())
    }
}
