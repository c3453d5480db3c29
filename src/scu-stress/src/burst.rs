use std::sync::Arc;
use std::time::Duration;

use minstant::Instant;
use thiserror::Error;

use crate::error::Error;
use crate::worker::StopSignal;

/// One timed unit of work inside a burst.
pub trait Iteration: Send + Sync {
    fn run_once(&self) -> Result<(), Error>;
}

/// Elapsed time of the iterations run by one burst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstStats {
    pub sum_ns: u64,
    pub count: u64,
}

impl BurstStats {
    #[inline]
    pub fn add(&mut self, elapsed: Duration) {
        self.sum_ns += elapsed.as_nanos() as u64;
        self.count += 1;
    }

    /// Mean nanoseconds per iteration, truncated. `None` for an empty burst.
    #[inline]
    pub fn average_ns(&self) -> Option<u64> {
        self.sum_ns.checked_div(self.count)
    }
}

/// A burst stopped at its first failing iteration.
#[derive(Debug, Error)]
#[error("burst aborted at iteration {}: {}", .partial.count, .source)]
pub struct BurstError {
    /// Accounting up to and including the failing iteration.
    pub partial: BurstStats,
    #[source]
    pub source: Error,
}

#[derive(Clone)]
pub struct BurstRunner {
    suite: Arc<dyn Iteration>,
}

impl BurstRunner {
    pub fn new(suite: Arc<dyn Iteration>) -> Self {
        BurstRunner { suite }
    }

    /// Runs `iterations` iterations back to back, stopping at the first error.
    pub fn run_burst(&self, iterations: u32) -> Result<BurstStats, BurstError> {
        self.run_burst_until(iterations, &StopSignal::new())
    }

    /// Like [`run_burst`](Self::run_burst), but also ends early, between two iterations, once
    /// `stop` is requested. The stats of an early end cover the iterations that did run.
    pub fn run_burst_until(
        &self,
        iterations: u32,
        stop: &StopSignal,
    ) -> Result<BurstStats, BurstError> {
        let mut stats = BurstStats::default();
        for _ in 1..=iterations {
            if stop.is_requested() {
                break;
            }
            let start = Instant::now();
            let ret = self.suite.run_once();
            stats.add(start.elapsed());
            if let Err(source) = ret {
                return Err(BurstError {
                    partial: stats,
                    source,
                });
            }
        }
        Ok(stats)
    }
}
