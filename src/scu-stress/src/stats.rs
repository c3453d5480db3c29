use spin::Mutex;

use crate::burst::BurstStats;

/// Cumulative iteration time across every burst of every worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub sum_ns: u64,
    pub count: u64,
}

impl Totals {
    #[inline]
    pub fn average_ns(&self) -> Option<u64> {
        self.sum_ns.checked_div(self.count)
    }
}

/// Averages reported after a burst is recorded, in nanoseconds per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Averages {
    pub burst_ns: u64,
    pub running_ns: u64,
}

/// Process-wide running totals. The lock is only held to add and divide.
#[derive(Debug, Default)]
pub struct RunningStats {
    totals: Mutex<Totals>,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a burst into the totals. An empty burst leaves them untouched and yields `None`.
    pub fn record(&self, burst: &BurstStats) -> Option<Averages> {
        let burst_ns = burst.average_ns()?;
        let running_ns = {
            let mut totals = self.totals.lock();
            totals.sum_ns += burst.sum_ns;
            totals.count += burst.count;
            totals.sum_ns / totals.count
        };
        Some(Averages {
            burst_ns,
            running_ns,
        })
    }

    pub fn snapshot(&self) -> Totals {
        *self.totals.lock()
    }
}
