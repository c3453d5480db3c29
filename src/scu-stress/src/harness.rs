use std::sync::Arc;

use scu_ipc::{Bus, RpcClient, Transport, TransportError};

use crate::burst::BurstRunner;
use crate::config::{Config, MismatchPolicy};
use crate::error::Error;
use crate::probe::ProbeSet;
use crate::stats::{RunningStats, Totals};
use crate::worker::{StopSignal, WorkerContext, WorkerPool};

/// The running test: one channel, one probe set, shared statistics and the worker pool.
pub struct Harness {
    probes: Option<Arc<ProbeSet>>,
    pool: Option<WorkerPool>,
    stats: Arc<RunningStats>,
    halt: Arc<StopSignal>,
}

fn open_channel(config: &Config, bus: &dyn Bus) -> Result<Arc<dyn Transport>, TransportError> {
    let bus_id = match config.transport.bus_id {
        Some(id) => scu_ipc::BusId(id),
        None => bus.default_bus()?,
    };
    let transport = bus.open(bus_id)?;
    tracing::info!(bus = %bus_id, "firmware channel open");
    Ok(transport)
}

impl Harness {
    /// Opens the channel, runs the warm-up burst and starts the workers.
    ///
    /// A channel that cannot be opened is not an error: the harness comes up idle.
    pub fn start(config: &Config, bus: &dyn Bus) -> Result<Self, Error> {
        config.validate()?;

        let transport = match open_channel(config, bus) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(error = %e, "assume no firmware, harness idle");
                return Ok(Self::idle());
            }
        };

        let client = Arc::new(RpcClient::new(transport));
        let probes = Arc::new(ProbeSet::new(client));
        Self::start_with(config, probes)
    }

    /// Runs the warm-up burst over `probes` and starts the workers.
    pub fn start_with(config: &Config, probes: Arc<ProbeSet>) -> Result<Self, Error> {
        config.validate()?;

        let runner = BurstRunner::new(probes.clone());
        let mut harness = Harness {
            probes: Some(probes),
            pool: None,
            stats: Arc::new(RunningStats::new()),
            halt: Arc::new(StopSignal::new()),
        };

        match runner.run_burst(config.iterations) {
            Ok(burst) => {
                if let Some(avg) = harness.stats.record(&burst) {
                    tracing::info!(
                        burst_avg_ns = avg.burst_ns,
                        total_avg_ns = avg.running_ns,
                        "warm-up pass"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "warm-up fail");
                if e.source.is_mismatch() && config.mismatch_policy == MismatchPolicy::Halt {
                    harness.halt.request();
                    return Ok(harness);
                }
            }
        }

        let ctx = WorkerContext {
            runner,
            stats: Arc::clone(&harness.stats),
            iterations: config.iterations,
            pause: config.pause(),
            policy: config.mismatch_policy,
            halt: Arc::clone(&harness.halt),
        };
        harness.pool = Some(WorkerPool::spawn(
            config.workers,
            ctx,
            config.spawn_stagger(),
        )?);
        Ok(harness)
    }

    fn idle() -> Self {
        Harness {
            probes: None,
            pool: None,
            stats: Arc::new(RunningStats::new()),
            halt: Arc::new(StopSignal::new()),
        }
    }

    /// True when the firmware was absent and nothing runs.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.probes.is_none()
    }

    /// True once a mismatch under [`MismatchPolicy::Halt`] stopped the run.
    #[inline]
    pub fn halted(&self) -> bool {
        self.halt.is_requested()
    }

    pub fn active_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::active)
    }

    pub fn totals(&self) -> Totals {
        self.stats.snapshot()
    }

    /// Reference result of each probe, in probe order.
    pub fn expected_results(&self) -> Vec<(&'static str, Option<String>)> {
        self.probes
            .iter()
            .flat_map(|set| set.probes())
            .map(|p| (p.name(), p.expected()))
            .collect()
    }

    /// Total calls answered by the channel.
    pub fn completed_calls(&self) -> u64 {
        self.probes
            .as_ref()
            .map_or(0, |set| set.client().completed_calls())
    }

    /// Stops all workers and waits for them. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            tracing::info!(workers = pool.len(), "stopping workers");
            pool.shutdown();
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scu_ipc::{Fault, NoBus, SimBus};

    fn quick_config() -> Config {
        Config {
            iterations: 5,
            workers: 2,
            pause_ms: 1,
            spawn_stagger_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn missing_firmware_is_idle() {
        let mut harness = Harness::start(&quick_config(), &NoBus).unwrap();
        assert!(harness.is_idle());
        assert_eq!(harness.active_workers(), 0);
        assert_eq!(harness.totals(), Totals::default());
        harness.shutdown();
    }

    #[test]
    fn invalid_config_fails_startup() {
        let config = Config {
            workers: 0,
            ..quick_config()
        };
        assert!(matches!(
            Harness::start(&config, &SimBus::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn warm_up_then_workers() {
        let config = Config {
            workers: 1,
            pause_ms: 60_000,
            ..quick_config()
        };
        let mut harness = Harness::start(&config, &SimBus::default()).unwrap();
        assert!(!harness.is_idle());
        // warm-up has been recorded before start returns
        assert!(harness.totals().count >= 5);
        assert_eq!(harness.expected_results()[1], ("find-memreg", Some("mr2".to_owned())));
        harness.shutdown();
        assert_eq!(harness.active_workers(), 0);
        assert_eq!(harness.completed_calls() % 3, 0);
    }

    #[test]
    fn warm_up_mismatch_halts_before_workers() {
        let config = Config {
            mismatch_policy: MismatchPolicy::Halt,
            ..quick_config()
        };
        let bus = SimBus {
            faults: vec![Fault::ChangeBuild {
                from_call: 4,
                build: 1,
            }],
            ..Default::default()
        };
        let harness = Harness::start(&config, &bus).unwrap();
        assert!(harness.halted());
        assert_eq!(harness.active_workers(), 0);
        assert_eq!(harness.totals().count, 0);
    }
}
