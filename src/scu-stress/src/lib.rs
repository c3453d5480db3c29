//! Consistency and latency stress test for the system-controller RPC channel.
//!
//! A [`Harness`] opens the channel, runs one warm-up burst and then keeps a pool of workers
//! running bursts of the probe set until it is shut down. Each probe remembers the first answer
//! it sees and reports any later answer that differs.

pub extern crate tracing;
// alias
pub extern crate tracing as log;

pub mod burst;
pub mod config;
pub mod error;
pub mod harness;
pub mod oracle;
pub mod probe;
pub mod stats;
pub mod worker;

pub use burst::{BurstError, BurstRunner, BurstStats, Iteration};
pub use config::{Config, MismatchPolicy};
pub use error::{ConfigError, Error, Mismatch};
pub use harness::Harness;
pub use oracle::{Oracle, ProbeValue, Verdict};
pub use probe::{Probe, ProbeSet};
pub use stats::{Averages, RunningStats, Totals};
pub use worker::{StopSignal, WorkerPool, WorkerState};
