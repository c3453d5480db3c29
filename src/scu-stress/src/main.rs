use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal;

use scu_stress::{Config, Harness};

mod logging;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "scu-stress",
    about = "Consistency and latency stress test of the system-controller RPC channel."
)]
struct Opts {
    /// Config path. Built-in defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Iterations per burst.
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Number of concurrent workers.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(short, long)]
    duration_secs: Option<u64>,

    #[arg(long)]
    no_ansi: bool,
}

static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(sig: i32) {
    if sig == signal::SIGINT as i32 {
        TERMINATE.store(true, Ordering::Relaxed);
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let Some(iterations) = opts.iterations {
        config.iterations = iterations;
    }
    if let Some(workers) = opts.workers {
        config.workers = workers;
    }
    config.validate()?;

    let _guard = logging::init_log(&config, !opts.no_ansi)?;

    let sig_action = signal::SigAction::new(
        signal::SigHandler::Handler(handle_sigint),
        signal::SaFlags::empty(),
        signal::SigSet::empty(),
    );
    unsafe { signal::sigaction(signal::SIGINT, &sig_action) }
        .context("failed to register sighandler")?;

    let bus = config.transport.bus();
    let mut harness = Harness::start(&config, bus.as_ref())?;

    let deadline = opts
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    while !TERMINATE.load(Ordering::Relaxed) && !harness.halted() {
        if deadline.map_or(false, |d| Instant::now() >= d) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    harness.shutdown();

    let totals = harness.totals();
    for (probe, expected) in harness.expected_results() {
        tracing::info!(probe, expected = expected.as_deref().unwrap_or("-"), "reference result");
    }
    tracing::info!(
        iterations = totals.count,
        calls = harness.completed_calls(),
        total_avg_ns = totals.average_ns().unwrap_or(0),
        "exit"
    );

    if harness.halted() {
        anyhow::bail!("halted on result mismatch");
    }
    Ok(())
}
