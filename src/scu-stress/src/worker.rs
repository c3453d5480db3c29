//! Long-lived workers that keep running bursts until told to stop.
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::burst::BurstRunner;
use crate::config::MismatchPolicy;
use crate::error::Error;
use crate::stats::RunningStats;

/// A cooperative stop request.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            2 => WorkerState::StopRequested,
            _ => WorkerState::Stopped,
        }
    }
}

/// State shared between a worker thread and its handle.
#[derive(Debug)]
struct Control {
    state: AtomicU8,
    stop: StopSignal,
}

impl Control {
    fn new() -> Self {
        Control {
            state: AtomicU8::new(WorkerState::Created as u8),
            stop: StopSignal::new(),
        }
    }

    #[inline]
    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `from` to `to`; returns false if the worker was elsewhere.
    #[inline]
    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn request_stop(&self) {
        self.stop.request();
        // a worker that already stopped stays stopped
        let _ = self.transition(WorkerState::Created, WorkerState::StopRequested)
            || self.transition(WorkerState::Running, WorkerState::StopRequested);
    }
}

/// What every worker needs to run bursts.
#[derive(Clone)]
pub struct WorkerContext {
    pub runner: BurstRunner,
    pub stats: Arc<RunningStats>,
    pub iterations: u32,
    pub pause: Duration,
    pub policy: MismatchPolicy,
    /// Tripped by a worker that hits a mismatch under [`MismatchPolicy::Halt`].
    pub halt: Arc<StopSignal>,
}

pub struct WorkerHandle {
    id: usize,
    control: Arc<Control>,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

impl WorkerHandle {
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    /// Asks the worker to stop and wakes it if it is pausing. Does not wait.
    pub fn request_stop(&self) {
        self.control.request_stop();
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }

    /// Waits for the worker to exit. Returns `None` if it was already joined.
    pub fn join(&mut self) -> Option<Result<(), Error>> {
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(ret) => Some(ret),
            Err(_) => {
                self.control
                    .state
                    .store(WorkerState::Stopped as u8, Ordering::Release);
                Some(Err(Error::Panicked(self.id)))
            }
        }
    }
}

fn worker_main(id: usize, ctx: WorkerContext, control: Arc<Control>) -> Result<(), Error> {
    control.transition(WorkerState::Created, WorkerState::Running);
    tracing::info!(worker = id, "worker started");

    let ret = loop {
        if control.stop.is_requested() || ctx.halt.is_requested() {
            break Ok(());
        }

        match ctx.runner.run_burst_until(ctx.iterations, &control.stop) {
            Ok(burst) => {
                if let Some(avg) = ctx.stats.record(&burst) {
                    tracing::info!(
                        worker = id,
                        iterations = burst.count,
                        burst_avg_ns = avg.burst_ns,
                        total_avg_ns = avg.running_ns,
                        "pass"
                    );
                }
            }
            Err(e) => {
                tracing::error!(worker = id, error = %e, "fail, worker shutting down");
                if e.source.is_mismatch() && ctx.policy == MismatchPolicy::Halt {
                    tracing::error!(worker = id, "halting every worker on result mismatch");
                    ctx.halt.request();
                }
                break Err(e.source);
            }
        }

        // an unpark from `request_stop` ends the pause early
        thread::park_timeout(ctx.pause);
    };

    control
        .state
        .store(WorkerState::Stopped as u8, Ordering::Release);
    tracing::info!(worker = id, "worker stopped");
    ret
}

/// A fixed set of workers, sized once at startup.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    halt: Arc<StopSignal>,
}

impl WorkerPool {
    /// Starts `count` workers, `stagger` apart. If one fails to start, those already running are
    /// stopped before the error is returned.
    pub fn spawn(count: usize, ctx: WorkerContext, stagger: Duration) -> Result<Self, Error> {
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(count),
            halt: Arc::clone(&ctx.halt),
        };

        for id in 0..count {
            if id > 0 && !stagger.is_zero() {
                thread::sleep(stagger);
            }
            let control = Arc::new(Control::new());
            let thread = thread::Builder::new()
                .name(format!("scu-test{id}"))
                .spawn({
                    let ctx = ctx.clone();
                    let control = Arc::clone(&control);
                    move || worker_main(id, ctx, control)
                })
                .map_err(Error::Spawn)?;
            pool.workers.push(WorkerHandle {
                id,
                control,
                thread: Some(thread),
            });
        }

        Ok(pool)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(WorkerHandle::state).collect()
    }

    /// Number of workers that have not stopped yet.
    pub fn active(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state() != WorkerState::Stopped)
            .count()
    }

    #[inline]
    pub fn halted(&self) -> bool {
        self.halt.is_requested()
    }

    /// Stops every worker and waits for all of them to exit. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        for worker in &self.workers {
            worker.request_stop();
        }
        for mut worker in self.workers.drain(..) {
            match worker.join() {
                Some(Ok(())) | None => {}
                Some(Err(e @ Error::Panicked(_))) => tracing::error!(error = %e, "join failed"),
                Some(Err(e)) => {
                    tracing::debug!(worker = worker.id, error = %e, "worker had exited on error")
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
