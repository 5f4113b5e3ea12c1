//! Shared worker pool for background work
//!
//! Runs asynchronous version number computations and periodic polling tasks.
//! Backed by a multi-threaded tokio runtime sized to the available processors;
//! the blocking closures submitted here run on the runtime's blocking threads.

use crate::error::{NutError, NutResult};
use once_cell::sync::OnceCell;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

static GLOBAL: OnceCell<WorkerPool> = OnceCell::new();

/// Bounded pool executing background jobs
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Runtime,
    threads: usize,
}

impl WorkerPool {
    /// Create a pool with `threads` workers
    ///
    /// # Errors
    /// Returns [`NutError::Io`] if the runtime cannot be started.
    pub fn new(threads: usize) -> NutResult<Self> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .max_blocking_threads(threads)
            .thread_name("nut-worker")
            .enable_time()
            .build()?;
        debug!(threads, "worker pool started");
        Ok(Self { runtime, threads })
    }

    /// Process-wide pool sized to the available processors
    ///
    /// # Errors
    /// Returns [`NutError::Io`] if the pool cannot be started.
    pub fn global() -> NutResult<&'static WorkerPool> {
        GLOBAL.get_or_try_init(|| Self::new(default_threads()))
    }

    /// Number of workers
    #[inline]
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `job` as soon as a worker is free
    pub fn execute_asap<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        drop(self.runtime.spawn_blocking(job));
    }

    /// Run `job` every `period`, waiting for each run to finish before the
    /// next delay starts
    ///
    /// # Errors
    /// Returns [`NutError::BadArgument`] for a zero period.
    pub fn execute_every<F>(&self, period: Duration, job: F) -> NutResult<ScheduledTask>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if period.is_zero() {
            return Err(NutError::bad_argument("polling period must be positive"));
        }

        let job = Arc::new(job);
        let handle = self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let run = Arc::clone(&job);
                if let Err(e) = tokio::task::spawn_blocking(move || run()).await {
                    error!(error = %e, "scheduled job failed");
                }
            }
        });

        Ok(ScheduledTask { handle })
    }
}

/// Handle on a periodic job; dropping it cancels the job
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Stop scheduling further runs
    #[inline]
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the job stopped
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
