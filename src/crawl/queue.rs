// src/crawl/queue.rs
// =============================================================================
// The shared work queue and the worker pool that drains it.
//
// How it works:
// 1. Subjects are pushed, workers pop units and process them
// 2. Processing a unit may push more units (folder entries, topics, ...)
// 3. `pending` counts units pushed but not yet finished; when it reaches
//    zero no unit can appear anymore and the crawl is done
// 4. One Shutdown job per worker is pushed so every worker exits cleanly
//
// An optional watchdog gives up on the crawl when no unit finishes for a
// whole idle period (a worker stuck on a request that never returns).
//
// Rust concepts:
// - Notify: wakes workers waiting for jobs and the pool waiting for drain
// - JoinSet: owns the worker tasks so they can be awaited or aborted
// =============================================================================

use super::unit::{DropReason, Outcome, WorkUnit};
use super::CrawlContext;
use futures::FutureExt;
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum Job {
    Unit(WorkUnit),
    Shutdown,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    jobs: Mutex<VecDeque<Job>>,
    available: Notify,
    pending: AtomicUsize,
    completed: AtomicUsize,
    drained: Notify,
    closed: AtomicBool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, unit: WorkUnit) {
        if self.closed.load(Ordering::Acquire) {
            debug!(unit = %unit, "queue closed, discarding unit");
            return;
        }

        // Counted before it becomes visible so pending never dips to zero
        // while a worker still holds it
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.jobs().push_back(Job::Unit(unit));
        self.available.notify_one();
    }

    fn push_shutdown(&self) {
        self.jobs().push_back(Job::Shutdown);
        self.available.notify_one();
    }

    pub async fn pop(&self) -> Job {
        loop {
            // Registered before looking so a push in between still wakes us
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.jobs().pop_front() {
                return job;
            }
            notified.await;
        }
    }

    /// Marks one popped unit as finished.
    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once every pushed unit has completed.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drops every queued unit and refuses new ones. Units already being
    /// processed still finish.
    pub fn abort(&self) {
        self.closed.store(true, Ordering::Release);

        let discarded = {
            let mut jobs = self.jobs();
            let before = jobs.len();
            jobs.retain(|job| matches!(job, Job::Shutdown));
            before - jobs.len()
        };

        if discarded > 0 {
            warn!(discarded, "crawl aborted, queued units discarded");
            if self.pending.fetch_sub(discarded, Ordering::AcqRel) == discarded {
                self.drained.notify_waiters();
            }
        }
    }

    /// Removes every queued unit without processing it.
    #[cfg(test)]
    pub fn take_all(&self) -> Vec<WorkUnit> {
        let units: Vec<WorkUnit> = self
            .jobs()
            .drain(..)
            .filter_map(|job| match job {
                Job::Unit(unit) => Some(unit),
                Job::Shutdown => None,
            })
            .collect();
        self.pending.fetch_sub(units.len(), Ordering::AcqRel);
        units
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolExit {
    /// Every unit was processed
    Drained,
    /// The watchdog saw no progress for a whole idle period
    Abandoned,
}

pub struct WorkerPool {
    workers: usize,
    idle_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(workers: usize, idle_timeout: Option<Duration>) -> Self {
        Self {
            workers: workers.max(1),
            idle_timeout,
        }
    }

    pub async fn run(&self, ctx: Arc<CrawlContext>) -> PoolExit {
        let queue = Arc::clone(&ctx.queue);
        info!(workers = self.workers, "starting worker pool");

        let mut tasks = JoinSet::new();
        for id in 1..=self.workers {
            tasks.spawn(worker(id, Arc::clone(&ctx)));
        }

        let exit = match self.idle_timeout {
            Some(idle) => watch(&queue, idle).await,
            None => {
                queue.wait_drained().await;
                PoolExit::Drained
            }
        };

        match exit {
            PoolExit::Drained => {
                debug!("queue drained, closing workers");
                for _ in 0..self.workers {
                    queue.push_shutdown();
                }
            }
            PoolExit::Abandoned => {
                queue.abort();
                tasks.abort_all();
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    error!(error = %e, "worker task failed");
                }
            }
        }

        info!(?exit, completed = queue.completed(), "worker pool finished");
        exit
    }
}

async fn watch(queue: &WorkQueue, idle: Duration) -> PoolExit {
    let mut last = queue.completed();
    loop {
        tokio::select! {
            _ = queue.wait_drained() => return PoolExit::Drained,
            _ = tokio::time::sleep(idle) => {
                let now = queue.completed();
                if now == last {
                    warn!(
                        idle_secs = idle.as_secs(),
                        pending = queue.pending(),
                        "no unit finished within the idle timeout, abandoning crawl"
                    );
                    return PoolExit::Abandoned;
                }
                last = now;
            }
        }
    }
}

async fn worker(id: usize, ctx: Arc<CrawlContext>) {
    debug!(worker = id, "worker started");
    loop {
        let unit = match ctx.queue.pop().await {
            Job::Unit(unit) => unit,
            Job::Shutdown => {
                debug!(worker = id, "closing worker");
                return;
            }
        };

        let label = unit.to_string();
        debug!(worker = id, unit = %label, url = unit.url(), "processing");

        let outcome = AssertUnwindSafe(unit.process(&ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Recoverable(DropReason::Panicked(message))
            });

        ctx.settle(&label, outcome);
        ctx.queue.complete();
    }
}
