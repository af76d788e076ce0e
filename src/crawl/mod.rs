// src/crawl/mod.rs
// =============================================================================
// This module crawls the subjects of a logged-in session and downloads
// their files.
//
// Features:
// - A pool of workers sharing one queue of work units
// - Subjects expand into resources, folders, forums and deliveries, which
//   in turn expand into more resources
// - Files are written only when new or changed (dedup cache)
// - Paths that are too long are written under a short alias
// - One broken item never stops the rest of the crawl
//
// Rust concepts:
// - Arc: the context is shared by every worker task
// - Atomics: lock-free counters for the final summary
// =============================================================================

mod content;
mod delivery;
mod folder;
mod forum;
mod link;
mod queue;
mod resource;
mod subject;
mod unit;

pub use queue::{PoolExit, WorkQueue, WorkerPool};
pub use subject::Subject;
pub use unit::{Outcome, WorkUnit};

use crate::config::Config;
use crate::http::{HttpClient, RetryPolicy};
use crate::store::{AliasRegistry, DedupCache, DownloadsLog};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Knobs the work units read while crawling.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub root: PathBuf,
    pub workers: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_redirects: u32,
    pub forums_subfolder: bool,
    /// Where HTML pages that couldn't be understood are dumped
    pub diagnostics_dir: PathBuf,
    pub idle_timeout: Option<Duration>,
    pub fail_fast: bool,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.root_folder.clone(),
            workers: config.workers.max(1),
            request_timeout: config.request.timeout(),
            retry: config.request.retry_policy(),
            max_redirects: config.request.max_redirects,
            forums_subfolder: config.forums_subfolder,
            diagnostics_dir: config.log_dir.clone(),
            idle_timeout: config.watchdog.idle_timeout(),
            fail_fast: config.fail_fast,
        }
    }
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    processed: AtomicUsize,
    new_files: AtomicUsize,
    updated_files: AtomicUsize,
    unchanged_files: AtomicUsize,
    skipped_files: AtomicUsize,
    dropped: AtomicUsize,
    fatal: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub processed: usize,
    pub new_files: usize,
    pub updated_files: usize,
    pub unchanged_files: usize,
    /// Not written because of a permission error
    pub skipped_files: usize,
    pub dropped: usize,
    pub fatal: usize,
}

impl CrawlStats {
    pub fn new_file(&self) {
        self.new_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn updated_file(&self) {
        self.updated_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unchanged(&self) {
        self.unchanged_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            new_files: self.new_files.load(Ordering::Relaxed),
            updated_files: self.updated_files.load(Ordering::Relaxed),
            unchanged_files: self.unchanged_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
        }
    }
}

/// Everything a work unit can reach while it runs.
pub struct CrawlContext {
    pub client: Arc<dyn HttpClient>,
    pub queue: Arc<WorkQueue>,
    pub cache: DedupCache,
    pub aliases: AliasRegistry,
    pub downloads: DownloadsLog,
    pub settings: CrawlSettings,
    pub stats: CrawlStats,
}

impl CrawlContext {
    pub fn new(
        client: Arc<dyn HttpClient>,
        settings: CrawlSettings,
        cache: DedupCache,
        aliases: AliasRegistry,
        downloads: DownloadsLog,
    ) -> Self {
        Self {
            client,
            queue: Arc::new(WorkQueue::new()),
            cache,
            aliases,
            downloads,
            settings,
            stats: CrawlStats::default(),
        }
    }

    /// Records how a unit ended. Fatal outcomes close the queue when
    /// fail_fast is set.
    pub fn settle(&self, unit: &str, outcome: Outcome) {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Completed => debug!(unit, "unit completed"),
            Outcome::Recoverable(reason) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(unit, reason = %reason, "unit dropped");
            }
            Outcome::Fatal(e) => {
                self.stats.fatal.fetch_add(1, Ordering::Relaxed);
                error!(unit, error = %e, "unit failed");
                if self.settings.fail_fast {
                    self.queue.abort();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub subjects: usize,
    pub exit: PoolExit,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub elapsed_secs: f64,
}

impl CrawlSummary {
    pub fn exit_code(&self) -> i32 {
        if self.exit == PoolExit::Abandoned || self.stats.fatal > 0 {
            1
        } else {
            0
        }
    }
}

/// Crawls every subject and returns once the queue is drained (or the
/// watchdog gives up).
pub async fn crawl(ctx: Arc<CrawlContext>, subjects: Vec<Subject>) -> CrawlSummary {
    let started = Instant::now();
    let total = subjects.len();
    info!(subjects = total, workers = ctx.settings.workers, "starting crawl");

    for subject in subjects {
        ctx.queue.push(WorkUnit::Subject(Arc::new(subject)));
    }

    let pool = WorkerPool::new(ctx.settings.workers, ctx.settings.idle_timeout);
    let exit = pool.run(Arc::clone(&ctx)).await;

    let summary = CrawlSummary {
        subjects: total,
        exit,
        stats: ctx.stats.snapshot(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    info!(?summary, "crawl finished");
    summary
}
