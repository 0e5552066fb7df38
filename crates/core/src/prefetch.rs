//! Next-page prefetching on a bounded worker pool.
//!
//! After a search returns, the following page is fetched in the background
//! so that paging forward hits the cache. Prefetches never report back to
//! the caller; outcomes go to logs, metrics and [`Prefetcher::status`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::cache::BookCache;
use crate::catalog::SearchRequest;
use crate::config::PrefetchConfig;
use crate::metrics::PREFETCH_TASKS;

/// Snapshot of the prefetch pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub enabled: bool,
    /// Prefetches currently fetching.
    pub active: usize,
    pub max_concurrent: usize,
    /// Prefetches waiting for a worker.
    pub queued: usize,
    pub max_queued: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_timed_out: u64,
    /// Prefetches rejected because the backlog was full.
    pub total_dropped: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

/// Fire-and-forget scheduler for next-page prefetches.
pub struct Prefetcher {
    cache: Arc<BookCache>,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    enabled: bool,
    max_concurrent: usize,
    max_queued: usize,
    timeout: Duration,
}

impl Prefetcher {
    pub fn new(cache: Arc<BookCache>, config: &PrefetchConfig) -> Self {
        Self {
            cache,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            stats: Arc::new(PoolStats::default()),
            enabled: config.enabled,
            max_concurrent: config.max_concurrent,
            max_queued: config.max_queued,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Schedule `request` to be loaded into the cache. Returns immediately.
    ///
    /// When every worker is busy the request waits in a bounded backlog;
    /// once the backlog is full further requests are dropped.
    pub fn schedule(&self, request: SearchRequest) {
        if !self.enabled {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(query = %request.query(), page = request.page(), "No async runtime, prefetch dropped");
            self.drop_request();
            return;
        };

        // Start right away when a worker is free; otherwise join the backlog.
        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                self.stats.active.fetch_add(1, Ordering::SeqCst);
                Some(permit)
            }
            Err(_) => {
                let waiting = self.stats.queued.fetch_add(1, Ordering::SeqCst);
                if waiting >= self.max_queued as u64 {
                    self.stats.queued.fetch_sub(1, Ordering::SeqCst);
                    warn!(
                        query = %request.query(),
                        page = request.page(),
                        max_queued = self.max_queued,
                        "Prefetch backlog full, dropping prefetch"
                    );
                    self.drop_request();
                    return;
                }
                None
            }
        };

        debug!(query = %request.query(), page = request.page(), "Prefetch scheduled");

        runtime.spawn(run_prefetch(
            Arc::clone(&self.cache),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.stats),
            permit,
            request,
            self.timeout,
        ));
    }

    /// Current pool statistics.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            enabled: self.enabled,
            active: self.stats.active.load(Ordering::SeqCst) as usize,
            max_concurrent: self.max_concurrent,
            queued: self.stats.queued.load(Ordering::SeqCst) as usize,
            max_queued: self.max_queued,
            total_completed: self.stats.completed.load(Ordering::SeqCst),
            total_failed: self.stats.failed.load(Ordering::SeqCst),
            total_timed_out: self.stats.timed_out.load(Ordering::SeqCst),
            total_dropped: self.stats.dropped.load(Ordering::SeqCst),
        }
    }

    fn drop_request(&self) {
        self.stats.dropped.fetch_add(1, Ordering::SeqCst);
        PREFETCH_TASKS.with_label_values(&["dropped"]).inc();
    }
}

async fn run_prefetch(
    cache: Arc<BookCache>,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    permit: Option<OwnedSemaphorePermit>,
    request: SearchRequest,
    timeout: Duration,
) {
    let _permit = match permit {
        Some(permit) => permit,
        None => {
            let acquired = semaphore.acquire_owned().await;
            stats.queued.fetch_sub(1, Ordering::SeqCst);
            match acquired {
                Ok(permit) => {
                    stats.active.fetch_add(1, Ordering::SeqCst);
                    permit
                }
                // Semaphore is never closed.
                Err(_) => return,
            }
        }
    };

    match tokio::time::timeout(timeout, cache.get_or_fetch_page(&request)).await {
        Ok(Ok(page)) => {
            stats.completed.fetch_add(1, Ordering::SeqCst);
            PREFETCH_TASKS.with_label_values(&["completed"]).inc();
            info!(
                query = %request.query(),
                page = request.page(),
                books = page.len(),
                "Prefetch completed"
            );
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::SeqCst);
            PREFETCH_TASKS.with_label_values(&["failed"]).inc();
            warn!(
                query = %request.query(),
                page = request.page(),
                error = %e,
                "Prefetch failed"
            );
        }
        Err(_) => {
            stats.timed_out.fetch_add(1, Ordering::SeqCst);
            PREFETCH_TASKS.with_label_values(&["timed_out"]).inc();
            warn!(
                query = %request.query(),
                page = request.page(),
                timeout_secs = timeout.as_secs(),
                "Prefetch timed out"
            );
        }
    }

    stats.active.fetch_sub(1, Ordering::SeqCst);
}
