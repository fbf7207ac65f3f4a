//! Refresh scheduler.
//!
//! Owns the section registry and is the only writer of its ready times. On
//! every tick it scans the registry from a round-robin cursor, and for each
//! section whose ready time has passed it pushes the ready time one refresh
//! interval ahead and submits a [`FetchTask`] to the worker pool.
//!
//! Freshness is dispatch-based: a section becomes due again one interval after
//! it was scheduled, regardless of when (or whether) its fetch completed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use storefinder_crawler::SectionFetcher;
use storefinder_shared::{MAX_REFRESH_INTERVAL, MAX_TICK, RefreshConfig, Result, Section};

use crate::cache::ProductCache;
use crate::pool::WorkerPool;
use crate::task::FetchTask;

/// One registry slot: a section and its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Immutable section snapshot handed to tasks.
    pub section: Arc<Section>,
    /// The section is due once this instant has passed.
    pub ready_at: Instant,
    /// Number of tasks the pool accepted for this section.
    pub dispatch_count: u64,
}

impl RegistryEntry {
    /// Whether the section is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.ready_at <= now
    }
}

/// What a single registry scan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Entries inspected.
    pub examined: usize,
    /// Tasks submitted.
    pub dispatched: usize,
}

/// The control loop feeding due sections to the worker pool.
pub struct Scheduler<F: SectionFetcher> {
    registry: Vec<RegistryEntry>,
    cursor: usize,
    refresh_interval: Duration,
    tick: Duration,
    scan_limit: Option<usize>,
    pool: Arc<WorkerPool<FetchTask<F>>>,
    fetcher: Arc<F>,
    cache: Arc<ProductCache>,
}

impl<F: SectionFetcher> Scheduler<F> {
    /// Build a scheduler whose sections are all immediately due.
    ///
    /// Intervals above [`MAX_REFRESH_INTERVAL`] and ticks above [`MAX_TICK`]
    /// are clamped so ready times can always be computed.
    pub fn new(
        sections: Vec<Section>,
        config: &RefreshConfig,
        pool: Arc<WorkerPool<FetchTask<F>>>,
        fetcher: Arc<F>,
        cache: Arc<ProductCache>,
    ) -> Self {
        let now = Instant::now();
        let registry = sections
            .into_iter()
            .map(|section| RegistryEntry {
                section: Arc::new(section),
                ready_at: now,
                dispatch_count: 0,
            })
            .collect();

        if config.refresh_interval > MAX_REFRESH_INTERVAL || config.tick > MAX_TICK {
            warn!(
                refresh_interval_secs = config.refresh_interval.as_secs(),
                tick_ms = config.tick.as_millis() as u64,
                "refresh timing out of range, clamping"
            );
        }

        Self {
            registry,
            cursor: 0,
            refresh_interval: config.refresh_interval.min(MAX_REFRESH_INTERVAL),
            tick: config.tick.min(MAX_TICK),
            scan_limit: config.scan_limit,
            pool,
            fetcher,
            cache,
        }
    }

    /// Read-only view of the registry.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.registry
    }

    /// Number of sections in the registry.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of sections due at `now`.
    pub fn due_count(&self, now: Instant) -> usize {
        self.registry.iter().filter(|e| e.is_due(now)).count()
    }

    /// Scan up to `scan_limit` entries from the cursor and dispatch every due one.
    ///
    /// Each submission may wait on the pool. If `cancel` fires while waiting,
    /// the pending task is abandoned and the pass returns what it did so far.
    /// Fails only if the pool has been shut down.
    pub async fn pass(&mut self, cancel: &CancellationToken) -> Result<PassReport> {
        let len = self.registry.len();
        let limit = self.scan_limit.unwrap_or(len).min(len);
        let mut report = PassReport::default();

        for _ in 0..limit {
            if cancel.is_cancelled() {
                break;
            }

            let idx = self.cursor;
            self.cursor = (self.cursor + 1) % len;
            report.examined += 1;

            let now = Instant::now();
            let entry = &mut self.registry[idx];
            if !entry.is_due(now) {
                continue;
            }

            // Readiness follows dispatch time, not completion.
            entry.ready_at = now + self.refresh_interval;

            let task = FetchTask::new(
                Arc::clone(&entry.section),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.cache),
            );
            debug!(section = %entry.section, "dispatching");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                submitted = self.pool.submit(task) => submitted?,
            }
            self.registry[idx].dispatch_count += 1;
            report.dispatched += 1;
        }

        Ok(report)
    }

    /// Run passes on every tick until `cancel` fires or the pool closes.
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.registry.is_empty() {
            warn!("scheduler started with an empty registry");
        }

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sections = self.registry.len(),
            refresh_interval_secs = self.refresh_interval.as_secs(),
            tick_ms = self.tick.as_millis() as u64,
            scan_limit = ?self.scan_limit,
            workers = self.pool.size(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.pass(&cancel).await {
                Ok(report) if report.dispatched > 0 => {
                    debug!(
                        examined = report.examined,
                        dispatched = report.dispatched,
                        "pass complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "worker pool unavailable, stopping scheduler");
                    break;
                }
            }
        }

        info!("scheduler stopped");
    }
}
