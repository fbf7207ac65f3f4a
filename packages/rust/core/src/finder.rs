//! Finder service: bootstrap, cache, pool and scheduler under one lifecycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use storefinder_crawler::{HttpClient, HttpSectionFetcher, SectionFetcher};
use storefinder_discovery::{BootstrapOptions, BootstrapProgress, Catalog, bootstrap};
use storefinder_shared::{AppConfig, HttpConfig, Product, RefreshConfig, Result};

use crate::cache::ProductCache;
use crate::pool::WorkerPool;
use crate::scheduler::Scheduler;
use crate::task::FetchTask;

/// Everything needed to start a [`StoreFinder`] against live stores.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Where the store list lives.
    pub bootstrap: BootstrapOptions,
    /// HTTP transport settings shared by bootstrap and fetching.
    pub http: HttpConfig,
    /// Scheduler and pool settings.
    pub refresh: RefreshConfig,
}

impl From<&AppConfig> for FinderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bootstrap: BootstrapOptions {
                stores_url: config.catalog.stores_url.clone(),
                skip_offline: config.catalog.skip_offline,
            },
            http: HttpConfig::from(config),
            refresh: RefreshConfig::from(config),
        }
    }
}

/// A running crawler: the scheduler keeps the cache fresh until shutdown.
pub struct StoreFinder<F: SectionFetcher = HttpSectionFetcher> {
    catalog: Catalog,
    cache: Arc<ProductCache>,
    pool: Arc<WorkerPool<FetchTask<F>>>,
    cancel: CancellationToken,
    scheduler: Option<JoinHandle<()>>,
}

impl StoreFinder<HttpSectionFetcher> {
    /// Bootstrap the catalog over HTTP and start refreshing it.
    ///
    /// Bootstrap failures are returned before anything is spawned.
    #[instrument(skip_all, fields(stores_url = %config.bootstrap.stores_url))]
    pub async fn start(
        config: &FinderConfig,
        progress: &dyn BootstrapProgress,
    ) -> Result<Self> {
        let client = HttpClient::new(&config.http)?;
        let catalog = bootstrap(&client, &config.bootstrap, progress).await?;
        let fetcher = HttpSectionFetcher::with_client(client);
        Ok(Self::start_with(catalog, fetcher, &config.refresh))
    }
}

impl<F: SectionFetcher> StoreFinder<F> {
    /// Start refreshing an already resolved catalog with `fetcher`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with(catalog: Catalog, fetcher: F, config: &RefreshConfig) -> Self {
        let cache = Arc::new(ProductCache::new());
        let pool = Arc::new(WorkerPool::new(config.workers));
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(
            catalog.sections.clone(),
            config,
            Arc::clone(&pool),
            Arc::new(fetcher),
            Arc::clone(&cache),
        );
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        info!(
            stores = catalog.stores.len(),
            sections = catalog.sections.len(),
            workers = pool.size(),
            "finder started"
        );

        Self {
            catalog,
            cache,
            pool,
            cancel,
            scheduler: Some(handle),
        }
    }

    /// Products whose name contains `pattern`, as last observed.
    pub fn search(&self, pattern: &str) -> Vec<Product> {
        self.cache.search(pattern)
    }

    /// Shared handle to the product cache.
    pub fn cache(&self) -> Arc<ProductCache> {
        Arc::clone(&self.cache)
    }

    /// The catalog resolved at startup.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of sections being refreshed.
    pub fn section_count(&self) -> usize {
        self.catalog.sections.len()
    }

    /// Token that stops the scheduler when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop scheduling, then drain the pool.
    ///
    /// Returns once the scheduler has exited and every accepted fetch has
    /// finished. The cache stays readable afterwards.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.scheduler.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler task exited abnormally");
            }
        }
        self.pool.shutdown().await;
        info!(products = self.cache.len(), "finder stopped");
    }
}

impl<F: SectionFetcher> Drop for StoreFinder<F> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
