//! Catalog bootstrap: resolves the store list and each store's sections.
//!
//! Bootstrap runs once at startup. The store list is a JSON document; each
//! store's landing page is HTML whose navigation bar carries the section
//! hierarchy. Any failure here is fatal to the caller: the scheduler cannot
//! start without a registry.

mod parser;

use std::sync::Arc;

use storefinder_crawler::HttpClient;
use storefinder_shared::{Result, Section, Store, StoreFinderError};
use tracing::{info, instrument, warn};
use url::Url;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Everything bootstrap resolved: the stores and the flattened section list.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Stores in store-list order.
    pub stores: Vec<Arc<Store>>,
    /// Sections of all stores, grouped by store in store-list order.
    pub sections: Vec<Section>,
}

// ---------------------------------------------------------------------------
// Options & progress
// ---------------------------------------------------------------------------

/// Configuration for the bootstrap process.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// URL of the JSON store list.
    pub stores_url: String,
    /// Drop stores flagged offline before resolving their sections.
    pub skip_offline: bool,
}

/// Progress callback for reporting bootstrap status.
pub trait BootstrapProgress: Send + Sync {
    /// Called once the store list is known.
    fn stores_resolved(&self, count: usize);
    /// Called before a store's sections are fetched.
    fn store_started(&self, store: &Store, current: usize, total: usize);
    /// Called when every store has been resolved.
    fn done(&self, catalog: &Catalog);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BootstrapProgress for SilentProgress {
    fn stores_resolved(&self, _count: usize) {}
    fn store_started(&self, _store: &Store, _current: usize, _total: usize) {}
    fn done(&self, _catalog: &Catalog) {}
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Resolve the store list and every store's sections.
///
/// Errors from any store abort the whole bootstrap, and an empty result is
/// reported as an error rather than handed to the scheduler.
#[instrument(skip_all, fields(stores_url = %opts.stores_url))]
pub async fn bootstrap(
    client: &HttpClient,
    opts: &BootstrapOptions,
    progress: &dyn BootstrapProgress,
) -> Result<Catalog> {
    let mut stores = fetch_stores(client, &opts.stores_url).await?;

    if opts.skip_offline {
        let before = stores.len();
        stores.retain(|s| s.online);
        info!(skipped = before - stores.len(), "dropped offline stores");
    }

    progress.stores_resolved(stores.len());

    let total = stores.len();
    let mut catalog = Catalog::default();

    for (i, store) in stores.into_iter().enumerate() {
        progress.store_started(&store, i + 1, total);
        let store = Arc::new(store);
        let sections = fetch_sections(client, &store).await?;
        if sections.is_empty() {
            warn!(store = %store.name, "store has no sections");
        }
        catalog.sections.extend(sections);
        catalog.stores.push(store);
    }

    if catalog.sections.is_empty() {
        return Err(StoreFinderError::Bootstrap(format!(
            "no sections found across {} store(s)",
            catalog.stores.len()
        )));
    }

    info!(
        stores = catalog.stores.len(),
        sections = catalog.sections.len(),
        "catalog bootstrapped"
    );
    progress.done(&catalog);

    Ok(catalog)
}

/// Fetch and decode the store list.
#[instrument(skip_all, fields(%stores_url))]
pub async fn fetch_stores(client: &HttpClient, stores_url: &str) -> Result<Vec<Store>> {
    info!("getting list of stores");
    validate_url(stores_url)?;

    let body = client
        .get_text(stores_url)
        .await
        .map_err(|e| StoreFinderError::Bootstrap(format!("store list unreachable: {e}")))?;

    let stores: Vec<Store> = serde_json::from_str(&body).map_err(|e| {
        StoreFinderError::Bootstrap(format!("store list is not valid JSON: {e}"))
    })?;

    info!(count = stores.len(), "store list decoded");
    Ok(stores)
}

/// Fetch a store's landing page and extract its sections.
#[instrument(skip_all, fields(store = %store.name))]
pub async fn fetch_sections(client: &HttpClient, store: &Arc<Store>) -> Result<Vec<Section>> {
    info!("getting sections from store");
    let url = store.url.trim();
    validate_url(url)?;

    let body = client.get_text(url).await.map_err(|e| {
        StoreFinderError::Bootstrap(format!("sections of '{}' unreachable: {e}", store.name))
    })?;

    let sections = parser::parse_sections(&body, store);
    info!(count = sections.len(), "sections resolved");
    Ok(sections)
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| StoreFinderError::Bootstrap(format!("invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(StoreFinderError::Bootstrap(format!(
            "unsupported URL scheme '{other}' in '{raw}'"
        ))),
    }
}
