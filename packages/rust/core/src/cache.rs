//! Concurrent product cache.
//!
//! Maps a product identity (product name + store name) to the latest observed
//! [`Product`]. Writers are fetch tasks running on pool workers; readers are
//! query handlers. Both go through the same sharded map, so callers never
//! coordinate, and every entry is replaced as a whole value.

use dashmap::DashMap;
use tracing::{debug, warn};

use storefinder_shared::{Product, Result};

/// Latest-observation cache keyed by product identity.
#[derive(Debug, Default)]
pub struct ProductCache {
    entries: DashMap<String, Product>,
}

impl ProductCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for the product's identity.
    ///
    /// Fails with `InvalidRecord` if the identity cannot be computed; the
    /// cache is left untouched in that case.
    pub fn upsert(&self, product: Product) -> Result<()> {
        let key = product.identity()?;
        self.entries.insert(key, product);
        Ok(())
    }

    /// Upsert every product, skipping (and logging) records without an identity.
    ///
    /// Returns the number of records stored.
    pub fn upsert_batch(&self, products: impl IntoIterator<Item = Product>) -> usize {
        let mut stored = 0;
        for product in products {
            let name = product.name.clone();
            match self.upsert(product) {
                Ok(()) => stored += 1,
                Err(e) => warn!(product = %name, error = %e, "skipping product"),
            }
        }
        debug!(stored, total = self.entries.len(), "batch cached");
        stored
    }

    /// Snapshot of all products whose name contains `pattern` (case-sensitive).
    ///
    /// An empty pattern matches every entry. Results are ordered by product
    /// name, then store name.
    pub fn search(&self, pattern: &str) -> Vec<Product> {
        let mut matches: Vec<Product> = self
            .entries
            .iter()
            .filter(|entry| entry.value().name.contains(pattern))
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.store_name().cmp(&b.store_name()))
        });
        matches
    }

    /// Number of cached products.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
