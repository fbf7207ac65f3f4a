//! Fetch task: refreshes one section's products in the cache.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use storefinder_crawler::SectionFetcher;
use storefinder_shared::{Product, Result, Section};

use crate::cache::ProductCache;
use crate::pool::Task;

/// Unit of work bound to a snapshot of one section.
///
/// The section is captured by value at dispatch time; later changes to the
/// scheduler's registry are never observed by a running task.
pub struct FetchTask<F> {
    section: Arc<Section>,
    fetcher: Arc<F>,
    cache: Arc<ProductCache>,
}

impl<F: SectionFetcher> FetchTask<F> {
    /// Build a task for `section`.
    pub fn new(section: Arc<Section>, fetcher: Arc<F>, cache: Arc<ProductCache>) -> Self {
        Self {
            section,
            fetcher,
            cache,
        }
    }

    #[instrument(skip_all, fields(store = %self.section.store.name, section = %self.section.name))]
    async fn refresh(self) -> Result<()> {
        let raw = self.fetcher.fetch_products(&self.section).await?;
        let observed_at = Utc::now();
        let fetched = raw.len();

        let products = raw
            .into_iter()
            .map(|r| Product::from_raw(r, Arc::clone(&self.section), observed_at));
        let stored = self.cache.upsert_batch(products);

        info!(fetched, stored, "section refreshed");
        Ok(())
    }
}

impl<F: SectionFetcher> Task for FetchTask<F> {
    fn label(&self) -> String {
        self.section.to_string()
    }

    async fn run(self) -> Result<()> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefinder_shared::{RawProduct, Store, StoreFinderError};

    struct StaticFetcher {
        products: Vec<RawProduct>,
    }

    impl SectionFetcher for StaticFetcher {
        async fn fetch_products(&self, _section: &Section) -> Result<Vec<RawProduct>> {
            Ok(self.products.clone())
        }
    }

    struct FailingFetcher;

    impl SectionFetcher for FailingFetcher {
        async fn fetch_products(&self, section: &Section) -> Result<Vec<RawProduct>> {
            Err(StoreFinderError::Network(format!("{}: connection reset", section.url)))
        }
    }

    fn section() -> Arc<Section> {
        Arc::new(Section {
            name: "Cárnicos".into(),
            url: "https://www.example.cu/carlos3/Products?depPid=46".into(),
            parent: "Alimentos".into(),
            store: Arc::new(Store {
                id: 1,
                name: "Carlos III".into(),
                province: "La Habana".into(),
                online: true,
                email: String::new(),
                phone: String::new(),
                url: "https://www.example.cu/carlos3".into(),
            }),
            priority: 0,
        })
    }

    fn raw(name: &str, link: &str) -> RawProduct {
        RawProduct {
            name: name.into(),
            price: "$ 1.00".into(),
            link: link.into(),
        }
    }

    #[tokio::test]
    async fn caches_products_with_qualified_links() {
        let cache = Arc::new(ProductCache::new());
        let fetcher = Arc::new(StaticFetcher {
            products: vec![raw("Pollo", "Item?ProdPid=1"), raw("Picadillo", "/Item?ProdPid=2")],
        });

        FetchTask::new(section(), fetcher, Arc::clone(&cache))
            .run()
            .await
            .unwrap();

        let found = cache.search("");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Picadillo");
        assert_eq!(found[0].link, "https://www.example.cu/carlos3/Item?ProdPid=2");
        assert_eq!(
            found[1].section.as_ref().map(|s| s.name.as_str()),
            Some("Cárnicos")
        );
    }

    #[tokio::test]
    async fn one_bad_record_does_not_abort_the_batch() {
        let cache = Arc::new(ProductCache::new());
        let fetcher = Arc::new(StaticFetcher {
            products: vec![raw("Pollo", "a"), raw("   ", "b"), raw("Huevos", "c")],
        });

        FetchTask::new(section(), fetcher, Arc::clone(&cache))
            .run()
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn fetch_error_leaves_cache_untouched() {
        let cache = Arc::new(ProductCache::new());
        let task = FetchTask::new(section(), Arc::new(FailingFetcher), Arc::clone(&cache));
        assert_eq!(task.label(), "Carlos III / Alimentos / Cárnicos");

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, StoreFinderError::Network(_)));
        assert!(cache.is_empty());
    }
}
