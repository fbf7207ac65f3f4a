//! Section fetching: the seam between fetch tasks and the network.

use std::future::Future;

use tracing::{debug, instrument};

use storefinder_shared::{HttpConfig, RawProduct, Result, Section};

use crate::client::HttpClient;
use crate::listing::parse_product_list;

/// Retrieves the current product listing of one section.
///
/// Implementations must be shareable across workers.
pub trait SectionFetcher: Send + Sync + 'static {
    /// Fetch and decode the listing behind `section.url`.
    fn fetch_products(
        &self,
        section: &Section,
    ) -> impl Future<Output = Result<Vec<RawProduct>>> + Send;
}

/// [`SectionFetcher`] backed by HTTP and the listing markup extractor.
#[derive(Debug, Clone)]
pub struct HttpSectionFetcher {
    client: HttpClient,
}

impl HttpSectionFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }

    /// Create a fetcher that reuses an existing client.
    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

impl SectionFetcher for HttpSectionFetcher {
    #[instrument(skip_all, fields(store = %section.store.name, section = %section.name))]
    async fn fetch_products(&self, section: &Section) -> Result<Vec<RawProduct>> {
        let body = self.client.get_text(&section.url).await?;
        let products = parse_product_list(&body);
        debug!(count = products.len(), "listing decoded");
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use storefinder_shared::{Store, StoreFinderError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn section_at(base: &str) -> Section {
        Section {
            name: "Despensa".into(),
            url: format!("{base}/carlos3/Products?depPid=46"),
            parent: String::new(),
            store: Arc::new(Store {
                id: 1,
                name: "Carlos III".into(),
                province: "La Habana".into(),
                online: true,
                email: String::new(),
                phone: String::new(),
                url: format!("{base}/carlos3"),
            }),
            priority: 0,
        }
    }

    fn config() -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_fetch_products_from_mock_server() {
        let server = MockServer::start().await;
        let page = r#"<div class="hProductItems"><ul>
            <li class="clearfix">
                <div class="thumbnail"><a href="Item?ProdPid=1"></a></div>
                <div class="thumbTitle">Pollo</div>
                <div class="thumbPrice">$ 5.00</div>
            </li>
        </ul></div>"#;

        Mock::given(method("GET"))
            .and(path("/carlos3/Products"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let fetcher = HttpSectionFetcher::new(&config()).unwrap();
        let products = fetcher
            .fetch_products(&section_at(&server.uri()))
            .await
            .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Pollo");
        assert_eq!(products[0].link, "Item?ProdPid=1");
    }

    #[tokio::test]
    async fn test_fetch_products_propagates_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpSectionFetcher::new(&config()).unwrap();
        let err = fetcher
            .fetch_products(&section_at(&server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreFinderError::Network(_)));
    }
}
