//! Core domain types: stores, sections, and the products observed in them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreFinderError};

/// Separator placed between the product name and store name in cache keys.
const IDENTITY_SEPARATOR: char = '\u{1f}';

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A storefront as published in the store list JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Numeric store identifier.
    pub id: i64,
    /// Display name; part of every product identity.
    pub name: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Base catalog URL. Section and product links are qualified against it.
    pub url: String,
}

impl Store {
    /// Base URL without surrounding whitespace or a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A catalog category within a store.
///
/// Cloning a `Section` yields an immutable snapshot: the scheduler keeps the
/// ready time next to it, never inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Display name.
    pub name: String,
    /// Fully-qualified listing URL.
    pub url: String,
    /// Parent category label; empty for top-level sections.
    pub parent: String,
    /// Owning store.
    pub store: Arc<Store>,
    /// Ordering hint carried from bootstrap. Not used by the scheduler.
    pub priority: i32,
}

impl Section {
    /// Identity used to tell sections apart across stores.
    pub fn key(&self) -> String {
        format!("{}{IDENTITY_SEPARATOR}{}", self.store.id, self.url)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.parent.is_empty() {
            write!(f, "{} / {}", self.store.name, self.name)
        } else {
            write!(f, "{} / {} / {}", self.store.name, self.parent, self.name)
        }
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A product as extracted from a listing page, before it is bound to a section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProduct {
    pub name: String,
    pub price: String,
    /// Link as found in the markup, usually relative to the store base URL.
    pub link: String,
}

/// A product observed in a section at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    /// Display price, kept exactly as the storefront renders it.
    pub price: String,
    /// Qualified product detail URL.
    pub link: String,
    /// Section the product was observed in.
    pub section: Option<Arc<Section>>,
    /// When the listing containing this product was fetched.
    pub observed_at: DateTime<Utc>,
}

impl Product {
    /// Bind a raw listing entry to the section it came from.
    pub fn from_raw(raw: RawProduct, section: Arc<Section>, observed_at: DateTime<Utc>) -> Self {
        let link = qualify_link(section.store.base_url(), &raw.link);
        Self {
            name: raw.name,
            price: raw.price,
            link,
            section: Some(section),
            observed_at,
        }
    }

    /// Cache identity: product name joined with the owning store name.
    pub fn identity(&self) -> Result<String> {
        if self.name.trim().is_empty() {
            return Err(StoreFinderError::invalid_record("product has no name"));
        }
        let section = self.section.as_ref().ok_or_else(|| {
            StoreFinderError::invalid_record(format!(
                "product '{}' has no owning section",
                self.name
            ))
        })?;
        if section.store.name.trim().is_empty() {
            return Err(StoreFinderError::invalid_record(format!(
                "product '{}' belongs to a store without a name",
                self.name
            )));
        }
        Ok(format!(
            "{}{IDENTITY_SEPARATOR}{}",
            self.name, section.store.name
        ))
    }

    /// Name of the owning store, if known.
    pub fn store_name(&self) -> Option<&str> {
        self.section.as_ref().map(|s| s.store.name.as_str())
    }
}

/// The public shape of a product in query responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub name: String,
    pub price: String,
    pub link: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price.clone(),
            link: product.link.clone(),
        }
    }
}

/// Qualify a listing link against a store base URL.
///
/// Absolute links are returned unchanged.
pub fn qualify_link(base: &str, link: &str) -> String {
    let link = link.trim();
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        link.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str) -> Arc<Store> {
        Arc::new(Store {
            id: 1,
            name: name.into(),
            province: "La Habana".into(),
            online: true,
            email: String::new(),
            phone: String::new(),
            url: "https://www.example.cu/carlos3/ ".into(),
        })
    }

    fn section(store_name: &str) -> Arc<Section> {
        Arc::new(Section {
            name: "Aseo".into(),
            url: "https://www.example.cu/carlos3/Products?depPid=46".into(),
            parent: "Hogar".into(),
            store: store(store_name),
            priority: 0,
        })
    }

    #[test]
    fn store_deserializes_with_missing_optional_fields() {
        let json = r#"{"id": 7, "name": "Carlos III", "url": "https://www.example.cu/carlos3", "cadena": "CIMEX"}"#;
        let parsed: Store = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.id, 7);
        assert!(!parsed.online);
        assert!(parsed.province.is_empty());
    }

    #[test]
    fn qualify_relative_and_absolute_links() {
        assert_eq!(
            qualify_link("https://www.example.cu/carlos3/", "/Item?ProdPid=1"),
            "https://www.example.cu/carlos3/Item?ProdPid=1"
        );
        assert_eq!(
            qualify_link("https://www.example.cu/carlos3", " Item?ProdPid=2 "),
            "https://www.example.cu/carlos3/Item?ProdPid=2"
        );
        assert_eq!(
            qualify_link("https://www.example.cu/carlos3", "https://cdn.example.cu/x"),
            "https://cdn.example.cu/x"
        );
    }

    #[test]
    fn product_from_raw_qualifies_link() {
        let raw = RawProduct {
            name: "Detergente".into(),
            price: "$ 1.50".into(),
            link: "Item?ProdPid=9".into(),
        };
        let product = Product::from_raw(raw, section("Carlos III"), Utc::now());
        assert_eq!(product.link, "https://www.example.cu/carlos3/Item?ProdPid=9");
        assert_eq!(product.store_name(), Some("Carlos III"));
    }

    #[test]
    fn identity_combines_product_and_store() {
        let a = Product::from_raw(
            RawProduct { name: "Pollo".into(), ..Default::default() },
            section("Carlos III"),
            Utc::now(),
        );
        let b = Product::from_raw(
            RawProduct { name: "Pollo".into(), ..Default::default() },
            section("La Puntilla"),
            Utc::now(),
        );
        assert_ne!(a.identity().unwrap(), b.identity().unwrap());
        assert!(a.identity().unwrap().starts_with("Pollo"));
    }

    #[test]
    fn identity_requires_name_and_section() {
        let orphan = Product {
            name: "Pollo".into(),
            price: "$ 5.00".into(),
            link: String::new(),
            section: None,
            observed_at: Utc::now(),
        };
        assert!(matches!(
            orphan.identity(),
            Err(StoreFinderError::InvalidRecord { .. })
        ));

        let nameless = Product::from_raw(RawProduct::default(), section("Carlos III"), Utc::now());
        assert!(nameless.identity().is_err());

        let storeless = Product::from_raw(
            RawProduct { name: "Pollo".into(), ..Default::default() },
            section("  "),
            Utc::now(),
        );
        assert!(storeless.identity().is_err());
    }

    #[test]
    fn section_display_includes_parent() {
        let s = section("Carlos III");
        assert_eq!(s.to_string(), "Carlos III / Hogar / Aseo");
    }

    #[test]
    fn product_view_serializes_public_fields() {
        let product = Product::from_raw(
            RawProduct {
                name: "Pollo".into(),
                price: "$ 5.00".into(),
                link: "Item?ProdPid=3".into(),
            },
            section("Carlos III"),
            Utc::now(),
        );
        let json = serde_json::to_value(ProductView::from(&product)).expect("serialize");
        assert_eq!(json["name"], "Pollo");
        assert_eq!(json["price"], "$ 5.00");
        assert_eq!(json["link"], "https://www.example.cu/carlos3/Item?ProdPid=3");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
