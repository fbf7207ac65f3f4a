//! Store navigation parser.
//!
//! A store's landing page lists its catalog in `.nav li` items:
//! - `default.aspx` is the home link and is skipped
//! - `#` marks a category header whose label becomes the parent of the
//!   sections that follow it
//! - anything else is a section link relative to the store URL

use std::sync::Arc;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use storefinder_shared::{Section, Store, qualify_link};

/// Home link present in every store navigation bar.
const HOME_LINK: &str = "default.aspx";

/// Placeholder href used by category headers.
const HEADER_LINK: &str = "#";

static NAV_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".nav li").expect("nav item selector"));
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("anchor selector"));

/// A navigation entry before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NavEntry {
    /// Link text.
    pub name: String,
    /// Raw href attribute.
    pub href: String,
}

/// Collect `(text, href)` pairs from every `.nav li` in document order.
pub(crate) fn parse_nav_entries(html: &str) -> Vec<NavEntry> {
    let doc = Html::parse_document(html);
    doc.select(&NAV_ITEM_SEL)
        .filter_map(|li| li.select(&ANCHOR_SEL).next())
        .map(|a| NavEntry {
            name: a.text().collect::<String>().trim().to_string(),
            href: a.value().attr("href").unwrap_or_default().trim().to_string(),
        })
        .collect()
}

/// Turn a store landing page into its sections.
pub(crate) fn parse_sections(html: &str, store: &Arc<Store>) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_parent = String::new();

    for entry in parse_nav_entries(html) {
        match entry.href.as_str() {
            "" | HOME_LINK => continue,
            HEADER_LINK => current_parent = entry.name,
            href => sections.push(Section {
                name: entry.name,
                url: qualify_link(store.base_url(), href),
                parent: current_parent.clone(),
                store: Arc::clone(store),
                priority: 0,
            }),
        }
    }

    sections
}
