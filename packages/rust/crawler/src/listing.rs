//! Product listing extraction from a section page.
//!
//! Listing pages render one `.clearfix` block per product inside
//! `.hProductItems`, with the name in `.thumbTitle`, the display price in
//! `.thumbPrice` and the detail link on the `.thumbnail` anchor.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use storefinder_shared::RawProduct;

static ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".hProductItems .clearfix").expect("item selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".thumbTitle").expect("title selector"));
static PRICE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".thumbPrice").expect("price selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".thumbnail a").expect("link selector"));

/// Extract every product block from a listing page.
///
/// Fields are whitespace-trimmed. Blocks with missing fields yield empty
/// strings; deciding whether such a record is usable is left to the cache.
pub fn parse_product_list(html: &str) -> Vec<RawProduct> {
    let doc = Html::parse_document(html);
    doc.select(&ITEM_SEL)
        .map(|item| RawProduct {
            name: first_text(&item, &TITLE_SEL),
            price: first_text(&item, &PRICE_SEL),
            link: item
                .select(&LINK_SEL)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.trim().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

fn first_text(item: &ElementRef<'_>, sel: &Selector) -> String {
    item.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
