//! HTTP transport and product listing extraction.
//!
//! This crate provides:
//! - [`HttpClient`] — reqwest client with bounded retry on transient failures
//! - [`listing`] — CSS-selector extraction of products from a section page
//! - [`SectionFetcher`] — the trait fetch tasks call, with an HTTP implementation

pub mod client;
pub mod fetcher;
pub mod listing;

pub use client::HttpClient;
pub use fetcher::{HttpSectionFetcher, SectionFetcher};
pub use listing::parse_product_list;
