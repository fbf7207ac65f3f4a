//! Shared types, error model, and configuration for StoreFinder.
//!
//! This crate is the foundation depended on by all other StoreFinder crates.
//! It provides:
//! - [`StoreFinderError`] — the unified error type
//! - Domain types ([`Store`], [`Section`], [`RawProduct`], [`Product`], [`ProductView`])
//! - Configuration ([`AppConfig`], [`HttpConfig`], [`RefreshConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, HttpConfig, HttpSettings, MAX_REFRESH_INTERVAL, MAX_TICK,
    PoolConfig, RefreshConfig, SchedulerConfig, ServerConfig, config_dir, config_file_path,
    default_workers, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, StoreFinderError};
pub use types::{Product, ProductView, RawProduct, Section, Store, qualify_link};
