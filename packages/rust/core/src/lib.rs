//! Refresh engine for StoreFinder.
//!
//! This crate keeps an in-memory product snapshot fresh: the scheduler walks
//! the section registry, the worker pool runs fetch tasks, and the cache
//! serves queries while tasks overwrite it.

pub mod cache;
pub mod finder;
pub mod pool;
pub mod scheduler;
pub mod task;

pub use cache::ProductCache;
pub use finder::{FinderConfig, StoreFinder};
pub use pool::{Task, WorkerPool};
pub use scheduler::{PassReport, RegistryEntry, Scheduler};
pub use task::FetchTask;
