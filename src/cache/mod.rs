//! Product snapshot caching for offline-first catalog access.
//!
//! This module provides the caching mechanism that:
//! - Keeps one durable entry per product in an item store
//! - Trusts a complete snapshot indefinitely, with no freshness check
//! - Rebuilds the snapshot from the remote catalog when it is empty or corrupt
//! - Reconciles stock changes only after the remote confirms them

mod catalog;
mod storage;
mod traits;

pub use catalog::{CatalogCache, ProductListItem, RecoveryPolicy, StockUpdate};
pub use storage::{DirStore, ItemStore};
pub use traits::{Cacheable, LoadReport, LoadSource};
