//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key, which also names the
/// entity's entry in the item store.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., product id)
  fn cache_key(&self) -> String;
}

/// Outcome of loading the catalog, including metadata about the source.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
  /// Where the data came from
  pub source: LoadSource,
  /// Number of products indexed
  pub count: usize,
  /// When the index was built
  pub loaded_at: DateTime<Utc>,
}

impl LoadReport {
  pub fn new(source: LoadSource, count: usize) -> Self {
    Self {
      source,
      count,
      loaded_at: Utc::now(),
    }
  }
}

/// Indicates where loaded data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
  /// Snapshot read back from the item store
  Disk,
  /// Fresh data from the network, written through to the item store
  Remote,
}
