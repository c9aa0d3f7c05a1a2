//! Item store trait and directory-backed implementation.
//!
//! Each entity lives in its own `<key>.json` file. There is no manifest:
//! the directory listing is the index.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::traits::Cacheable;

const ENTRY_EXTENSION: &str = "json";
const QUARANTINE_EXTENSION: &str = "json.corrupt";
const TEMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to {action} {}", path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to serialize entry")]
  Serialize(#[from] serde_json::Error),
}

impl StoreError {
  fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
    let path = path.to_path_buf();
    move |source| Self::Io {
      action,
      path,
      source,
    }
  }
}

/// Handle to one stored entry, as returned by [`ItemStore::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
  key: String,
  path: PathBuf,
}

impl StoreEntry {
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// Trait for durable item storage backends.
pub trait ItemStore: Send + Sync {
  /// List all entries in a deterministic order. A missing or empty store
  /// yields an empty list.
  fn enumerate(&self) -> Vec<StoreEntry>;

  /// Read the raw contents of an entry.
  fn read(&self, entry: &StoreEntry) -> Result<String, StoreError>;

  /// Write one entry, replacing any previous contents.
  fn write(&self, key: &str, raw: &str) -> Result<(), StoreError>;

  /// Remove every entry, along with quarantined entries and leftovers of
  /// interrupted writes. Safe to call on an empty store.
  fn clear(&self);

  /// Move an entry out of the way so it is no longer enumerated.
  fn quarantine(&self, entry: &StoreEntry) -> Result<(), StoreError>;

  /// Serialize an entity and write it under its cache key.
  fn write_entity<T: Cacheable>(&self, entity: &T) -> Result<(), StoreError>
  where
    Self: Sized,
  {
    let raw = serde_json::to_string(entity)?;
    self.write(&entity.cache_key(), &raw)
  }
}

/// Store keeping one JSON file per entity in a single directory.
#[derive(Debug, Clone)]
pub struct DirStore {
  dir: PathBuf,
}

impl DirStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn entry_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
  }
}

impl ItemStore for DirStore {
  fn enumerate(&self) -> Vec<StoreEntry> {
    let Ok(read_dir) = fs::read_dir(&self.dir) else {
      return Vec::new();
    };

    let mut entries: Vec<StoreEntry> = read_dir
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION))
      .filter_map(|path| {
        let key = path.file_stem()?.to_str()?.to_string();
        Some(StoreEntry { key, path })
      })
      .collect();

    // Numeric keys first, in numeric order
    entries.sort_by_cached_key(|entry| {
      let numeric = entry.key.parse::<u64>().ok();
      (numeric.is_none(), numeric, entry.key.clone())
    });
    entries
  }

  fn read(&self, entry: &StoreEntry) -> Result<String, StoreError> {
    fs::read_to_string(&entry.path).map_err(StoreError::io("read", &entry.path))
  }

  fn write(&self, key: &str, raw: &str) -> Result<(), StoreError> {
    fs::create_dir_all(&self.dir).map_err(StoreError::io("create", &self.dir))?;

    // Write to a sibling temp file and rename so readers never see a torn entry
    let path = self.entry_path(key);
    let tmp = path.with_extension(TEMP_EXTENSION);
    fs::write(&tmp, raw).map_err(StoreError::io("write", &tmp))?;
    fs::rename(&tmp, &path).map_err(StoreError::io("replace", &path))?;

    debug!(key, path = %path.display(), "stored entry");
    Ok(())
  }

  fn clear(&self) {
    let Ok(read_dir) = fs::read_dir(&self.dir) else {
      return;
    };

    let mut removed = 0;
    for path in read_dir.filter_map(|entry| entry.ok()).map(|entry| entry.path()) {
      if !path.is_file() || !is_store_file(&path) {
        continue;
      }
      match fs::remove_file(&path) {
        Ok(()) => removed += 1,
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove cache entry"),
      }
    }
    debug!(dir = %self.dir.display(), removed, "cleared store");
  }

  fn quarantine(&self, entry: &StoreEntry) -> Result<(), StoreError> {
    let target = entry.path.with_extension(QUARANTINE_EXTENSION);
    fs::rename(&entry.path, &target).map_err(StoreError::io("quarantine", &entry.path))?;
    warn!(path = %target.display(), "quarantined cache entry");
    Ok(())
  }
}

/// Entries, quarantined entries and temp files all belong to the store.
fn is_store_file(path: &Path) -> bool {
  let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
    return false;
  };
  [ENTRY_EXTENSION, QUARANTINE_EXTENSION, TEMP_EXTENSION]
    .iter()
    .any(|ext| name.ends_with(&format!(".{}", ext)))
}
