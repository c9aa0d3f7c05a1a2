//! Product catalog cache that orchestrates the item store and the remote catalog.
//!
//! Loading trusts the on-disk snapshot when every entry reads back cleanly and
//! rebuilds it from the remote catalog otherwise. Stock changes are never applied
//! locally before the remote confirms them.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::storage::{ItemStore, StoreEntry, StoreError};
use super::traits::{LoadReport, LoadSource};
use crate::woo::client::{CatalogApi, ClientError};
use crate::woo::product::Product;

/// What to do with a snapshot entry that cannot be read back.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
  /// Discard the whole snapshot and rebuild it from the remote catalog
  #[default]
  ClearAll,
  /// Set aside only the bad entry and keep the rest
  Quarantine,
}

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("failed to fetch products")]
  RemoteFetch(#[source] ClientError),
  #[error("failed to parse product list")]
  RemoteParse(#[source] serde_json::Error),
  #[error("product {0} not found")]
  ProductNotFound(u64),
}

/// A snapshot entry that failed to read back.
#[derive(Debug, Error)]
enum CacheCorruption {
  #[error(transparent)]
  Unreadable(#[from] StoreError),
  #[error("invalid product document")]
  Invalid(#[from] serde_json::Error),
}

/// Result of a stock change, as confirmed by the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
  /// The remote reported a new stock level, now cached
  Applied { previous: i64, current: i64 },
  /// The remote reported the stock we already had
  Unchanged { stock: i64 },
  /// The remote response could not be interpreted; nothing changed locally
  Unconfirmed,
}

/// Display-ready projection of one cached product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductListItem {
  pub index: usize,
  pub id: u64,
  pub name: Option<String>,
  pub sku: Option<String>,
  pub stock: i64,
  pub price: Option<f64>,
  pub image_url: Option<String>,
}

impl From<&Product> for ProductListItem {
  fn from(product: &Product) -> Self {
    Self {
      index: product.index(),
      id: product.id,
      name: product.name.clone(),
      sku: product.sku.clone(),
      stock: product.stock(),
      price: product.price(),
      image_url: product.image_url().map(String::from),
    }
  }
}

/// In-memory product index backed by an item store and a remote catalog.
pub struct CatalogCache<S, C> {
  store: S,
  client: C,
  recovery: RecoveryPolicy,
  products: HashMap<u64, Product>,
  /// Product ids in load order; position is the product's ordinal
  order: Vec<u64>,
  loaded: Option<LoadReport>,
}

impl<S: ItemStore, C: CatalogApi> CatalogCache<S, C> {
  /// Create an empty cache. Nothing is read until [`CatalogCache::load`].
  pub fn new(store: S, client: C) -> Self {
    Self {
      store,
      client,
      recovery: RecoveryPolicy::default(),
      products: HashMap::new(),
      order: Vec::new(),
      loaded: None,
    }
  }

  /// Set how unreadable snapshot entries are handled.
  pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
    self.recovery = recovery;
    self
  }

  /// Number of distinct products in the index.
  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Populate the index. Only the first call does any work; later calls
  /// return the original report.
  pub async fn load(&mut self) -> Result<LoadReport, CatalogError> {
    if let Some(report) = &self.loaded {
      return Ok(report.clone());
    }
    self.reload().await
  }

  /// Rebuild the index from the store, falling back to the remote catalog when
  /// the store is empty or corrupt.
  pub async fn reload(&mut self) -> Result<LoadReport, CatalogError> {
    let mut products = self.read_snapshot();
    let mut source = LoadSource::Disk;

    if products.is_empty() {
      products = self.fetch_products().await?;
      self.write_through(&products);
      source = LoadSource::Remote;
    }

    Ok(self.install(products, source))
  }

  /// Replace the snapshot with a fresh copy of the remote catalog.
  ///
  /// The existing snapshot is only dropped once the fetch has succeeded.
  pub async fn resync(&mut self) -> Result<LoadReport, CatalogError> {
    let products = self.fetch_products().await?;
    self.store.clear();
    self.write_through(&products);
    Ok(self.install(products, LoadSource::Remote))
  }

  /// Look up a product by id.
  pub fn get(&self, id: u64) -> Option<&Product> {
    self.products.get(&id)
  }

  /// Find the first product, in ordinal order, carrying the given SKU.
  ///
  /// Numeric input also matches numeric SKUs, so a scanned "0093006" finds
  /// a product stored with SKU "93006".
  pub fn find_by_sku(&self, sku: &str) -> Option<&Product> {
    let scanned = sku.trim().parse::<i64>().ok().filter(|n| *n >= 0);
    self.products().find(|product| {
      product.sku.as_deref() == Some(sku) || scanned.is_some_and(|n| product.sku_number() == n)
    })
  }

  /// All products in ordinal order.
  pub fn products(&self) -> impl Iterator<Item = &Product> + '_ {
    self.order.iter().filter_map(|id| self.products.get(id))
  }

  /// Display-ready list of every product in ordinal order.
  pub fn list_view(&self) -> Vec<ProductListItem> {
    self.products().map(ProductListItem::from).collect()
  }

  /// Change a product's stock by `delta`, letting the remote catalog decide
  /// the resulting level.
  ///
  /// A failed or unreadable remote response leaves the cache untouched and is
  /// reported as [`StockUpdate::Unconfirmed`], not as an error.
  pub async fn apply_stock_delta(
    &mut self,
    id: u64,
    delta: i64,
  ) -> Result<StockUpdate, CatalogError> {
    let product = self
      .products
      .get(&id)
      .ok_or(CatalogError::ProductNotFound(id))?;
    let previous = product.stock();
    let ordinal = product.index();

    // Unset stock counts as zero so a negative sentinel never reaches the remote
    let target = previous.max(0).saturating_add(delta);
    debug!(id, previous, delta, target, "sending stock update");

    let raw = match self.client.update_stock(id, target).await {
      Ok(raw) => raw,
      Err(e) => {
        warn!(id, error = ?e, "stock update failed");
        return Ok(StockUpdate::Unconfirmed);
      }
    };

    let mut confirmed: Product = match serde_json::from_str(&raw) {
      Ok(product) => product,
      Err(e) => {
        warn!(id, error = %e, "unreadable stock update response");
        return Ok(StockUpdate::Unconfirmed);
      }
    };
    if confirmed.id != id {
      warn!(id, returned = confirmed.id, "stock update answered for another product");
      return Ok(StockUpdate::Unconfirmed);
    }

    let current = confirmed.stock();
    if current == previous {
      return Ok(StockUpdate::Unchanged { stock: current });
    }

    confirmed.set_index(ordinal);
    self.persist(&confirmed);
    self.products.insert(id, confirmed);

    info!(id, previous, current, "stock updated");
    Ok(StockUpdate::Applied { previous, current })
  }

  /// Read every snapshot entry. Returns an empty list when the store is empty
  /// or had to be discarded.
  fn read_snapshot(&self) -> Vec<Product> {
    let entries = self.store.enumerate();
    let mut products = Vec::with_capacity(entries.len());

    for entry in &entries {
      match self.read_entry(entry) {
        Ok(product) => products.push(product),
        Err(e) => {
          warn!(
            entry = entry.key(),
            path = %entry.path().display(),
            error = ?e,
            "corrupt product cache entry"
          );

          let quarantined = match self.recovery {
            RecoveryPolicy::ClearAll => false,
            RecoveryPolicy::Quarantine => match self.store.quarantine(entry) {
              Ok(()) => true,
              Err(e) => {
                error!(error = ?e, "quarantine failed, discarding snapshot");
                false
              }
            },
          };

          if !quarantined {
            self.store.clear();
            return Vec::new();
          }
        }
      }
    }

    if !products.is_empty() {
      debug!(count = products.len(), "read product snapshot");
    }
    products
  }

  fn read_entry(&self, entry: &StoreEntry) -> Result<Product, CacheCorruption> {
    let raw = self.store.read(entry)?;
    Ok(serde_json::from_str(&raw)?)
  }

  async fn fetch_products(&self) -> Result<Vec<Product>, CatalogError> {
    let raw = self
      .client
      .fetch_all_products()
      .await
      .map_err(CatalogError::RemoteFetch)?;
    serde_json::from_str(&raw).map_err(CatalogError::RemoteParse)
  }

  fn write_through(&self, products: &[Product]) {
    let failed = products
      .iter()
      .filter(|product| !self.persist(product))
      .count();
    if failed > 0 {
      warn!(failed, total = products.len(), "snapshot is behind the remote catalog");
    }
  }

  /// Write one product to the store. Failures are logged; the in-memory
  /// state stays authoritative until the next reload.
  fn persist(&self, product: &Product) -> bool {
    match self.store.write_entity(product) {
      Ok(()) => true,
      Err(e) => {
        error!(id = product.id, error = ?e, "failed to write product cache entry");
        false
      }
    }
  }

  fn install(&mut self, products: Vec<Product>, source: LoadSource) -> LoadReport {
    self.products.clear();
    self.order.clear();

    for mut product in products {
      let id = product.id;
      match self.products.get(&id) {
        Some(existing) => {
          warn!(id, "duplicate product id in catalog, keeping the later copy");
          product.set_index(existing.index());
        }
        None => {
          product.set_index(self.order.len());
          self.order.push(id);
        }
      }
      self.products.insert(id, product);
    }

    let report = LoadReport::new(source, self.order.len());
    info!(source = ?report.source, count = report.count, "product catalog loaded");
    self.loaded = Some(report.clone());
    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::DirStore;
  use async_trait::async_trait;
  use reqwest::StatusCode;
  use serde_json::{json, Value};
  use std::fs;
  use std::path::Path;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use tempfile::TempDir;

  enum Reply {
    /// Echo the product back with this stock level
    Stock(i64),
    Raw(&'static str),
    Fail,
  }

  struct FakeCatalog {
    products: Value,
    reply: Reply,
    fetch_fails: bool,
    fetches: AtomicUsize,
    updates: Mutex<Vec<(u64, i64)>>,
  }

  impl FakeCatalog {
    fn new(products: Value) -> Arc<Self> {
      Self::build(products, Reply::Fail, false)
    }

    fn replying(products: Value, reply: Reply) -> Arc<Self> {
      Self::build(products, reply, false)
    }

    fn unreachable() -> Arc<Self> {
      Self::build(json!([]), Reply::Fail, true)
    }

    fn build(products: Value, reply: Reply, fetch_fails: bool) -> Arc<Self> {
      Arc::new(Self {
        products,
        reply,
        fetch_fails,
        fetches: AtomicUsize::new(0),
        updates: Mutex::new(Vec::new()),
      })
    }

    fn fetches(&self) -> usize {
      self.fetches.load(Ordering::SeqCst)
    }

    fn updates(&self) -> Vec<(u64, i64)> {
      self.updates.lock().unwrap().clone()
    }

    fn unavailable() -> ClientError {
      ClientError::Status {
        status: StatusCode::BAD_GATEWAY,
        url: "https://shop.example.com".to_string(),
        body: String::new(),
      }
    }
  }

  #[async_trait]
  impl CatalogApi for FakeCatalog {
    async fn fetch_all_products(&self) -> Result<String, ClientError> {
      self.fetches.fetch_add(1, Ordering::SeqCst);
      if self.fetch_fails {
        return Err(Self::unavailable());
      }
      Ok(self.products.to_string())
    }

    async fn update_stock(&self, id: u64, stock: i64) -> Result<String, ClientError> {
      self.updates.lock().unwrap().push((id, stock));
      match &self.reply {
        Reply::Stock(level) => Ok(product_json(id, Some(*level)).to_string()),
        Reply::Raw(body) => Ok(body.to_string()),
        Reply::Fail => Err(Self::unavailable()),
      }
    }
  }

  type TestCache = CatalogCache<DirStore, Arc<FakeCatalog>>;

  fn product_json(id: u64, stock: Option<i64>) -> Value {
    json!({
      "id": id,
      "name": format!("Product {}", id),
      "sku": format!("SKU-{}", id),
      "stock_quantity": stock,
      "regular_price": "9.50",
      "images": [{"src": format!("https://cdn.example.com/{}.jpg", id)}]
    })
  }

  /// Remote catalog in an order that differs from the store's id order.
  fn remote_catalog() -> Value {
    json!([
      product_json(3, Some(5)),
      product_json(1, Some(0)),
      product_json(2, None),
    ])
  }

  fn cache(dir: &Path, client: &Arc<FakeCatalog>) -> TestCache {
    CatalogCache::new(DirStore::new(dir), Arc::clone(client))
  }

  fn read_stored(dir: &Path, id: u64) -> Product {
    let raw = fs::read_to_string(dir.join(format!("{}.json", id))).unwrap();
    serde_json::from_str(&raw).unwrap()
  }

  fn seed_store(dir: &Path, ids: &[u64]) {
    let store = DirStore::new(dir);
    for id in ids {
      store
        .write(&id.to_string(), &product_json(*id, Some(1)).to_string())
        .unwrap();
    }
  }

  #[tokio::test]
  async fn test_cold_start_fetches_and_writes_through() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote);

    let report = catalog.load().await.unwrap();

    assert_eq!(report.source, LoadSource::Remote);
    assert_eq!(report.count, 3);
    assert_eq!(remote.fetches(), 1);
    assert_eq!(DirStore::new(temp.path()).enumerate().len(), 3);
    assert_eq!(read_stored(temp.path(), 3).stock(), 5);

    let ordinals: Vec<(usize, u64)> = catalog
      .list_view()
      .iter()
      .map(|item| (item.index, item.id))
      .collect();
    assert_eq!(ordinals, vec![(0, 3), (1, 1), (2, 2)]);
  }

  #[tokio::test]
  async fn test_warm_start_skips_remote() {
    let temp = TempDir::new().unwrap();
    let first = FakeCatalog::new(remote_catalog());
    cache(temp.path(), &first).load().await.unwrap();

    let second = FakeCatalog::new(json!([product_json(99, Some(1))]));
    let mut catalog = cache(temp.path(), &second);
    let report = catalog.load().await.unwrap();

    assert_eq!(report.source, LoadSource::Disk);
    assert_eq!(second.fetches(), 0);
    assert_eq!(catalog.len(), 3);
    assert!(catalog.get(99).is_none());
    assert_eq!(catalog.get(3).unwrap().stock(), 5);
  }

  #[tokio::test]
  async fn test_load_runs_once() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote);

    let first = catalog.load().await.unwrap();
    let second = catalog.load().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(remote.fetches(), 1);
  }

  #[tokio::test]
  async fn test_one_corrupt_entry_rebuilds_everything() {
    let temp = TempDir::new().unwrap();
    seed_store(temp.path(), &[1, 3]);
    fs::write(temp.path().join("2.json"), "{\"id\": 2, \"name\": ").unwrap();

    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote);
    let report = catalog.load().await.unwrap();

    assert_eq!(report.source, LoadSource::Remote);
    assert_eq!(remote.fetches(), 1);
    assert_eq!(catalog.len(), 3);
    // Seeded entries had stock 1; the rewrite carries the remote values
    assert_eq!(read_stored(temp.path(), 3).stock(), 5);
    assert_eq!(read_stored(temp.path(), 2).stock(), -1);
    assert_eq!(catalog.get(3).unwrap().index(), 0);
  }

  #[tokio::test]
  async fn test_quarantine_keeps_good_entries() {
    let temp = TempDir::new().unwrap();
    seed_store(temp.path(), &[1, 3]);
    fs::write(temp.path().join("2.json"), "[]").unwrap();

    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote).with_recovery(RecoveryPolicy::Quarantine);
    let report = catalog.load().await.unwrap();

    assert_eq!(report.source, LoadSource::Disk);
    assert_eq!(remote.fetches(), 0);
    assert_eq!(catalog.len(), 2);
    assert!(catalog.get(2).is_none());
    assert!(temp.path().join("2.json.corrupt").exists());
  }

  #[tokio::test]
  async fn test_remote_failure_is_fatal() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::unreachable();
    let mut catalog = cache(temp.path(), &remote);

    let result = catalog.load().await;

    assert!(matches!(result, Err(CatalogError::RemoteFetch(_))));
    assert!(catalog.is_empty());
  }

  #[tokio::test]
  async fn test_unparseable_product_list_is_fatal() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(json!({"code": "rest_forbidden"}));
    let mut catalog = cache(temp.path(), &remote);

    assert!(matches!(
      catalog.load().await,
      Err(CatalogError::RemoteParse(_))
    ));
  }

  #[tokio::test]
  async fn test_lookup() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let first = catalog.get(1).cloned();
    let second = catalog.get(1).cloned();
    assert!(first.is_some());
    assert_eq!(first, second);
    assert!(catalog.get(404).is_none());

    assert_eq!(catalog.find_by_sku("SKU-2").map(|p| p.id), Some(2));
    assert!(catalog.find_by_sku("SKU-404").is_none());
  }

  #[tokio::test]
  async fn test_find_by_scanned_barcode() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(json!([
      {"id": 1, "sku": "MUG-01"},
      {"id": 2, "sku": "9300601"}
    ]));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    assert_eq!(catalog.find_by_sku("009300601").map(|p| p.id), Some(2));
    assert!(catalog.find_by_sku("-1").is_none());
  }

  #[tokio::test]
  async fn test_confirmed_stock_change() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Stock(8));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let update = catalog.apply_stock_delta(3, 3).await.unwrap();

    assert_eq!(
      update,
      StockUpdate::Applied {
        previous: 5,
        current: 8
      }
    );
    assert_eq!(remote.updates(), vec![(3, 8)]);
    assert_eq!(catalog.get(3).unwrap().stock(), 8);
    assert_eq!(catalog.get(3).unwrap().index(), 0);
    assert_eq!(read_stored(temp.path(), 3).stock(), 8);
    assert_eq!(catalog.list_view()[0].stock, 8);
  }

  #[tokio::test]
  async fn test_malformed_response_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Raw("<html>Bad Gateway</html>"));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();
    let stored_before = fs::read_to_string(temp.path().join("3.json")).unwrap();

    let update = catalog.apply_stock_delta(3, 3).await.unwrap();

    assert_eq!(update, StockUpdate::Unconfirmed);
    assert_eq!(catalog.get(3).unwrap().stock(), 5);
    let stored_after = fs::read_to_string(temp.path().join("3.json")).unwrap();
    assert_eq!(stored_before, stored_after);
  }

  #[tokio::test]
  async fn test_failed_update_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Fail);
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let update = catalog.apply_stock_delta(3, -2).await.unwrap();

    assert_eq!(update, StockUpdate::Unconfirmed);
    assert_eq!(remote.updates(), vec![(3, 3)]);
    assert_eq!(catalog.get(3).unwrap().stock(), 5);
  }

  #[tokio::test]
  async fn test_response_for_other_product_is_unconfirmed() {
    let temp = TempDir::new().unwrap();
    let other = r#"{"id": 1, "stock_quantity": 40}"#;
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Raw(other));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let update = catalog.apply_stock_delta(3, 1).await.unwrap();

    assert_eq!(update, StockUpdate::Unconfirmed);
    assert_eq!(catalog.get(1).unwrap().stock(), 0);
    assert_eq!(catalog.get(3).unwrap().stock(), 5);
  }

  #[tokio::test]
  async fn test_unset_stock_counts_as_zero() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Stock(2));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();
    assert_eq!(catalog.get(2).unwrap().stock(), -1);

    let update = catalog.apply_stock_delta(2, 2).await.unwrap();

    assert_eq!(remote.updates(), vec![(2, 2)]);
    assert_eq!(
      update,
      StockUpdate::Applied {
        previous: -1,
        current: 2
      }
    );
  }

  #[tokio::test]
  async fn test_unchanged_stock_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Stock(5));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();
    fs::remove_file(temp.path().join("3.json")).unwrap();

    let update = catalog.apply_stock_delta(3, 0).await.unwrap();

    assert_eq!(update, StockUpdate::Unchanged { stock: 5 });
    assert!(!temp.path().join("3.json").exists());
  }

  #[tokio::test]
  async fn test_unknown_product_is_not_sent() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Stock(1));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let result = catalog.apply_stock_delta(404, 1).await;

    assert!(matches!(result, Err(CatalogError::ProductNotFound(404))));
    assert!(remote.updates().is_empty());
  }

  #[tokio::test]
  async fn test_write_failure_keeps_memory_state() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("products");
    fs::write(&blocker, "not a directory").unwrap();

    let remote = FakeCatalog::replying(remote_catalog(), Reply::Stock(9));
    let mut catalog = cache(&blocker, &remote);

    let report = catalog.load().await.unwrap();
    assert_eq!(report.count, 3);

    let update = catalog.apply_stock_delta(3, 4).await.unwrap();
    assert_eq!(
      update,
      StockUpdate::Applied {
        previous: 5,
        current: 9
      }
    );
    assert_eq!(catalog.get(3).unwrap().stock(), 9);
  }

  #[tokio::test]
  async fn test_resync_replaces_snapshot() {
    let temp = TempDir::new().unwrap();
    seed_store(temp.path(), &[1, 7]);

    let remote = FakeCatalog::new(remote_catalog());
    let mut catalog = cache(temp.path(), &remote);
    assert_eq!(catalog.load().await.unwrap().source, LoadSource::Disk);

    let report = catalog.resync().await.unwrap();

    assert_eq!(report.source, LoadSource::Remote);
    assert_eq!(catalog.len(), 3);
    assert!(catalog.get(7).is_none());
    assert!(!temp.path().join("7.json").exists());
    assert_eq!(DirStore::new(temp.path()).enumerate().len(), 3);
  }

  #[tokio::test]
  async fn test_failed_resync_keeps_snapshot() {
    let temp = TempDir::new().unwrap();
    seed_store(temp.path(), &[1, 7]);

    let remote = FakeCatalog::unreachable();
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    assert!(catalog.resync().await.is_err());
    assert_eq!(catalog.len(), 2);
    assert_eq!(DirStore::new(temp.path()).enumerate().len(), 2);
  }

  #[tokio::test]
  async fn test_loosely_shaped_fields_still_load() {
    let temp = TempDir::new().unwrap();
    let remote = FakeCatalog::new(json!([
      {"id": 1, "name": "Tea towel", "categories": ["Kitchen"]},
      {"id": 2, "categories": [{"name": "Kitchen"}], "images": "none"},
      {"id": 3, "attributes": [{"name": "Size", "options": [1, 2]}], "stock_quantity": 4}
    ]));
    let mut catalog = cache(temp.path(), &remote);

    let report = catalog.load().await.unwrap();
    assert_eq!(report.count, 3);
    assert_eq!(
      catalog.get(1).unwrap().categories[0].name.as_deref(),
      Some("Kitchen")
    );
    assert_eq!(catalog.get(2).unwrap().get("images"), Some(json!("none")));
    assert_eq!(catalog.get(3).unwrap().stock(), 4);

    // The written snapshot reads back without falling back to the remote
    let again = FakeCatalog::new(json!([]));
    let mut warm = cache(temp.path(), &again);
    let report = warm.load().await.unwrap();
    assert_eq!(report.source, LoadSource::Disk);
    assert_eq!(report.count, 3);
    assert_eq!(again.fetches(), 0);
    assert_eq!(warm.get(2).unwrap().get("images"), Some(json!("none")));
  }

  #[tokio::test]
  async fn test_loosely_shaped_response_confirms_update() {
    let temp = TempDir::new().unwrap();
    let reply = r#"{"id": 3, "stock_quantity": 7, "categories": ["Kitchen"]}"#;
    let remote = FakeCatalog::replying(remote_catalog(), Reply::Raw(reply));
    let mut catalog = cache(temp.path(), &remote);
    catalog.load().await.unwrap();

    let update = catalog.apply_stock_delta(3, 2).await.unwrap();

    assert_eq!(
      update,
      StockUpdate::Applied {
        previous: 5,
        current: 7
      }
    );
  }

  #[test]
  fn test_error_text_leaves_cause_to_source() {
    let cause = serde_json::from_str::<Value>("{").unwrap_err();
    let err = CatalogError::RemoteParse(cause);

    assert_eq!(err.to_string(), "failed to parse product list");
    assert!(std::error::Error::source(&err).is_some());
  }
}
