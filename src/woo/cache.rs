//! Caching implementations for WooCommerce types.

use crate::cache::Cacheable;

use super::product::Product;

impl Cacheable for Product {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }
}
