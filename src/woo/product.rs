//! Product documents as served by the WooCommerce REST API.
//!
//! The remote API is loose about types (stock and prices arrive as numbers or
//! strings depending on the plugin version, older versions list categories by
//! name). Only `id` is required. Every other known key is read into its typed
//! field when it fits and kept verbatim in `extra` when it does not, so one
//! oddly shaped field never costs the whole record. Keys this module does not
//! know about are kept in `extra` and written back untouched.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Stock reported for products whose `stock_quantity` is unset or not a number.
pub const UNSET_STOCK: i64 = -1;

#[derive(Debug, Error)]
pub enum ProductError {
  #[error("product id cannot be changed")]
  ImmutableId,
  #[error("invalid value for `{key}`")]
  InvalidValue {
    key: String,
    #[source]
    source: serde_json::Error,
  },
  #[error("`{key}` expects a number, got {value}")]
  NotANumber { key: String, value: Value },
  #[error("`{key}` expects text, got {value}")]
  NotText { key: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  #[serde(default)]
  pub src: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub slug: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A named group of options, e.g. "Size": ["S", "M", "L"].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeGroup {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A lazily computed value that never takes part in equality.
#[derive(Debug, Clone, Default)]
struct Memo<T>(OnceLock<T>);

impl<T> PartialEq for Memo<T> {
  fn eq(&self, _other: &Self) -> bool {
    true
  }
}

/// One product of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Product {
  pub id: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stock_quantity: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub regular_price: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub permalink: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub in_stock: Option<bool>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<Image>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub categories: Vec<Category>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub attributes: Vec<AttributeGroup>,
  /// Remote keys without a typed field, or whose value did not fit it
  #[serde(flatten)]
  pub extra: Map<String, Value>,

  #[serde(skip)]
  image_url: Memo<Option<String>>,
  #[serde(skip)]
  index: usize,
}

/// Wire shape of a product: the id is required, everything else is read by key.
#[derive(Deserialize)]
struct ProductDocument {
  id: u64,
  #[serde(flatten)]
  fields: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Product {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let document = ProductDocument::deserialize(deserializer)?;
    let mut product = Product {
      id: document.id,
      ..Default::default()
    };
    for (key, value) in document.fields {
      product.absorb(key, value);
    }
    Ok(product)
  }
}

impl Product {
  /// Current stock, or [`UNSET_STOCK`] when the product does not track it.
  pub fn stock(&self) -> i64 {
    self.stock_quantity.unwrap_or(UNSET_STOCK)
  }

  /// Numeric SKU as printed on barcodes, or -1 for non-numeric SKUs.
  pub fn sku_number(&self) -> i64 {
    self
      .sku
      .as_deref()
      .and_then(|sku| sku.trim().parse().ok())
      .unwrap_or(-1)
  }

  pub fn price(&self) -> Option<f64> {
    self.regular_price.as_deref()?.trim().parse().ok()
  }

  /// Source of the first image. Computed on first use and kept for the life
  /// of this instance.
  pub fn image_url(&self) -> Option<&str> {
    self
      .image_url
      .0
      .get_or_init(|| self.images.first().map(|image| image.src.clone()))
      .as_deref()
  }

  /// Position of the product in the loaded catalog.
  pub fn index(&self) -> usize {
    self.index
  }

  pub(crate) fn set_index(&mut self, index: usize) {
    self.index = index;
  }

  /// Look up a field by its remote key.
  pub fn get(&self, key: &str) -> Option<Value> {
    let typed = match key {
      "id" => Some(self.id.into()),
      "name" => self.name.clone().map(Value::from),
      "sku" => self.sku.clone().map(Value::from),
      "stock_quantity" => self.stock_quantity.map(Value::from),
      "regular_price" => self.regular_price.clone().map(Value::from),
      "description" => self.description.clone().map(Value::from),
      "permalink" => self.permalink.clone().map(Value::from),
      "in_stock" => self.in_stock.map(Value::from),
      "images" => non_empty(&self.images),
      "categories" => non_empty(&self.categories),
      "attributes" | "product_attributes" => non_empty(&self.attributes),
      _ => None,
    };
    typed.or_else(|| self.extra.get(key).cloned())
  }

  /// Set a field by its remote key. `null` clears optional fields. A value
  /// that does not fit a typed field is rejected and leaves the product as it
  /// was.
  pub fn put(&mut self, key: &str, value: Value) -> Result<(), ProductError> {
    match key {
      "id" => return Err(ProductError::ImmutableId),
      "name" => self.name = parse_field(key, value)?,
      "sku" => self.sku = parse_text(key, value)?,
      "stock_quantity" => self.stock_quantity = parse_number(key, value)?,
      "regular_price" => self.regular_price = parse_text(key, value)?,
      "description" => self.description = parse_field(key, value)?,
      "permalink" => self.permalink = parse_field(key, value)?,
      "in_stock" => self.in_stock = parse_field(key, value)?,
      "images" => {
        self.images = parse_field(key, value)?;
        self.image_url = Memo::default();
      }
      "categories" => self.categories = parse_field(key, named_entries(value))?,
      "attributes" | "product_attributes" => {
        self.attributes = parse_field(key, value)?;
        self.extra.remove("attributes");
        self.extra.remove("product_attributes");
      }
      _ => {
        self.extra.insert(key.to_string(), value);
        return Ok(());
      }
    }
    // A typed value replaces any raw one kept earlier
    self.extra.remove(key);
    Ok(())
  }

  /// Read one field of a stored or remote document, keeping values that do
  /// not fit their typed field verbatim in `extra`.
  fn absorb(&mut self, key: String, value: Value) {
    if let Err(e) = self.put(&key, value.clone()) {
      debug!(id = self.id, key = %key, error = %e, "keeping product field untyped");
      self.extra.insert(key, value);
    }
  }
}

fn non_empty<T: Serialize>(items: &[T]) -> Option<Value> {
  if items.is_empty() {
    return None;
  }
  serde_json::to_value(items).ok()
}

fn parse_field<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ProductError> {
  serde_json::from_value(value).map_err(|source| ProductError::InvalidValue {
    key: key.to_string(),
    source,
  })
}

fn coerce_i64(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn parse_number(key: &str, value: Value) -> Result<Option<i64>, ProductError> {
  match value {
    Value::Null => Ok(None),
    other => match coerce_i64(&other) {
      Some(n) => Ok(Some(n)),
      None => Err(ProductError::NotANumber {
        key: key.to_string(),
        value: other,
      }),
    },
  }
}

fn parse_text(key: &str, value: Value) -> Result<Option<String>, ProductError> {
  match value {
    Value::Null => Ok(None),
    Value::String(s) => Ok(Some(s)),
    Value::Number(n) => Ok(Some(n.to_string())),
    other => Err(ProductError::NotText {
      key: key.to_string(),
      value: other,
    }),
  }
}

/// Older API versions list categories by name only.
fn named_entries(value: Value) -> Value {
  match value {
    Value::Array(items) => Value::Array(
      items
        .into_iter()
        .map(|item| match item {
          Value::String(name) => json!({ "name": name }),
          other => other,
        })
        .collect(),
    ),
    other => other,
  }
}
