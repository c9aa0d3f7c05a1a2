//! Form layouts describing which product fields a screen shows.
//!
//! Two layouts are bundled with the binary and can be replaced by files named
//! in the config. They are loaded once at startup and passed to whatever
//! renders products.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::config::FormsConfig;
use crate::woo::product::Product;

const PRODUCT_FORM: &str = include_str!("../assets/product-form.json");
const STOCK_IN_FORM: &str = include_str!("../assets/product-stock-in-form.json");

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormField {
  /// Product key the field reads from
  pub key: String,
  pub label: String,
  #[serde(default)]
  pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormLayout {
  pub title: String,
  #[serde(default)]
  pub fields: Vec<FormField>,
}

/// One rendered line of a form
#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
  pub label: String,
  pub value: Option<String>,
  pub editable: bool,
}

/// Every layout the application uses
#[derive(Debug, Clone)]
pub struct FormMetadata {
  pub product: FormLayout,
  pub stock_in: FormLayout,
}

impl FormMetadata {
  /// Load the layouts, preferring configured files over the bundled ones.
  pub fn load(config: &FormsConfig) -> Result<Self> {
    Ok(Self {
      product: FormLayout::load(config.product.as_deref(), PRODUCT_FORM)?,
      stock_in: FormLayout::load(config.stock_in.as_deref(), STOCK_IN_FORM)?,
    })
  }
}

impl FormLayout {
  fn load(path: Option<&Path>, bundled: &str) -> Result<Self> {
    let Some(path) = path else {
      return serde_json::from_str(bundled)
        .map_err(|e| eyre!("Failed to parse bundled form layout: {}", e));
    };

    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read form layout {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse form layout {}: {}", path.display(), e))
  }

  /// Read each field of the layout from a product.
  pub fn render(&self, product: &Product) -> Vec<FormRow> {
    self
      .fields
      .iter()
      .map(|field| {
        // Forms show the product picture, not the raw image list
        let value = if field.key == "images" {
          product.image_url().map(String::from)
        } else {
          product.get(&field.key).and_then(|v| display_value(&v))
        };

        FormRow {
          label: field.label.clone(),
          value,
          editable: field.editable,
        }
      })
      .collect()
  }
}

fn display_value(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) if s.is_empty() => None,
    Value::String(s) => Some(s.clone()),
    Value::Array(items) => {
      let parts: Vec<String> = items.iter().filter_map(display_value).collect();
      (!parts.is_empty()).then(|| parts.join(", "))
    }
    Value::Object(map) => {
      let name = map.get("name").and_then(Value::as_str);
      let options = map.get("options").and_then(Value::as_array);
      match (name, options) {
        (Some(name), Some(options)) => {
          let options: Vec<&str> = options.iter().filter_map(Value::as_str).collect();
          Some(format!("{}: {}", name, options.join("/")))
        }
        (Some(name), None) => Some(name.to_string()),
        _ => Some(value.to_string()),
      }
    }
    other => Some(other.to_string()),
  }
}
