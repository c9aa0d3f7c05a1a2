use crate::config::Config;
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// REST API root, relative to the shop url
const API_PATH: &str = "wp-json/wc/v3/";

/// Products per page when listing; the API caps this at 100
const PAGE_SIZE: usize = 100;

/// Page count reported by the API alongside each listing page
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// Listing pages fetched before giving up on a listing that never ends
const MAX_PAGES: u32 = 1000;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed")]
  Http(#[from] reqwest::Error),
  #[error("{status} from {url}: {body}")]
  Status {
    status: StatusCode,
    url: String,
    body: String,
  },
  #[error("invalid response")]
  Parse(#[from] serde_json::Error),
  #[error("invalid endpoint")]
  Url(#[from] url::ParseError),
  #[error("product listing did not end after {0} pages")]
  Unbounded(u32),
}

/// The two remote operations the catalog cache depends on.
///
/// Both return the raw JSON body; interpreting it is the caller's job.
#[async_trait]
pub trait CatalogApi: Send + Sync {
  /// Fetch every product as a single JSON array.
  async fn fetch_all_products(&self) -> Result<String, ClientError>;

  /// Set a product's absolute stock level and return the updated product.
  async fn update_stock(&self, id: u64, stock: i64) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: CatalogApi + ?Sized> CatalogApi for Arc<T> {
  async fn fetch_all_products(&self) -> Result<String, ClientError> {
    (**self).fetch_all_products().await
  }

  async fn update_stock(&self, id: u64, stock: i64) -> Result<String, ClientError> {
    (**self).update_stock(id, stock).await
  }
}

/// WooCommerce REST API client
#[derive(Clone)]
pub struct WooClient {
  http: reqwest::Client,
  base: Url,
  consumer_key: String,
  consumer_secret: String,
}

impl WooClient {
  pub fn new(config: &Config) -> Result<Self> {
    let secret = Config::get_consumer_secret()?;

    Self::with_credentials(
      &config.shop.url,
      &config.shop.consumer_key,
      &secret,
      Duration::from_secs(config.shop.timeout_secs),
    )
  }

  pub fn with_credentials(
    shop_url: &str,
    consumer_key: &str,
    consumer_secret: &str,
    timeout: Duration,
  ) -> Result<Self> {
    let mut shop =
      Url::parse(shop_url).map_err(|e| eyre!("Invalid shop url {}: {}", shop_url, e))?;
    if !shop.path().ends_with('/') {
      let path = format!("{}/", shop.path());
      shop.set_path(&path);
    }
    let base = shop
      .join(API_PATH)
      .map_err(|e| eyre!("Invalid shop url {}: {}", shop_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .gzip(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      consumer_key: consumer_key.to_string(),
      consumer_secret: consumer_secret.to_string(),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
    Ok(self.base.join(path)?)
  }

  /// Send an authenticated request and return the headers and body of a
  /// successful response
  async fn send(
    &self,
    request: reqwest::RequestBuilder,
  ) -> Result<(HeaderMap, String), ClientError> {
    let response = request
      .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
      .send()
      .await?;

    let status = response.status();
    let url = response.url().to_string();
    let headers = response.headers().clone();
    let body = response.text().await?;

    if !status.is_success() {
      return Err(ClientError::Status { status, url, body });
    }
    Ok((headers, body))
  }
}

/// Page count from the `X-WP-TotalPages` header, when present and readable.
fn total_pages(headers: &HeaderMap) -> Option<u32> {
  headers
    .get(TOTAL_PAGES_HEADER)?
    .to_str()
    .ok()?
    .trim()
    .parse()
    .ok()
}

/// A listing ends at the reported page count, or at a short page when the
/// server reports none.
fn is_last_page(page: u32, total_pages: Option<u32>, count: usize) -> bool {
  match total_pages {
    Some(total) => page >= total || count == 0,
    None => count < PAGE_SIZE,
  }
}

#[async_trait]
impl CatalogApi for WooClient {
  async fn fetch_all_products(&self) -> Result<String, ClientError> {
    let mut all_products: Vec<Value> = Vec::new();
    let mut page = 1u32;

    loop {
      let mut url = self.endpoint("products")?;
      url
        .query_pairs_mut()
        .append_pair("per_page", &PAGE_SIZE.to_string())
        .append_pair("page", &page.to_string());

      debug!(%url, "fetching product page");
      let (headers, body) = self.send(self.http.get(url)).await?;
      let products: Vec<Value> = serde_json::from_str(&body)?;

      let count = products.len();
      all_products.extend(products);

      if is_last_page(page, total_pages(&headers), count) {
        break;
      }
      if page >= MAX_PAGES {
        warn!(page, fetched = all_products.len(), "product listing does not end");
        return Err(ClientError::Unbounded(page));
      }
      page += 1;
    }

    debug!(count = all_products.len(), "fetched product list");
    Ok(serde_json::to_string(&all_products)?)
  }

  async fn update_stock(&self, id: u64, stock: i64) -> Result<String, ClientError> {
    let url = self.endpoint(&format!("products/{}", id))?;
    let body = json!({
      "manage_stock": true,
      "stock_quantity": stock,
    });

    debug!(%url, stock, "updating product stock");
    let (_, body) = self.send(self.http.put(url).json(&body)).await?;
    Ok(body)
  }
}
