//! Command line actions over the catalog cache.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::fmt::Write;

use crate::cache::{
  CatalogCache, ItemStore, LoadReport, LoadSource, ProductListItem, StockUpdate,
};
use crate::forms::{FormLayout, FormMetadata};
use crate::woo::client::CatalogApi;
use crate::woo::product::{Product, UNSET_STOCK};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List every cached product
  #[command(alias = "ls")]
  List,
  /// Show one product
  Show { id: u64 },
  /// Find a product by SKU (e.g. a scanned barcode)
  Find { sku: String },
  /// Change a product's stock by a signed amount
  Stock {
    id: u64,
    /// Amount to add; negative values remove stock
    #[arg(allow_hyphen_values = true)]
    delta: i64,
  },
  /// Drop the local snapshot and fetch the catalog again
  Sync,
}

/// Run one command against the catalog, printing its output.
pub async fn run<S, C>(
  command: Command,
  catalog: &mut CatalogCache<S, C>,
  forms: &FormMetadata,
) -> Result<()>
where
  S: ItemStore,
  C: CatalogApi,
{
  if !matches!(command, Command::Sync) {
    catalog.load().await?;
  }

  match command {
    Command::List if catalog.is_empty() => println!("No products in the catalog"),
    Command::List => {
      print!("{}", format_list(&catalog.list_view()));
      println!("{} products", catalog.len());
    }
    Command::Show { id } => {
      let product = catalog
        .get(id)
        .ok_or_else(|| eyre!("Product {} not found", id))?;
      print!("{}", format_form(&forms.product, product));
    }
    Command::Find { sku } => {
      let product = catalog
        .find_by_sku(&sku)
        .ok_or_else(|| eyre!("No product with SKU {}", sku))?;
      print!("{}", format_form(&forms.product, product));
    }
    Command::Stock { id, delta } => {
      let update = catalog.apply_stock_delta(id, delta).await?;
      println!("{}", describe_update(id, &update));
      if let Some(product) = catalog.get(id) {
        print!("{}", format_form(&forms.stock_in, product));
      }
    }
    Command::Sync => {
      let report = catalog.resync().await?;
      println!("{}", describe_load(&report));
    }
  }

  Ok(())
}

fn describe_load(report: &LoadReport) -> String {
  let source = match report.source {
    LoadSource::Disk => "local snapshot",
    LoadSource::Remote => "shop",
  };
  format!(
    "{} products loaded from {} at {}",
    report.count,
    source,
    report.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
  )
}

fn describe_update(id: u64, update: &StockUpdate) -> String {
  match update {
    StockUpdate::Applied { previous, current } => format!(
      "Stock for product {}: {} -> {}",
      id,
      format_stock(*previous),
      format_stock(*current)
    ),
    StockUpdate::Unchanged { stock } => {
      format!("Stock for product {} unchanged at {}", id, format_stock(*stock))
    }
    StockUpdate::Unconfirmed => format!(
      "Unable to confirm update for product {}; showing last confirmed stock",
      id
    ),
  }
}

fn format_stock(stock: i64) -> String {
  if stock == UNSET_STOCK {
    "-".to_string()
  } else {
    stock.to_string()
  }
}

fn format_list(items: &[ProductListItem]) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:>4}  {:>8}  {:<16}  {:>6}  {:>9}  NAME",
    "#", "ID", "SKU", "STOCK", "PRICE"
  );
  for item in items {
    let price = item
      .price
      .map(|p| format!("{:.2}", p))
      .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
      out,
      "{:>4}  {:>8}  {:<16}  {:>6}  {:>9}  {}",
      item.index,
      item.id,
      item.sku.as_deref().unwrap_or("-"),
      format_stock(item.stock),
      price,
      item.name.as_deref().unwrap_or("")
    );
  }
  out
}

fn format_form(layout: &FormLayout, product: &Product) -> String {
  let rows = layout.render(product);
  let width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);

  let mut out = String::new();
  let _ = writeln!(out, "{} #{}", layout.title, product.id);
  for row in rows {
    let marker = if row.editable { "*" } else { " " };
    let _ = writeln!(
      out,
      "{}{:<width$}  {}",
      marker,
      row.label,
      row.value.as_deref().unwrap_or("-"),
      width = width
    );
  }
  out
}
