//! # Nexus Engine Status
//!
//! Opens the configured inventory database and prints what it holds.
//!
//! ## Usage
//! ```bash
//! cargo run -p nexus-engine
//!
//! # Explicit config file
//! cargo run -p nexus-engine -- --config ./nexus.toml
//!
//! # Override the database through the environment
//! NEXUS_DB_PATH=./data/nexus.db cargo run -p nexus-engine
//! ```

use std::env;
use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use nexus_engine::{init_tracing, Engine, EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = EngineConfig::load(config_path)?;
    let engine = Engine::open(config).await?;

    let branches = engine.branches().await?;
    let summary = engine.inventory_summary(None).await?;
    let low_stock = engine.low_stock(None).await?;
    let next_invoice = engine.next_invoice_number().await?;
    info!(
        branches = branches.len(),
        products = summary.product_count,
        low_stock = low_stock.len(),
        "Inventory loaded"
    );

    let status = json!({
        "branches": branches,
        "categories": engine.categories().await?,
        "next_invoice_number": next_invoice,
        "summary": summary,
        "low_stock": low_stock
            .iter()
            .map(|p| json!({ "sku": p.sku, "name": p.name, "branch": p.branch, "quantity": p.quantity }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);

    engine.close().await;
    Ok(())
}
