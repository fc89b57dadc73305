//! # Seed Data Generator
//!
//! Populates a development database with the default branches and
//! categories, a few master templates, and stocked products.
//!
//! ## Usage
//! ```bash
//! cargo run -p nexus-db --bin seed
//!
//! # Specify database path
//! cargo run -p nexus-db --bin seed -- --db ./data/nexus.db
//! ```
//!
//! Every stocked product gets one opening batch and an IN ledger line,
//! exactly as `create_product` writes them.

use chrono::Utc;
use std::env;

use nexus_core::catalog::{create_product, build_master_product, CatalogRefs, MasterProductInput, ProductDraft};
use nexus_core::{Actor, StockSet, DEFAULT_BRANCHES, DEFAULT_CATEGORIES};
use nexus_db::{Database, DbConfig, NameList};

/// (name, sku, category, branch, price, cost, min level, qty, supplier)
const PRODUCTS: &[(&str, &str, &str, &str, i64, i64, i64, i64, &str)] = &[
    ("(SMI) ADVANCE BARREL BOLT 1 1/2", "2000042952600", "Hardware", "Oslob", 6_500, 3_250, 10, 120, "Advance"),
    ("(SMI) ALPHA CHROMA ACRYLIC LATEX CON. PRIMER WHITE 16L", "440516001594", "Paints & Coatings", "Toledo", 345_000, 215_000, 5, 15, "Alpha Chroma"),
    ("(SMI) ANGLE GRINDER 4\" 540W", "6921313712345", "Tools", "Oslob", 285_000, 175_000, 3, 8, "Bosch"),
    ("(SMI) PVC PIPE 1/2\" x 10FT", "4800047810012", "Plumbing", "Dalaguete", 12_000, 7_500, 20, 60, "Neltex"),
    ("(SMI) THHN WIRE #12 STRANDED (PER METER)", "4800062300121", "Electrical Supplies", "Danao", 3_800, 2_400, 50, 300, "Phelps Dodge"),
];

/// (name, sku, category, cost, min level, supplier)
const TEMPLATES: &[(&str, &str, &str, i64, i64, &str)] = &[
    ("(SMI) ADVANCE BARREL BOLT 2\"", "2000042952617", "Hardware", 3_900, 10, "Advance"),
    ("(SMI) BOYSEN QUICK DRYING ENAMEL WHITE 1L", "4800011110215", "Paints & Coatings", 28_500, 6, "Boysen"),
    ("(SMI) SAFETY GOGGLES CLEAR", "6900000123456", "Safety Gear", 6_500, 5, "3M"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./nexus_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Nexus Inventory Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./nexus_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Nexus Inventory Seed Data Generator");
    println!("======================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let actor = Actor::admin("seed");
    let mut uow = db.begin().await?;

    // Branches and categories
    for branch in DEFAULT_BRANCHES {
        uow.add_name(NameList::Branches, branch, now).await?;
    }
    for category in DEFAULT_CATEGORIES {
        uow.add_name(NameList::Categories, category, now).await?;
    }
    println!("✓ {} branches, {} categories", DEFAULT_BRANCHES.len(), DEFAULT_CATEGORIES.len());

    // Master templates
    let mut templates = Vec::new();
    for (name, sku, category, cost, min_level, supplier) in TEMPLATES {
        let template = build_master_product(
            &MasterProductInput {
                id: None,
                name: name.to_string(),
                sku: sku.to_string(),
                category: category.to_string(),
                min_level: *min_level,
                cost_cents: *cost,
                supplier: supplier.to_string(),
                description: String::new(),
            },
            &templates,
            now,
        )?;
        uow.save_master_product(&template).await?;
        templates.push(template);
    }
    println!("✓ {} master templates", templates.len());

    // Stocked products
    let branches: Vec<String> = DEFAULT_BRANCHES.iter().map(|b| b.to_string()).collect();
    let categories: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
    let refs = CatalogRefs {
        branches: &branches,
        categories: &categories,
    };

    let mut stock = StockSet::default();
    let mut lines = Vec::new();
    for (name, sku, category, branch, price, cost, min_level, qty, supplier) in PRODUCTS {
        let draft = ProductDraft {
            name: name.to_string(),
            sku: sku.to_string(),
            category: category.to_string(),
            branch: branch.to_string(),
            price_cents: *price,
            cost_cents: *cost,
            min_level: *min_level,
            supplier: supplier.to_string(),
            description: String::new(),
            initial_quantity: *qty,
            initial_damage: 0,
        };
        let created = create_product(&mut stock, &draft, refs, &actor, now)?;
        lines.extend(created.transaction);
    }

    let changes = stock.into_changes();
    uow.save_stock(&changes).await?;
    uow.append_transactions(&lines).await?;
    uow.commit().await?;

    println!("✓ {} products, {} ledger lines", changes.created.len(), lines.len());
    println!();
    println!("Done.");

    Ok(())
}
