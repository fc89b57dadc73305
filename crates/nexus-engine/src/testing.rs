//! Fixtures shared by the operation tests.

use nexus_core::catalog::ProductDraft;
use nexus_core::Actor;
use nexus_db::{Database, DbConfig};

use crate::{Engine, EngineConfig};

/// An engine over a fresh in-memory database with two branches and two
/// categories.
pub(crate) async fn engine() -> Engine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let engine = Engine::with_database(db, EngineConfig::default());
    engine.add_branch("Oslob").await.unwrap();
    engine.add_branch("Toledo").await.unwrap();
    engine.add_category("Hardware").await.unwrap();
    engine.add_category("Tools").await.unwrap();
    engine
}

pub(crate) fn admin() -> Actor {
    Actor::admin("Maria")
}

pub(crate) fn staff() -> Actor {
    Actor::staff("Jun")
}

/// A Hardware product at Oslob.
pub(crate) fn draft(name: &str, sku: &str, quantity: i64, cost: i64, price: i64) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        sku: sku.to_string(),
        category: "Hardware".to_string(),
        branch: "Oslob".to_string(),
        price_cents: price,
        cost_cents: cost,
        min_level: 0,
        supplier: "Advance".to_string(),
        description: String::new(),
        initial_quantity: quantity,
        initial_damage: 0,
    }
}

/// Creates a stocked product and returns its id.
pub(crate) async fn stocked(
    engine: &Engine,
    name: &str,
    sku: &str,
    quantity: i64,
    cost: i64,
    price: i64,
) -> String {
    engine
        .create_product(&draft(name, sku, quantity, cost, price), &staff())
        .await
        .unwrap()
        .product_id
}
