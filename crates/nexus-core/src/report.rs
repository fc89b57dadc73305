//! # Inventory Reporting
//!
//! Dashboard figures computed from product rows.
//!
//! Stock value is the batch valuation (Σ layer qty × layer cost), not
//! `quantity × cost`, because layers carry different costs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Product;

/// Per-category slice of the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategorySummary {
    pub category: String,
    pub product_count: i64,
    pub quantity: i64,
    pub stock_value_cents: i64,
}

/// Dashboard totals for a set of products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    /// Σ quantity.
    pub total_items: i64,
    pub product_count: i64,
    /// Products with `quantity <= min_level`.
    pub low_stock_count: i64,
    pub stock_value_cents: i64,
    /// Σ price × quantity.
    pub potential_revenue_cents: i64,
    pub potential_profit_cents: i64,
    pub by_category: Vec<CategorySummary>,
}

impl InventorySummary {
    #[inline]
    pub fn stock_value(&self) -> Money {
        Money::from_cents(self.stock_value_cents)
    }
}

/// Totals over `products`.
pub fn summarize<'a>(products: impl IntoIterator<Item = &'a Product>) -> InventorySummary {
    let mut summary = InventorySummary::default();
    let mut categories: BTreeMap<String, CategorySummary> = BTreeMap::new();

    for product in products {
        let value = product.valuation().cents();

        summary.total_items += product.quantity;
        summary.product_count += 1;
        if product.is_low_stock() {
            summary.low_stock_count += 1;
        }
        summary.stock_value_cents += value;
        summary.potential_revenue_cents += product.price().multiply_quantity(product.quantity).cents();

        let slice = categories
            .entry(product.category.clone())
            .or_insert_with(|| CategorySummary {
                category: product.category.clone(),
                ..CategorySummary::default()
            });
        slice.product_count += 1;
        slice.quantity += product.quantity;
        slice.stock_value_cents += value;
    }

    summary.potential_profit_cents = summary.potential_revenue_cents - summary.stock_value_cents;
    summary.by_category = categories.into_values().collect();
    summary
}

/// Products at or below their reorder threshold, lowest stock first.
pub fn low_stock<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .into_iter()
        .filter(|p| p.is_low_stock())
        .cloned()
        .collect();
    low.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{day, test_product};

    fn products() -> Vec<Product> {
        let mut bolt = test_product("p1", "BOLT-1", "Oslob");
        bolt.price_cents = 6500;
        bolt.min_level = 10;
        bolt.append_batch(100, Money::from_cents(3000), day(1));
        bolt.append_batch(20, Money::from_cents(3500), day(2));

        let mut grinder = test_product("p2", "GRIND-540", "Oslob");
        grinder.category = "Tools".to_string();
        grinder.price_cents = 285_000;
        grinder.min_level = 5;
        grinder.append_batch(4, Money::from_cents(175_000), day(1));

        vec![bolt, grinder]
    }

    #[test]
    fn test_summary_uses_batch_valuation() {
        let products = products();
        let summary = summarize(&products);

        assert_eq!(summary.total_items, 124);
        assert_eq!(summary.product_count, 2);
        assert_eq!(summary.low_stock_count, 1);
        // 100 × 30.00 + 20 × 35.00 + 4 × 1750.00
        assert_eq!(summary.stock_value_cents, 300_000 + 70_000 + 700_000);
        assert_eq!(summary.potential_revenue_cents, 120 * 6500 + 4 * 285_000);
        assert_eq!(
            summary.potential_profit_cents,
            summary.potential_revenue_cents - summary.stock_value_cents
        );
        assert_eq!(summary.by_category.len(), 2);
        assert_eq!(summary.by_category[0].category, "Hardware");
    }

    #[test]
    fn test_low_stock_lists_products_at_threshold() {
        let mut products = products();
        products[0].quantity = 10;
        products[0].min_level = 10;

        let low = low_stock(&products);
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].id, "p2");
    }
}
