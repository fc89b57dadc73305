//! # Aggregate Locks
//!
//! Serializes engine calls that touch the same product, purchase order,
//! branch or invoice.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale A: [product:p1, product:p7]          sale B: [product:p7]        │
//! │                                                                         │
//! │  keys are sorted and deduplicated, then locked one by one in order:    │
//! │  no two calls can each hold a key the other waits for                  │
//! │                                                                         │
//! │  A holds p1, p7 ──────────► commit ──► drop guard                      │
//! │  B waits on p7 ───────────────────────────────────► reads A's writes   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The locks cover one engine process. Rows changed by another process are
//! caught by the version check on write.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Lock key of the invoice sequence row.
pub const INVOICE_SEQUENCE: &str = "invoice-sequence";

/// Lock key of the branch list.
pub const BRANCH_LIST: &str = "catalog:branches";

/// Lock key of the category list.
pub const CATEGORY_LIST: &str = "catalog:categories";

/// Lock key of the master template list.
pub const MASTER_PRODUCTS: &str = "catalog:master-products";

/// Lock key for generating PO numbers.
pub const PO_NUMBERS: &str = "po-numbers";

pub fn product_key(id: &str) -> String {
    format!("product:{}", id)
}

pub fn purchase_order_key(id: &str) -> String {
    format!("po:{}", id)
}

/// Held while products are created in (or bulk-read from) a branch.
pub fn branch_key(name: &str) -> String {
    format!("branch:{}", name.to_lowercase())
}

pub fn invoice_key(number: &str) -> String {
    format!("invoice:{}", number.trim())
}

// =============================================================================
// Registry
// =============================================================================

/// Named async mutexes, created on first use.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Guards for every key of one call; dropping it releases them all.
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every key, in sorted order.
    pub async fn acquire<I, S>(&self, keys: I) -> LockSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut map = self.locks.lock().await;
            // Entries nobody holds or waits on
            map.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter()
                .map(|k| map.entry(k.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        trace!(keys = ?keys, "Aggregate locks acquired");

        LockSet {
            keys,
            _guards: guards,
        }
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
