//! # Reporting Operations
//!
//! Dashboard reads over committed product rows. No locks are taken; a
//! report reflects whatever was committed when the rows were read.

use nexus_core::report::{self, InventorySummary};
use nexus_core::Product;

use crate::error::EngineResult;
use crate::Engine;

impl Engine {
    /// Stock totals for one branch, or every branch when `branch` is `None`.
    pub async fn inventory_summary(&self, branch: Option<&str>) -> EngineResult<InventorySummary> {
        let products = self.database().products().list(branch).await?;
        Ok(report::summarize(&products))
    }

    /// Products at or below their reorder threshold, lowest stock first.
    pub async fn low_stock(&self, branch: Option<&str>) -> EngineResult<Vec<Product>> {
        let products = self.database().products().list(branch).await?;
        Ok(report::low_stock(&products))
    }
}
