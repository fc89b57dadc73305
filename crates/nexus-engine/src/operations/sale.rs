//! # Sale Operations
//!
//! ## Two Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  record_sale(request, "SI-7001")      checkout(request)                 │
//! │  ───────────────────────────────      ─────────────────                 │
//! │  caller names the invoice             invoice = sequence value          │
//! │                                                (or configured seed)     │
//! │         │                                    │                          │
//! │         └────────────────┬───────────────────┘                          │
//! │                          ▼                                              │
//! │        invoice already has OUT lines? ── yes ──► Duplicate              │
//! │                          │                                              │
//! │                          ▼                                              │
//! │        apply_sale: Σ qty per product vs batches, margin gate,           │
//! │                    FIFO depletion, one OUT line per sale line           │
//! │                          │                                              │
//! │                          ▼                                              │
//! │        save products, append lines  (+ advance sequence on checkout)    │
//! │        one commit                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use tracing::{info, warn};

use nexus_core::invoice::advance;
use nexus_core::sale::{apply_sale, SaleReceipt, SaleRequest};
use nexus_core::validation::validate_invoice_number;
use nexus_core::StockSet;
use nexus_db::UnitOfWork;

use super::rejected;
use crate::error::{EngineError, EngineResult};
use crate::locks::{invoice_key, product_key, INVOICE_SEQUENCE};
use crate::Engine;

/// Distinct product ids named by the request's lines.
pub(crate) fn line_product_ids(request: &SaleRequest) -> Vec<String> {
    request
        .lines
        .iter()
        .map(|l| l.product_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub(crate) fn log_overrides(receipt: &SaleReceipt) {
    for line in receipt.transactions.iter().filter(|t| t.notes.is_some()) {
        warn!(
            invoice = %receipt.invoice_number,
            product_id = %line.product_id,
            price = ?line.price_cents,
            unit_cost = line.unit_cost_cents,
            note = ?line.notes,
            "Below-margin price accepted by override"
        );
    }
}

impl Engine {
    /// Records a sale under `invoice_number`, all lines or none.
    pub async fn record_sale(
        &self,
        request: &SaleRequest,
        invoice_number: &str,
    ) -> EngineResult<SaleReceipt> {
        let invoice = invoice_number.trim();
        validate_invoice_number(invoice)?;

        let ids = line_product_ids(request);
        let mut keys: Vec<String> = ids.iter().map(|id| product_key(id)).collect();
        keys.push(invoice_key(invoice));
        let _locks = self.locks().acquire(keys).await;

        let mut uow = self.database().begin().await?;
        let receipt = self.sell(&mut uow, request, &ids, invoice).await?;
        uow.commit().await?;

        log_overrides(&receipt);
        info!(
            invoice = %receipt.invoice_number,
            lines = receipt.transactions.len(),
            subtotal = receipt.subtotal_cents,
            user = %request.actor.name,
            "Sale recorded"
        );
        Ok(receipt)
    }

    /// POS checkout: sells under the next invoice number and advances the
    /// sequence in the same commit.
    pub async fn checkout(&self, request: &SaleRequest) -> EngineResult<SaleReceipt> {
        let ids = line_product_ids(request);
        let mut keys: Vec<String> = ids.iter().map(|id| product_key(id)).collect();
        keys.push(INVOICE_SEQUENCE.to_string());
        let _locks = self.locks().acquire(keys).await;

        let mut uow = self.database().begin().await?;
        let sequence = uow.invoice_sequence().await?;
        let invoice = sequence
            .as_ref()
            .map(|s| s.next_value.clone())
            .unwrap_or_else(|| self.config().invoice.seed.clone());

        let receipt = self.sell(&mut uow, request, &ids, &invoice).await?;
        let next = advance(&invoice);
        uow.store_invoice_sequence(&next, sequence.map(|s| s.version))
            .await?;
        uow.commit().await?;

        log_overrides(&receipt);
        info!(
            invoice = %receipt.invoice_number,
            next_invoice = %next,
            lines = receipt.transactions.len(),
            subtotal = receipt.subtotal_cents,
            user = %request.actor.name,
            "Checkout complete"
        );
        Ok(receipt)
    }

    /// The shared body: duplicate check, pure sale, write-back.
    async fn sell(
        &self,
        uow: &mut UnitOfWork,
        request: &SaleRequest,
        ids: &[String],
        invoice: &str,
    ) -> EngineResult<SaleReceipt> {
        if uow.invoice_has_sales(invoice).await? {
            warn!(invoice = %invoice, "Invoice number already used");
            return Err(EngineError::duplicate("invoice", invoice));
        }

        let mut stock = StockSet::new(uow.load_products_by_id(ids).await?);
        let receipt = apply_sale(&mut stock, request, invoice, self.margin_policy(), self.now())
            .map_err(rejected("sale"))?;

        uow.save_stock(&stock.into_changes()).await?;
        uow.append_transactions(&receipt.transactions).await?;
        Ok(receipt)
    }
}
