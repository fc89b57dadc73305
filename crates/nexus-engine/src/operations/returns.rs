//! # Return & Exchange Operations
//!
//! ```text
//! process_return(request)
//!      │
//!      ├── RETURN line (total = refund), always
//!      │
//!      ├── restock == false ──► write-off, stock untouched
//!      ├── restock, reason mentions "damaged" ──► batch in the damage bin
//!      ├── restock, any other reason ──► batch back on the product
//!      │
//!      └── replacement? ──► sale under new_invoice_number against the
//!                           post-return stock; same commit
//! ```

use tracing::{info, warn};

use nexus_core::returns::{process_return, ReturnOutcome, ReturnRequest};
use nexus_core::StockSet;

use super::rejected;
use super::sale::log_overrides;
use crate::error::{EngineError, EngineResult};
use crate::locks::{branch_key, invoice_key, product_key};
use crate::Engine;

impl Engine {
    /// Processes a return and its optional replacement sale atomically.
    pub async fn process_return(&self, request: &ReturnRequest) -> EngineResult<ReturnOutcome> {
        let products = self.database().products();
        let returned = products
            .get_by_id(&request.product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("product", &request.product_id))?;

        let mut keys = vec![product_key(&returned.id), branch_key(&returned.branch)];
        if let Some(bin_id) = products.damage_bin_id(&returned.id).await? {
            keys.push(product_key(&bin_id));
        }
        let mut replacement_ids = Vec::new();
        if let Some(replacement) = &request.replacement {
            keys.push(invoice_key(&replacement.new_invoice_number));
            for line in &replacement.lines {
                keys.push(product_key(&line.product_id));
                replacement_ids.push(line.product_id.clone());
            }
        }
        let _locks = self.locks().acquire(keys).await;

        let mut uow = self.database().begin().await?;
        let product = uow.require_product(&request.product_id).await?;
        let bins = uow.load_damage_candidates(&product).await?;
        let others = uow.load_products_by_id(&replacement_ids).await?;
        let mut stock = StockSet::new(std::iter::once(product).chain(bins).chain(others));

        if let Some(replacement) = &request.replacement {
            let new_invoice = replacement.new_invoice_number.trim();
            let same_invoice = new_invoice == request.invoice_number.trim();
            if !same_invoice && uow.invoice_has_sales(new_invoice).await? {
                warn!(invoice = %new_invoice, "Replacement invoice number already used");
                return Err(EngineError::duplicate("invoice", new_invoice));
            }
        }

        let outcome = process_return(&mut stock, request, self.margin_policy(), self.now())
            .map_err(rejected("return"))?;

        let mut lines = vec![outcome.return_transaction.clone()];
        if let Some(receipt) = &outcome.replacement {
            lines.extend(receipt.transactions.iter().cloned());
        }
        uow.save_stock(&stock.into_changes()).await?;
        uow.append_transactions(&lines).await?;
        uow.commit().await?;

        info!(
            product_id = %request.product_id,
            invoice = %request.invoice_number,
            quantity = request.quantity,
            refund = request.refund_cents,
            restock = request.restock,
            reason = %request.reason,
            user = %request.actor.name,
            "Return processed"
        );
        if let Some(receipt) = &outcome.replacement {
            log_overrides(receipt);
            info!(
                invoice = %receipt.invoice_number,
                subtotal = receipt.subtotal_cents,
                net_settlement = outcome.net_settlement_cents,
                "Replacement sale recorded"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{engine, staff, stocked};
    use nexus_core::returns::Replacement;
    use nexus_core::sale::{SaleLine, SaleRequest};
    use nexus_core::TransactionType;

    fn return_of(product_id: &str, quantity: i64, reason: &str, restock: bool) -> ReturnRequest {
        ReturnRequest {
            product_id: product_id.to_string(),
            quantity,
            invoice_number: "SI-1".to_string(),
            refund_cents: quantity * 2000,
            reason: reason.to_string(),
            restock,
            replacement: None,
            actor: staff(),
            payment_method: Some("Cash".to_string()),
            reference_no: None,
        }
    }

    async fn sold(engine: &Engine, quantity: i64) -> String {
        let id = stocked(engine, "X", "X-1", 10, 1000, 2000).await;
        let request = SaleRequest {
            lines: vec![SaleLine::new(id.clone(), quantity, 2000)],
            actor: staff(),
            payment_method: Some("Cash".to_string()),
            reference_no: None,
            date: None,
        };
        engine.record_sale(&request, "SI-1").await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_damaged_return_goes_to_damage_bin() {
        let engine = engine().await;
        let id = sold(&engine, 5).await;

        let outcome = engine
            .process_return(&return_of(&id, 5, "Damaged Item", true))
            .await
            .unwrap();
        assert_eq!(outcome.return_transaction.kind, TransactionType::Return);
        assert_eq!(outcome.return_transaction.total_cents, 10_000);

        assert_eq!(engine.product(&id).await.unwrap().quantity, 5);

        let bin_id = engine
            .database()
            .products()
            .damage_bin_id(&id)
            .await
            .unwrap()
            .unwrap();
        let bin = engine.product(&bin_id).await.unwrap();
        assert_eq!(bin.name, "(DAMAGE) X");
        assert_eq!(bin.sku, "X-1-DMG");
        assert_eq!(bin.quantity, 5);
        assert_eq!(bin.batches[0].unit_cost_cents, 1000);
        assert_eq!(bin.batches[0].original_quantity, 5);

        // A second damaged return reuses the bin
        engine
            .process_return(&return_of(&id, 1, "damaged in transit", true))
            .await
            .unwrap();
        assert_eq!(engine.product(&bin_id).await.unwrap().quantity, 6);
        assert_eq!(engine.products(Some("Oslob")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_restock_and_write_off() {
        let engine = engine().await;
        let id = sold(&engine, 5).await;

        engine
            .process_return(&return_of(&id, 2, "Wrong size", true))
            .await
            .unwrap();
        assert_eq!(engine.product(&id).await.unwrap().quantity, 7);

        engine
            .process_return(&return_of(&id, 1, "Expired", false))
            .await
            .unwrap();
        assert_eq!(engine.product(&id).await.unwrap().quantity, 7);
        assert_eq!(engine.invoice_lines("SI-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exchange_on_same_invoice() {
        let engine = engine().await;
        let id = sold(&engine, 2).await;
        let other = stocked(&engine, "Y", "Y-1", 3, 2000, 3000).await;

        let mut request = return_of(&id, 1, "Change Item", true);
        request.replacement = Some(Replacement {
            lines: vec![SaleLine::new(other.clone(), 1, 3000)],
            new_invoice_number: "SI-1".to_string(),
        });

        let outcome = engine.process_return(&request).await.unwrap();
        assert_eq!(outcome.net_settlement_cents, 1000);
        assert_eq!(engine.product(&other).await.unwrap().quantity, 2);

        let kinds: Vec<TransactionType> = engine
            .invoice_lines("SI-1")
            .await
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            [TransactionType::Out, TransactionType::Return, TransactionType::Out]
        );
    }

    #[tokio::test]
    async fn test_failed_replacement_rejects_whole_return() {
        let engine = engine().await;
        let id = sold(&engine, 2).await;
        let other = stocked(&engine, "Y", "Y-1", 1, 2000, 3000).await;

        let mut request = return_of(&id, 1, "Change Item", true);
        request.replacement = Some(Replacement {
            lines: vec![SaleLine::new(other.clone(), 2, 3000)],
            new_invoice_number: "SI-2".to_string(),
        });

        let err = engine.process_return(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(engine.product(&id).await.unwrap().quantity, 8);
        assert_eq!(engine.invoice_lines("SI-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replacement_invoice_must_be_unused() {
        let engine = engine().await;
        let id = sold(&engine, 2).await;

        let mut request = return_of(&id, 1, "Change Item", true);
        request.replacement = Some(Replacement {
            lines: vec![SaleLine::new(id.clone(), 1, 2000)],
            new_invoice_number: "SI-1".to_string(),
        });
        request.invoice_number = "SI-0".to_string();

        let err = engine.process_return(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);
    }

    #[tokio::test]
    async fn test_unknown_product_and_negative_refund() {
        let engine = engine().await;
        let id = sold(&engine, 2).await;

        let err = engine
            .process_return(&return_of("missing", 1, "Wrong size", true))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let mut request = return_of(&id, 1, "Wrong size", true);
        request.refund_cents = -1;
        let err = engine.process_return(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
