//! # Purchasing Operations
//!
//! Purchase order creation and receiving.
//!
//! ## Receiving Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    receive_purchase_order(po_id, request)               │
//! │                                                                         │
//! │  Lock ──── po:<id>, branch:<po branch>, product:<item ids + bins>      │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  Load ──── PO, every product of the PO's branch, master templates      │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  receive_purchase_order (pure)                                         │
//! │    • OverQuantity if received + damaged would pass ordered             │
//! │    • template items become products (qty 0) on first receipt           │
//! │    • good units: batch at PO unit cost + IN line (invoice = ref)       │
//! │    • damaged units: batch in the damage bin, no ledger line            │
//! │    • status: Pending Receipt → Partially Received → Closed             │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  Write ─── products, IN lines, PO (version CAS), receiving record      │
//! │  Commit                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use nexus_core::invoice::{po_number, po_number_prefix};
use nexus_core::purchase_order::{
    create_purchase_order, receive_purchase_order, PurchaseOrderDraft, ReceiveOutcome,
    ReceiveRequest,
};
use nexus_core::{PurchaseOrder, StockSet};
use nexus_db::{NameList, UnitOfWork};

use super::rejected;
use crate::error::{EngineError, EngineResult};
use crate::locks::{branch_key, product_key, purchase_order_key, PO_NUMBERS};
use crate::Engine;

/// First free `PO-YYYYMMDD-NNNN` number for `now`'s day.
async fn next_po_number(uow: &mut UnitOfWork, now: DateTime<Utc>) -> EngineResult<String> {
    let prefix = po_number_prefix(now);
    let mut sequence = uow.count_po_numbers_with_prefix(&prefix).await? + 1;
    loop {
        let seq = u32::try_from(sequence)
            .map_err(|_| EngineError::internal("PO number sequence exhausted"))?;
        let candidate = po_number(now, seq);
        if !uow.po_number_exists(&candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

impl Engine {
    /// Purchase orders of one branch (or all), newest first.
    pub async fn purchase_orders(&self, branch: Option<&str>) -> EngineResult<Vec<PurchaseOrder>> {
        Ok(self.database().purchase_orders().list(branch).await?)
    }

    pub async fn purchase_order(&self, id: &str) -> EngineResult<PurchaseOrder> {
        self.database()
            .purchase_orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("purchase order", id))
    }

    /// Creates a `Pending Receipt` order, numbering it when the draft has no
    /// PO number.
    pub async fn create_purchase_order(
        &self,
        draft: &PurchaseOrderDraft,
    ) -> EngineResult<PurchaseOrder> {
        let _locks = self
            .locks()
            .acquire([branch_key(&draft.branch), PO_NUMBERS.to_string()])
            .await;
        let mut uow = self.database().begin().await?;

        let branches = uow.names(NameList::Branches).await?;
        if !branches.iter().any(|b| b == &draft.branch) {
            return Err(EngineError::not_found("branch", &draft.branch));
        }

        let now = self.now();
        let number = match draft.po_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => {
                if uow.po_number_exists(number).await? {
                    return Err(EngineError::duplicate("po_number", number));
                }
                number.to_string()
            }
            _ => next_po_number(&mut uow, now).await?,
        };

        let stock = StockSet::new(uow.load_products(Some(&draft.branch)).await?);
        let templates = uow.master_products().await?;
        let mut po = create_purchase_order(draft, number, &stock, &templates, now)
            .map_err(rejected("create purchase order"))?;

        uow.insert_purchase_order(&po).await?;
        uow.commit().await?;
        po.version = 1;

        info!(
            po_id = %po.id,
            po_number = %po.po_number,
            branch = %po.branch,
            items = po.items.len(),
            ordered_value = po.ordered_value().cents(),
            user = %draft.actor.name,
            "Purchase order created"
        );
        Ok(po)
    }

    /// Applies one receiving call, all lines or none.
    pub async fn receive_purchase_order(
        &self,
        po_id: &str,
        request: &ReceiveRequest,
    ) -> EngineResult<ReceiveOutcome> {
        let current = self.purchase_order(po_id).await?;

        let products = self.database().products();
        let mut keys = vec![purchase_order_key(po_id), branch_key(&current.branch)];
        for product_id in current.items.iter().filter_map(|i| i.product_id.as_deref()) {
            keys.push(product_key(product_id));
            if let Some(bin_id) = products.damage_bin_id(product_id).await? {
                keys.push(product_key(&bin_id));
            }
        }
        let _locks = self.locks().acquire(keys).await;

        let mut uow = self.database().begin().await?;
        let mut po = uow
            .load_purchase_order(po_id)
            .await?
            .ok_or_else(|| EngineError::not_found("purchase order", po_id))?;
        let mut stock = StockSet::new(uow.load_products(Some(&po.branch)).await?);
        let templates = uow.master_products().await?;

        let outcome = receive_purchase_order(&mut po, &mut stock, &templates, request, self.now())
            .map_err(rejected("receive purchase order"))?;

        if outcome.record.is_none() {
            debug!(po_id = %po_id, "Receiving call carried no quantities");
            return Ok(outcome);
        }

        uow.save_stock(&stock.into_changes()).await?;
        uow.append_transactions(&outcome.transactions).await?;
        uow.update_purchase_order(&po).await?;
        uow.commit().await?;

        info!(
            po_id = %po.id,
            po_number = %po.po_number,
            status = ?po.status,
            good = request.good.iter().map(|l| l.quantity).sum::<i64>(),
            damaged = request.damaged.iter().map(|l| l.quantity).sum::<i64>(),
            ledger_lines = outcome.transactions.len(),
            user = %request.actor.name,
            "Purchase order received"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{engine, staff, stocked};
    use nexus_core::catalog::MasterProductInput;
    use nexus_core::purchase_order::{PoItemDraft, ReceiveLine};
    use nexus_core::{ItemRef, PoStatus, TransactionType};

    fn po_draft(items: Vec<PoItemDraft>) -> PurchaseOrderDraft {
        PurchaseOrderDraft {
            po_number: None,
            supplier: "Advance".to_string(),
            branch: "Oslob".to_string(),
            prepared_by: "Jun".to_string(),
            noted_by: "Maria".to_string(),
            notes: None,
            items,
            actor: staff(),
        }
    }

    fn item(product_id: &str, quantity: i64, unit_cost: i64) -> PoItemDraft {
        PoItemDraft {
            item: ItemRef::Product(product_id.to_string()),
            quantity_ordered: quantity,
            unit_cost_cents: Some(unit_cost),
            unit: None,
        }
    }

    fn receive(good: Vec<ReceiveLine>, damaged: Vec<ReceiveLine>) -> ReceiveRequest {
        ReceiveRequest {
            invoice_reference: Some("DR-881".to_string()),
            good,
            damaged,
            actor: staff(),
        }
    }

    fn line(product_id: &str, quantity: i64) -> ReceiveLine {
        ReceiveLine::new(ItemRef::Product(product_id.to_string()), quantity)
    }

    async fn ordered(engine: &Engine, quantity: i64) -> (String, PurchaseOrder) {
        let id = stocked(engine, "Bolt", "BOLT-1", 0, 1000, 2000).await;
        let po = engine
            .create_purchase_order(&po_draft(vec![item(&id, quantity, 900)]))
            .await
            .unwrap();
        (id, po)
    }

    #[tokio::test]
    async fn test_create_generates_po_number() {
        let engine = engine().await;
        let (_, first) = ordered(&engine, 10).await;
        assert!(first.po_number.starts_with("PO-"));
        assert!(first.po_number.ends_with("-0001"));
        assert_eq!(first.status, PoStatus::PendingReceipt);

        let id = first.items[0].product_id.clone().unwrap();
        let second = engine
            .create_purchase_order(&po_draft(vec![item(&id, 5, 900)]))
            .await
            .unwrap();
        assert!(second.po_number.ends_with("-0002"));

        let mut named = po_draft(vec![item(&id, 5, 900)]);
        named.po_number = Some(first.po_number.clone());
        let err = engine.create_purchase_order(&named).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);

        assert_eq!(engine.purchase_orders(Some("Oslob")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_branch_and_product() {
        let engine = engine().await;

        let mut draft = po_draft(vec![item("missing", 1, 100)]);
        let err = engine.create_purchase_order(&draft).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        draft.branch = "Bogo".to_string();
        let err = engine.create_purchase_order(&draft).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = engine
            .create_purchase_order(&po_draft(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_create_rejects_product_listed_twice() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 0, 1000, 2000).await;

        let err = engine
            .create_purchase_order(&po_draft(vec![item(&id, 4, 900), item(&id, 6, 900)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Duplicate);
        assert!(engine.purchase_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_good_receipts_close_the_order() {
        let engine = engine().await;
        let (id, po) = ordered(&engine, 10).await;

        let outcome = engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 6)], Vec::new()))
            .await
            .unwrap();
        assert_eq!(outcome.transactions.len(), 1);
        let in_line = &outcome.transactions[0];
        assert_eq!(in_line.kind, TransactionType::In);
        assert_eq!(in_line.unit_cost_cents, 900);
        assert_eq!(in_line.invoice_number.as_deref(), Some("DR-881"));
        assert_eq!(
            engine.purchase_order(&po.id).await.unwrap().status,
            PoStatus::PartiallyReceived
        );

        engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 4)], Vec::new()))
            .await
            .unwrap();
        let closed = engine.purchase_order(&po.id).await.unwrap();
        assert_eq!(closed.status, PoStatus::Closed);
        assert_eq!(closed.receiving_history.len(), 2);

        let product = engine.product(&id).await.unwrap();
        assert_eq!(product.quantity, 10);
        assert!(product.batches.iter().all(|b| b.unit_cost_cents == 900));
    }

    #[tokio::test]
    async fn test_damaged_receipt_closes_without_ledger_line() {
        let engine = engine().await;
        let (id, po) = ordered(&engine, 10).await;

        engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 6)], Vec::new()))
            .await
            .unwrap();
        let outcome = engine
            .receive_purchase_order(&po.id, &receive(Vec::new(), vec![line(&id, 4)]))
            .await
            .unwrap();
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.record.unwrap().damaged_items[0].quantity, 4);

        let po = engine.purchase_order(&po.id).await.unwrap();
        assert_eq!(po.status, PoStatus::Closed);
        assert_eq!(po.items[0].quantity_damaged, 4);

        assert_eq!(engine.product(&id).await.unwrap().quantity, 6);
        let bin_id = engine
            .database()
            .products()
            .damage_bin_id(&id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(engine.product(&bin_id).await.unwrap().quantity, 4);
        assert_eq!(engine.transactions(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_receipt_and_over_quantity() {
        let engine = engine().await;
        let (id, po) = ordered(&engine, 10).await;

        engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 5)], Vec::new()))
            .await
            .unwrap();
        assert_eq!(
            engine.purchase_order(&po.id).await.unwrap().status,
            PoStatus::PartiallyReceived
        );

        let err = engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 4)], vec![line(&id, 2)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OverQuantity);
        assert_eq!(engine.product(&id).await.unwrap().quantity, 5);
        assert_eq!(engine.purchase_order(&po.id).await.unwrap().items[0].quantity_received, 5);
    }

    #[tokio::test]
    async fn test_overflowing_receipt_leaves_order_untouched() {
        let engine = engine().await;
        let (id, po) = ordered(&engine, 10).await;

        let err = engine
            .receive_purchase_order(
                &po.id,
                &receive(vec![line(&id, i64::MAX)], vec![line(&id, 2)]),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OverQuantity);

        let po = engine.purchase_order(&po.id).await.unwrap();
        assert_eq!(po.status, PoStatus::PendingReceipt);
        assert_eq!(po.items[0].quantity_received, 0);
        assert_eq!(engine.product(&id).await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_zero_receipt_is_a_no_op() {
        let engine = engine().await;
        let (id, po) = ordered(&engine, 10).await;

        let outcome = engine
            .receive_purchase_order(&po.id, &receive(vec![line(&id, 0)], Vec::new()))
            .await
            .unwrap();
        assert!(outcome.record.is_none());

        let po = engine.purchase_order(&po.id).await.unwrap();
        assert_eq!(po.status, PoStatus::PendingReceipt);
        assert_eq!(po.version, 1);
    }

    #[tokio::test]
    async fn test_template_item_becomes_product_on_receipt() {
        let engine = engine().await;
        let template = engine
            .save_master_product(&MasterProductInput {
                id: None,
                name: "Goggles".to_string(),
                sku: "GOG-1".to_string(),
                category: "Tools".to_string(),
                min_level: 5,
                cost_cents: 6500,
                supplier: "3M".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();

        let po = engine
            .create_purchase_order(&po_draft(vec![PoItemDraft {
                item: ItemRef::Template(template.id.clone()),
                quantity_ordered: 3,
                unit_cost_cents: None,
                unit: Some("box".to_string()),
            }]))
            .await
            .unwrap();
        assert!(po.items[0].product_id.is_none());
        assert!(engine.products(Some("Oslob")).await.unwrap().is_empty());

        let good = ReceiveLine::new(ItemRef::Template(template.id.clone()), 3);
        engine
            .receive_purchase_order(&po.id, &receive(vec![good], Vec::new()))
            .await
            .unwrap();

        let po = engine.purchase_order(&po.id).await.unwrap();
        assert_eq!(po.status, PoStatus::Closed);
        let product_id = po.items[0].product_id.clone().unwrap();
        let product = engine.product(&product_id).await.unwrap();
        assert_eq!(product.sku, "GOG-1");
        assert_eq!(product.quantity, 3);
        assert_eq!(product.batches[0].unit_cost_cents, 6500);
    }

    #[tokio::test]
    async fn test_unknown_purchase_order() {
        let engine = engine().await;
        let err = engine
            .receive_purchase_order("missing", &receive(Vec::new(), Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
