//! # Transaction Ledger Operations
//!
//! History reads and invoice deletion. Lines are never edited; deleting an
//! invoice removes its lines and leaves stock as it is.

use tracing::warn;

use nexus_core::access::require_admin;
use nexus_core::validation::validate_invoice_number;
use nexus_core::{Actor, Transaction};

use super::rejected;
use crate::error::{EngineError, EngineResult};
use crate::locks::invoice_key;
use crate::Engine;

impl Engine {
    /// Ledger lines, newest first.
    pub async fn transactions(&self, branch: Option<&str>) -> EngineResult<Vec<Transaction>> {
        Ok(self.database().ledger().list(branch).await?)
    }

    /// Every line of one invoice, in the order written.
    pub async fn invoice_lines(&self, invoice_number: &str) -> EngineResult<Vec<Transaction>> {
        Ok(self
            .database()
            .ledger()
            .invoice_lines(invoice_number.trim())
            .await?)
    }

    /// Deletes every line of an invoice (admin only); returns the count.
    pub async fn delete_invoice(&self, invoice_number: &str, actor: &Actor) -> EngineResult<u64> {
        require_admin(actor, "delete invoices").map_err(rejected("delete invoice"))?;
        let invoice = invoice_number.trim();
        validate_invoice_number(invoice)?;

        let _locks = self.locks().acquire([invoice_key(invoice)]).await;
        let mut uow = self.database().begin().await?;

        let deleted = uow.delete_invoice(invoice).await?;
        if deleted == 0 {
            return Err(EngineError::not_found("invoice", invoice));
        }
        uow.commit().await?;

        warn!(invoice = %invoice, lines = deleted, user = %actor.name, "Invoice deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{admin, engine, staff, stocked};
    use nexus_core::sale::{SaleLine, SaleRequest};

    #[tokio::test]
    async fn test_delete_invoice_requires_admin_and_keeps_stock() {
        let engine = engine().await;
        let id = stocked(&engine, "Bolt", "BOLT-1", 10, 1000, 2000).await;
        let request = SaleRequest {
            lines: vec![SaleLine::new(id.clone(), 4, 2000)],
            actor: staff(),
            payment_method: Some("Cash".to_string()),
            reference_no: None,
            date: None,
        };
        engine.record_sale(&request, "SI-7001").await.unwrap();

        let err = engine.delete_invoice("SI-7001", &staff()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        assert_eq!(engine.delete_invoice("SI-7001", &admin()).await.unwrap(), 1);
        assert!(engine.invoice_lines("SI-7001").await.unwrap().is_empty());
        assert_eq!(engine.product(&id).await.unwrap().quantity, 6);

        let err = engine.delete_invoice("SI-7001", &admin()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_transactions_filter_by_branch() {
        let engine = engine().await;
        stocked(&engine, "Bolt", "BOLT-1", 10, 1000, 2000).await;

        assert_eq!(engine.transactions(Some("Oslob")).await.unwrap().len(), 1);
        assert!(engine.transactions(Some("Toledo")).await.unwrap().is_empty());
        assert_eq!(engine.transactions(None).await.unwrap().len(), 1);
    }
}
