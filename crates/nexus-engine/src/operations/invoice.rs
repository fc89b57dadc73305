//! # Invoice Sequence Operations
//!
//! The singleton counter behind POS checkout. `checkout` consumes and
//! advances it inside the sale's own transaction; these operations only
//! read it or reseed it.

use tracing::info;

use nexus_core::validation::validate_invoice_number;

use crate::error::EngineResult;
use crate::locks::INVOICE_SEQUENCE;
use crate::Engine;

impl Engine {
    /// The number the next checkout will use. Falls back to the configured
    /// seed while the sequence has never been stored.
    pub async fn next_invoice_number(&self) -> EngineResult<String> {
        let current = self.database().invoices().current().await?;
        Ok(current
            .map(|sequence| sequence.next_value)
            .unwrap_or_else(|| self.config().invoice.seed.clone()))
    }

    /// Reseeds the sequence; the next checkout uses `value` as given.
    pub async fn set_next_invoice_number(&self, value: &str) -> EngineResult<String> {
        let value = value.trim();
        validate_invoice_number(value)?;

        let _locks = self.locks().acquire([INVOICE_SEQUENCE]).await;
        let mut uow = self.database().begin().await?;
        let sequence = uow.invoice_sequence().await?;
        uow.store_invoice_sequence(value, sequence.as_ref().map(|s| s.version))
            .await?;
        uow.commit().await?;

        info!(
            previous = sequence.as_ref().map(|s| s.next_value.as_str()).unwrap_or("-"),
            next = %value,
            "Invoice sequence reseeded"
        );
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::engine;
    use crate::EngineConfig;
    use nexus_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_next_invoice_defaults_to_seed() {
        let engine = engine().await;
        assert_eq!(engine.next_invoice_number().await.unwrap(), "1001");

        let mut config = EngineConfig::default();
        config.invoice.seed = "SI-000500".to_string();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seeded = Engine::with_database(db, config);
        assert_eq!(seeded.next_invoice_number().await.unwrap(), "SI-000500");
    }

    #[tokio::test]
    async fn test_set_next_invoice_number() {
        let engine = engine().await;

        assert_eq!(engine.set_next_invoice_number("  A-99 ").await.unwrap(), "A-99");
        assert_eq!(engine.next_invoice_number().await.unwrap(), "A-99");

        // A second reseed goes through the stored version
        engine.set_next_invoice_number("B-7").await.unwrap();
        assert_eq!(engine.next_invoice_number().await.unwrap(), "B-7");

        let err = engine.set_next_invoice_number("   ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(engine.next_invoice_number().await.unwrap(), "B-7");
    }
}
