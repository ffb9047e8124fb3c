//! Compensation engine reversing recorded stock decrements.

use std::sync::Arc;
use std::time::Duration;

use common::TransactionId;
use store::{LedgerStore, ProductStore, StoreError};

use crate::error::StockError;
use crate::events::{EventSink, StockEvent};
use crate::{DEFAULT_OP_TIMEOUT, Result, bounded};

/// Reverses the effect of a transaction's decrements, once per ledger entry.
///
/// Rollback is not idempotent by default: a second attempt on a fully
/// rolled-back transaction is an [`StockError::AlreadyRolledBack`] error,
/// not a silent no-op. Brokers with at-least-once delivery usually want
/// the safer behavior; [`idempotent`](Self::idempotent) switches the
/// fully-rolled-back case to `Ok`.
#[derive(Clone)]
pub struct CompensationEngine<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    products: P,
    ledger: L,
    events: Arc<dyn EventSink>,
    idempotent: bool,
    op_timeout: Duration,
}

impl<P, L> CompensationEngine<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    /// Creates a new compensation engine over the given stores.
    pub fn new(products: P, ledger: L, events: Arc<dyn EventSink>) -> Self {
        Self {
            products,
            ledger,
            events,
            idempotent: false,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Makes repeated rollback of a fully rolled-back transaction succeed
    /// as a no-op instead of failing.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Overrides the per-operation store time bound.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Restores the stock removed under `transaction_id` and flips each
    /// entry's rolled-back flag.
    ///
    /// The increment lands before the flag write. A flag write failing
    /// after its increment leaves the entry live, and a retried rollback
    /// will increment that product again; this inconsistency window is a
    /// known limitation of the two-write design.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(&self, transaction_id: &TransactionId) -> Result<()> {
        let entries = bounded(
            self.op_timeout,
            self.ledger.find_by_transaction(transaction_id),
        )
        .await?;

        if entries.is_empty() {
            return Err(StockError::LedgerNotFound(transaction_id.clone()));
        }

        let live: Vec<_> = entries.into_iter().filter(|e| !e.rolled_back).collect();
        if live.is_empty() {
            if self.idempotent {
                tracing::debug!(%transaction_id, "rollback replay ignored");
                return Ok(());
            }
            return Err(StockError::AlreadyRolledBack(transaction_id.clone()));
        }

        for entry in live {
            match bounded(
                self.op_timeout,
                self.products.increment_stock(&entry.product_id, entry.quantity),
            )
            .await
            {
                Ok(_) => {}
                Err(StoreError::ProductNotFound(id)) => return Err(StockError::NotFound(id)),
                Err(e) => return Err(e.into()),
            }

            bounded(
                self.op_timeout,
                self.ledger.mark_rolled_back(transaction_id, &entry.product_id),
            )
            .await?;

            self.events
                .record(StockEvent::restored(
                    transaction_id,
                    &entry.product_id,
                    entry.quantity,
                ))
                .await;
            tracing::info!(
                %transaction_id,
                product_id = %entry.product_id,
                quantity = entry.quantity,
                "stock restored"
            );
        }

        metrics::counter!("stock_rollbacks_total").increment(1);
        Ok(())
    }
}
