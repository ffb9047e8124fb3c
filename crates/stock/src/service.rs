//! Stock mutation service.

use std::sync::Arc;
use std::time::Duration;

use common::{ProductId, TransactionId};
use store::{LedgerEntry, LedgerStore, ProductStore, StoreError};

use crate::error::StockError;
use crate::events::{EventSink, StockEvent};
use crate::{DEFAULT_OP_TIMEOUT, Result, bounded};

/// One item of a batch stock reduction.
#[derive(Debug, Clone)]
pub struct ReductionItem {
    /// The product whose stock is reduced.
    pub product_id: ProductId,
    /// Quantity to remove. Signed so that out-of-range wire values reach
    /// the bounds check instead of failing at decode time.
    pub quantity: i64,
}

/// Applies bounded decrements and increments to product stock.
///
/// A decrement writes its ledger entry before the stock update, so a crash
/// between the two writes never leaves an applied decrement without a
/// compensatable record. The stock update itself is the store's atomic
/// decrement-if-sufficient primitive; losing a race there after the ledger
/// write neutralizes the fresh entry by marking it rolled back, which
/// compensation then skips.
#[derive(Clone)]
pub struct StockService<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    products: P,
    ledger: L,
    events: Arc<dyn EventSink>,
    op_timeout: Duration,
}

impl<P, L> StockService<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    /// Creates a new stock service over the given stores.
    pub fn new(products: P, ledger: L, events: Arc<dyn EventSink>) -> Self {
        Self {
            products,
            ledger,
            events,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Overrides the per-operation store time bound.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Removes `quantity` from a product's stock and records the decrement
    /// in the ledger under `transaction_id`.
    ///
    /// Fails with [`StockError::InvalidQuantity`] when `quantity` is
    /// negative or exceeds the current stock; no mutation happens then.
    #[tracing::instrument(skip(self))]
    pub async fn reduce_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
        transaction_id: &TransactionId,
    ) -> Result<()> {
        let product = bounded(self.op_timeout, self.products.get_by_id(product_id))
            .await
            .map_err(product_err)?;

        if quantity < 0 || quantity as u64 > u64::from(product.stock) {
            return Err(StockError::InvalidQuantity {
                requested: quantity,
                available: product.stock,
            });
        }
        let quantity = quantity as u32;

        // Ledger first: an entry without an applied decrement is recoverable,
        // an applied decrement without an entry is not.
        let entry = LedgerEntry::new(transaction_id.clone(), product_id.clone(), quantity);
        bounded(self.op_timeout, self.ledger.insert(entry)).await?;

        match bounded(
            self.op_timeout,
            self.products.decrement_stock(product_id, quantity),
        )
        .await
        {
            Ok(updated) => {
                metrics::counter!("stock_reductions_total").increment(1);
                self.events
                    .record(StockEvent::reduced(transaction_id, product_id, quantity))
                    .await;
                tracing::info!(
                    %product_id,
                    %transaction_id,
                    quantity,
                    stock = updated.stock,
                    "stock reduced"
                );
                Ok(())
            }
            Err(StoreError::InsufficientStock { available, .. }) => {
                // Lost a race against a concurrent mutation after the ledger
                // write; retire the entry so compensation skips it.
                if let Err(e) = bounded(
                    self.op_timeout,
                    self.ledger.mark_rolled_back(transaction_id, product_id),
                )
                .await
                {
                    tracing::warn!(
                        %transaction_id,
                        %product_id,
                        error = %e,
                        "failed to retire orphan ledger entry"
                    );
                }
                Err(StockError::InvalidQuantity {
                    requested: i64::from(quantity),
                    available,
                })
            }
            Err(e) => Err(product_err(e)),
        }
    }

    /// Adds `quantity` to a product's stock.
    ///
    /// No ledger entry is written: increments only occur as the mechanism
    /// of compensation and are not independently compensatable.
    #[tracing::instrument(skip(self))]
    pub async fn increase_stock(&self, product_id: &ProductId, quantity: i64) -> Result<()> {
        let product = bounded(self.op_timeout, self.products.get_by_id(product_id))
            .await
            .map_err(product_err)?;

        // Negative and over-u32 quantities are both out of range; the
        // latter would otherwise truncate silently in the cast.
        let quantity = u32::try_from(quantity).map_err(|_| StockError::InvalidQuantity {
            requested: quantity,
            available: product.stock,
        })?;

        let updated = bounded(
            self.op_timeout,
            self.products.increment_stock(product_id, quantity),
        )
        .await
        .map_err(product_err)?;

        tracing::info!(%product_id, quantity, stock = updated.stock, "stock increased");
        Ok(())
    }

    /// Applies [`reduce_stock`](Self::reduce_stock) to each item in order,
    /// all under the same transaction id.
    ///
    /// Fail-fast: the first item failure stops the batch and is returned;
    /// items already decremented stay decremented and their ledger entries
    /// stay live until an explicit rollback is issued.
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    pub async fn reduce_stock_batch(
        &self,
        transaction_id: &TransactionId,
        items: &[ReductionItem],
    ) -> Result<()> {
        let start = std::time::Instant::now();
        metrics::counter!("stock_batch_reductions_total").increment(1);

        for item in items {
            if let Err(e) = self
                .reduce_stock(&item.product_id, item.quantity, transaction_id)
                .await
            {
                tracing::warn!(
                    %transaction_id,
                    product_id = %item.product_id,
                    error = %e,
                    "batch reduction stopped at failed item"
                );
                metrics::counter!("stock_batch_failures_total").increment(1);
                return Err(e);
            }
        }

        metrics::histogram!("stock_batch_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        Ok(())
    }
}

fn product_err(e: StoreError) -> StockError {
    match e {
        StoreError::ProductNotFound(id) => StockError::NotFound(id),
        other => StockError::Store(other),
    }
}
