//! Store error types.

use common::{ProductId, TransactionId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No product exists with the given ID.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// No ledger entry exists for the given transaction ID.
    #[error("Ledger entry not found for transaction: {0}")]
    EntryNotFound(TransactionId),

    /// A ledger entry already exists for this transaction and product.
    #[error("Ledger entry already exists for transaction {transaction_id}, product {product_id}")]
    DuplicateEntry {
        transaction_id: TransactionId,
        product_id: ProductId,
    },

    /// A conditional stock decrement found less stock than requested.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A store operation exceeded its time bound.
    #[error("Store operation timed out")]
    Timeout,

    /// The underlying persistence backend failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}
