//! Stock error types.

use common::{ProductId, TransactionId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during stock operations.
///
/// `NotFound`, `InvalidQuantity` and `AlreadyRolledBack` are business
/// outcomes; they never crash the message handler and only determine
/// the response status. `Store` covers persistence failures, transient
/// or not, and is treated the same way at the handling boundary.
#[derive(Debug, Error)]
pub enum StockError {
    /// Product not found.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// Requested quantity is negative or exceeds the available stock.
    #[error("Invalid quantity: requested {requested}, available {available}")]
    InvalidQuantity { requested: i64, available: u32 },

    /// No ledger entry exists for the transaction.
    #[error("No ledger entry for transaction: {0}")]
    LedgerNotFound(TransactionId),

    /// The transaction's decrements have all been rolled back already.
    #[error("Transaction already rolled back: {0}")]
    AlreadyRolledBack(TransactionId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
