//! Stock mutation core with a compensating-transaction ledger.
//!
//! This crate applies bounded stock decrements and increments as one saga
//! step of a larger order-fulfillment flow. Every accepted decrement writes
//! a ledger entry before the stock update; the [`CompensationEngine`]
//! reverses a transaction's decrements by the recorded amounts, exactly
//! once per entry.
//!
//! Batch decrements are fail-fast: on the first item failure the remaining
//! items are skipped and already-applied items stay applied until the
//! caller issues an explicit rollback. Callers needing all-or-nothing
//! semantics must drive that rollback themselves.

pub mod compensation;
pub mod error;
pub mod events;
pub mod service;

pub use compensation::CompensationEngine;
pub use error::StockError;
pub use events::{EventSink, InMemoryEventSink, StockEvent};
pub use service::{ReductionItem, StockService};

/// Convenience type alias for stock results.
pub type Result<T> = std::result::Result<T, StockError>;

use std::future::Future;
use std::time::Duration;

use store::StoreError;

/// Default time bound for a single store operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one store operation under a fixed time bound.
///
/// An elapsed timeout surfaces as [`StoreError::Timeout`], a normal
/// operation failure rather than a distinct state.
pub(crate) async fn bounded<T, F>(limit: Duration, op: F) -> store::Result<T>
where
    F: Future<Output = store::Result<T>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}
