//! Persistence interfaces consumed by the stock mutation core.
//!
//! The core talks to two stores: the product store (current stock plus
//! pass-through catalog fields) and the stock ledger (one entry per applied
//! decrement, keyed by transaction id and product id). Both are defined as
//! async traits with in-memory implementations; a database-backed
//! implementation plugs in behind the same traits.

mod error;
mod ledger;
mod product;

pub use error::StoreError;
pub use ledger::{InMemoryLedgerStore, LedgerEntry, LedgerStore};
pub use product::{InMemoryProductStore, Product, ProductStore};

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
