//! Shared identifier types used across the inventory stock crates.

mod types;

pub use types::{ProductId, TransactionId};
