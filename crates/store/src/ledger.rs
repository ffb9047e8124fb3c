//! Stock ledger store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, TransactionId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Result, StoreError};

/// Durable record of one applied stock decrement.
///
/// Entries are keyed by `(transaction_id, product_id)`, so a batch
/// decrement over several products under one transaction id yields one
/// entry per product. Entries are never deleted; `rolled_back` flips
/// from false to true exactly once and never resets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    /// Magnitude of the original decrement, always positive.
    pub quantity: u32,
    pub rolled_back: bool,
}

impl LedgerEntry {
    /// Creates a live (not rolled back) entry for an applied decrement.
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        product_id: impl Into<ProductId>,
        quantity: u32,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            product_id: product_id.into(),
            quantity,
            rolled_back: false,
        }
    }
}

/// Trait for stock ledger persistence operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new ledger entry.
    ///
    /// Fails with [`StoreError::DuplicateEntry`] if an entry already exists
    /// for the same transaction and product.
    async fn insert(&self, entry: LedgerEntry) -> Result<()>;

    /// Returns all entries recorded under the given transaction ID.
    ///
    /// Returns an empty vector when the transaction is unknown.
    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Vec<LedgerEntry>>;

    /// Sets the rolled-back flag on one entry.
    ///
    /// Fails with [`StoreError::EntryNotFound`] when no entry exists for
    /// the given transaction and product.
    async fn mark_rolled_back(
        &self,
        transaction_id: &TransactionId,
        product_id: &ProductId,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    entries: HashMap<(TransactionId, ProductId), LedgerEntry>,
    fail_on_insert: bool,
    fail_on_mark: bool,
}

/// In-memory ledger store for testing and standalone runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on subsequent insert calls.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }

    /// Configures the store to fail on subsequent mark-rolled-back calls.
    pub async fn set_fail_on_mark(&self, fail: bool) {
        self.state.write().await.fail_on_mark = fail;
    }

    /// Returns the total number of ledger entries.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert(&self, entry: LedgerEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_insert {
            return Err(StoreError::Backend("insert failed".to_string()));
        }

        let key = (entry.transaction_id.clone(), entry.product_id.clone());
        if state.entries.contains_key(&key) {
            return Err(StoreError::DuplicateEntry {
                transaction_id: entry.transaction_id,
                product_id: entry.product_id,
            });
        }
        state.entries.insert(key, entry);
        Ok(())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|e| &e.transaction_id == transaction_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.product_id.as_str().cmp(b.product_id.as_str()));
        Ok(entries)
    }

    async fn mark_rolled_back(
        &self,
        transaction_id: &TransactionId,
        product_id: &ProductId,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_mark {
            return Err(StoreError::Backend("mark rolled back failed".to_string()));
        }

        let key = (transaction_id.clone(), product_id.clone());
        let entry = state
            .entries
            .get_mut(&key)
            .ok_or_else(|| StoreError::EntryNotFound(transaction_id.clone()))?;

        entry.rolled_back = true;
        Ok(())
    }
}
