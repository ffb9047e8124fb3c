//! Product store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Result, StoreError};

/// A product as held by the inventory service.
///
/// Only `id` and `stock` matter to the stock core; the remaining fields
/// belong to the catalog surface and are carried through saves unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    pub stock: u32,
    pub vendor_id: String,
    pub image: String,
    pub category_id: String,
    pub description: String,
}

impl Product {
    /// Creates a product with the given ID and stock; catalog fields empty.
    pub fn with_stock(id: impl Into<ProductId>, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            price: 0.0,
            stock,
            vendor_id: String::new(),
            image: String::new(),
            category_id: String::new(),
            description: String::new(),
        }
    }
}

/// Trait for product persistence operations.
///
/// Stock arithmetic is exposed as atomic conditional primitives rather than
/// read-modify-write through `save`, so that concurrent mutations of the same
/// product cannot interleave between the check and the update.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fetches a product by ID.
    async fn get_by_id(&self, id: &ProductId) -> Result<Product>;

    /// Inserts or replaces a product.
    async fn save(&self, product: Product) -> Result<()>;

    /// Atomically subtracts `quantity` from the product's stock.
    ///
    /// Fails with [`StoreError::InsufficientStock`] when the current stock
    /// is less than `quantity`; the product is left unchanged in that case.
    /// Returns the updated product.
    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<Product>;

    /// Atomically adds `quantity` to the product's stock.
    ///
    /// Returns the updated product.
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<Product>;
}

#[derive(Debug, Default)]
struct InMemoryProductState {
    products: HashMap<ProductId, Product>,
    fail_on_save: bool,
    fail_on_increment: bool,
}

/// In-memory product store for testing and standalone runs.
///
/// Provides the same interface as a database-backed implementation. Each
/// atomic stock primitive holds the write lock across check and update.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductStore {
    state: Arc<RwLock<InMemoryProductState>>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory product store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on subsequent save calls.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Configures the store to fail on subsequent increment calls.
    pub async fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().await.fail_on_increment = fail;
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        self.state.read().await.products.get(id).map(|p| p.stock)
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get_by_id(&self, id: &ProductId) -> Result<Product> {
        let state = self.state.read().await;
        state
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))
    }

    async fn save(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_save {
            return Err(StoreError::Backend("save failed".to_string()));
        }
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        product.stock -= quantity;
        Ok(product.clone())
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<Product> {
        let mut state = self.state.write().await;
        if state.fail_on_increment {
            return Err(StoreError::Backend("increment failed".to_string()));
        }
        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;

        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| StoreError::Backend(format!("stock overflow for {id}")))?;
        Ok(product.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_get() {
        let store = InMemoryProductStore::new();
        let product = Product::with_stock("P1", 100);

        store.save(product.clone()).await.unwrap();

        let fetched = store.get_by_id(&ProductId::from("P1")).await.unwrap();
        assert_eq!(fetched, product);
    }

    #[tokio::test]
    async fn get_missing_product() {
        let store = InMemoryProductStore::new();
        let result = store.get_by_id(&ProductId::from("nope")).await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn decrement_within_stock() {
        let store = InMemoryProductStore::new();
        store.save(Product::with_stock("P1", 100)).await.unwrap();

        let updated = store
            .decrement_stock(&ProductId::from("P1"), 30)
            .await
            .unwrap();
        assert_eq!(updated.stock, 70);
        assert_eq!(store.stock_of(&ProductId::from("P1")).await, Some(70));
    }

    #[tokio::test]
    async fn decrement_beyond_stock_leaves_product_unchanged() {
        let store = InMemoryProductStore::new();
        store.save(Product::with_stock("P1", 50)).await.unwrap();

        let result = store.decrement_stock(&ProductId::from("P1"), 200).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 200,
                available: 50,
                ..
            })
        ));
        assert_eq!(store.stock_of(&ProductId::from("P1")).await, Some(50));
    }

    #[tokio::test]
    async fn save_failure_leaves_store_untouched() {
        let store = InMemoryProductStore::new();
        store.save(Product::with_stock("P1", 10)).await.unwrap();
        store.set_fail_on_save(true).await;

        let result = store.save(Product::with_stock("P2", 5)).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert!(store.get_by_id(&ProductId::from("P2")).await.is_err());

        store.set_fail_on_save(false).await;
        store.save(Product::with_stock("P2", 5)).await.unwrap();
        assert_eq!(store.stock_of(&ProductId::from("P2")).await, Some(5));
    }

    #[tokio::test]
    async fn increment_adds_stock() {
        let store = InMemoryProductStore::new();
        store.save(Product::with_stock("P1", 10)).await.unwrap();

        let updated = store
            .increment_stock(&ProductId::from("P1"), 5)
            .await
            .unwrap();
        assert_eq!(updated.stock, 15);
    }

    #[tokio::test]
    async fn increment_overflow_is_an_error_not_a_wrap() {
        let store = InMemoryProductStore::new();
        store
            .save(Product::with_stock("P1", u32::MAX - 1))
            .await
            .unwrap();

        let result = store.increment_stock(&ProductId::from("P1"), 2).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(
            store.stock_of(&ProductId::from("P1")).await,
            Some(u32::MAX - 1)
        );
    }

    #[tokio::test]
    async fn increment_missing_product() {
        let store = InMemoryProductStore::new();
        let result = store.increment_stock(&ProductId::from("ghost"), 5).await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn catalog_fields_survive_save() {
        let store = InMemoryProductStore::new();
        let mut product = Product::with_stock("P1", 10);
        product.name = "Widget".to_string();
        product.price = 19.99;
        product.description = "A widget".to_string();
        store.save(product).await.unwrap();

        store
            .decrement_stock(&ProductId::from("P1"), 3)
            .await
            .unwrap();

        let fetched = store.get_by_id(&ProductId::from("P1")).await.unwrap();
        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.price, 19.99);
        assert_eq!(fetched.stock, 7);
    }
}
