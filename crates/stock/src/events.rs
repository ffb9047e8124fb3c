//! Stock domain events and their output port.
//!
//! Events are appended to an [`EventSink`] rather than hardwired to a
//! logger, so a future subscriber (projection, audit feed) can consume
//! them without changing the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, TransactionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Events emitted by stock mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockEvent {
    /// A decrement was applied and its ledger entry recorded.
    StockReduced(StockMovementData),

    /// A compensation restored a previously removed quantity.
    StockRestored(StockMovementData),
}

impl StockEvent {
    /// Event type name, stable across serialization.
    pub fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockReduced(_) => "StockReduced",
            StockEvent::StockRestored(_) => "StockRestored",
        }
    }

    pub(crate) fn reduced(
        transaction_id: &TransactionId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Self {
        StockEvent::StockReduced(StockMovementData {
            transaction_id: transaction_id.clone(),
            product_id: product_id.clone(),
            quantity,
            occurred_at: Utc::now(),
        })
    }

    pub(crate) fn restored(
        transaction_id: &TransactionId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Self {
        StockEvent::StockRestored(StockMovementData {
            transaction_id: transaction_id.clone(),
            product_id: product_id.clone(),
            quantity,
            occurred_at: Utc::now(),
        })
    }
}

/// Payload shared by both stock movement events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementData {
    /// The business transaction the movement belongs to.
    pub transaction_id: TransactionId,
    /// The product whose stock moved.
    pub product_id: ProductId,
    /// Magnitude of the movement.
    pub quantity: u32,
    /// When the movement was applied.
    pub occurred_at: DateTime<Utc>,
}

/// Output port for stock domain events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Appends one event to the sink.
    async fn record(&self, event: StockEvent);
}

/// In-memory event sink that keeps events in append order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<StockEvent>>>,
}

impl InMemoryEventSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded events.
    pub async fn events(&self) -> Vec<StockEvent> {
        self.events.read().await.clone()
    }

    /// Returns the number of recorded events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn record(&self, event: StockEvent) {
        self.events.write().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_keeps_append_order() {
        let sink = InMemoryEventSink::new();
        let txn = TransactionId::from("T1");

        sink.record(StockEvent::reduced(&txn, &ProductId::from("P1"), 3))
            .await;
        sink.record(StockEvent::restored(&txn, &ProductId::from("P1"), 3))
            .await;

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "StockReduced");
        assert_eq!(events[1].event_type(), "StockRestored");
    }

    #[tokio::test]
    async fn event_serialization_roundtrip() {
        let event = StockEvent::reduced(&TransactionId::from("T1"), &ProductId::from("P1"), 7);
        let json = serde_json::to_string(&event).unwrap();
        let back: StockEvent = serde_json::from_str(&json).unwrap();
        match back {
            StockEvent::StockReduced(data) => {
                assert_eq!(data.quantity, 7);
                assert_eq!(data.product_id, ProductId::from("P1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
