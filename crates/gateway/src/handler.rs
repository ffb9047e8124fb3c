//! Envelope dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, TransactionId};
use stock::{CompensationEngine, ReductionItem, StockService};
use store::{LedgerStore, ProductStore};

use crate::envelope::{
    EVENT_REDUCE_STOCK, EVENT_ROLLBACK_STOCK, Envelope, ReduceResponse, ReduceStockPayload,
    RollbackStockPayload,
};
use crate::error::GatewayError;

/// How the broker should acknowledge a delivery after handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the message was processed (not necessarily successfully).
    Ack,
    /// Negatively acknowledge without redelivery.
    Reject,
}

/// Output port for response envelopes.
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    /// Publishes one encoded response envelope.
    async fn publish(&self, body: Vec<u8>) -> Result<(), GatewayError>;
}

/// Dispatches decoded envelopes to the stock service and compensation engine.
///
/// Acknowledgment reflects "the message was processed", never the business
/// outcome: malformed input is logged and dropped with an ack, and only an
/// unrecognized event tag is rejected. The business outcome travels solely
/// in the response envelope of the reduce path.
pub struct MessageHandler<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    service: StockService<P, L>,
    engine: CompensationEngine<P, L>,
    publisher: Arc<dyn ResponsePublisher>,
}

impl<P, L> MessageHandler<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    /// Creates a handler over the stock core and a response publisher.
    pub fn new(
        service: StockService<P, L>,
        engine: CompensationEngine<P, L>,
        publisher: Arc<dyn ResponsePublisher>,
    ) -> Self {
        Self {
            service,
            engine,
            publisher,
        }
    }

    /// Handles one raw delivery body and returns its acknowledgment.
    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn handle(&self, body: &[u8]) -> Disposition {
        metrics::counter!("gateway_messages_total").increment(1);

        let envelope: Envelope = match serde_json::from_slice(body) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "invalid envelope, dropping message");
                metrics::counter!("gateway_malformed_total").increment(1);
                return Disposition::Ack;
            }
        };

        match envelope.event.as_str() {
            EVENT_REDUCE_STOCK => self.handle_reduce(envelope).await,
            EVENT_ROLLBACK_STOCK => self.handle_rollback(envelope).await,
            other => {
                tracing::warn!(event = other, "unknown event, rejecting message");
                metrics::counter!("gateway_unknown_events_total").increment(1);
                Disposition::Reject
            }
        }
    }

    async fn handle_reduce(&self, envelope: Envelope) -> Disposition {
        let payload: ReduceStockPayload = match serde_json::from_value(envelope.data) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "bad reduce_stock payload, dropping message");
                metrics::counter!("gateway_malformed_total").increment(1);
                return Disposition::Ack;
            }
        };

        let transaction_id = TransactionId::new(envelope.transaction_id.clone());
        let items: Vec<ReductionItem> = payload
            .products
            .into_iter()
            .map(|p| ReductionItem {
                product_id: ProductId::new(p.product_id),
                quantity: p.quantity,
            })
            .collect();

        let response = match self.service.reduce_stock_batch(&transaction_id, &items).await {
            Ok(()) => ReduceResponse::success(envelope.transaction_id),
            Err(e) => {
                tracing::warn!(%transaction_id, error = %e, "stock reduction failed");
                ReduceResponse::error(envelope.transaction_id, e.to_string())
            }
        };

        self.emit(response).await;
        Disposition::Ack
    }

    async fn handle_rollback(&self, envelope: Envelope) -> Disposition {
        let payload: RollbackStockPayload = match serde_json::from_value(envelope.data) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "bad rollback_stock payload, dropping message");
                metrics::counter!("gateway_malformed_total").increment(1);
                return Disposition::Ack;
            }
        };

        // No response envelope on this path; failures are logged only.
        let transaction_id = TransactionId::new(payload.transaction_id);
        if let Err(e) = self.engine.rollback(&transaction_id).await {
            tracing::warn!(%transaction_id, error = %e, "stock rollback failed");
        }
        Disposition::Ack
    }

    async fn emit(&self, response: ReduceResponse) {
        let body = match response.encode() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode response envelope");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(body).await {
            tracing::error!(error = %e, "failed to publish response envelope");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stock::InMemoryEventSink;
    use store::{InMemoryLedgerStore, InMemoryProductStore, Product};
    use tokio::sync::RwLock;

    use crate::envelope::ResponseStatus;

    /// Publisher fake capturing response bodies.
    #[derive(Clone, Default)]
    struct CapturingPublisher {
        published: Arc<RwLock<Vec<Vec<u8>>>>,
        fail: Arc<RwLock<bool>>,
    }

    impl CapturingPublisher {
        async fn responses(&self) -> Vec<ReduceResponse> {
            self.published
                .read()
                .await
                .iter()
                .map(|body| serde_json::from_slice(body).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl ResponsePublisher for CapturingPublisher {
        async fn publish(&self, body: Vec<u8>) -> Result<(), GatewayError> {
            if *self.fail.read().await {
                return Err(GatewayError::Publish("publisher down".to_string()));
            }
            self.published.write().await.push(body);
            Ok(())
        }
    }

    async fn setup() -> (
        MessageHandler<InMemoryProductStore, InMemoryLedgerStore>,
        InMemoryProductStore,
        CapturingPublisher,
    ) {
        let products = InMemoryProductStore::new();
        let ledger = InMemoryLedgerStore::new();
        let events = Arc::new(InMemoryEventSink::new());
        let publisher = CapturingPublisher::default();

        products.save(Product::with_stock("P1", 100)).await.unwrap();
        products.save(Product::with_stock("P2", 50)).await.unwrap();

        let service = StockService::new(products.clone(), ledger.clone(), events.clone());
        let engine = CompensationEngine::new(products.clone(), ledger, events);
        let handler = MessageHandler::new(service, engine, Arc::new(publisher.clone()));
        (handler, products, publisher)
    }

    fn reduce_envelope(transaction_id: &str, items: &[(&str, i64)]) -> Vec<u8> {
        let products: Vec<_> = items
            .iter()
            .map(|(id, qty)| serde_json::json!({"product_id": id, "quantity": qty}))
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "event": "reduce_stock",
            "data": {"products": products},
            "transaction_id": transaction_id,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn reduce_success_emits_success_response() {
        let (handler, products, publisher) = setup().await;

        let disposition = handler.handle(&reduce_envelope("T1", &[("P1", 30)])).await;
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(products.stock_of(&"P1".into()).await, Some(70));

        let responses = publisher.responses().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status, ResponseStatus::Success);
        assert_eq!(responses[0].transaction_id, "T1");
    }

    #[tokio::test]
    async fn partial_batch_failure_emits_error_response() {
        let (handler, products, publisher) = setup().await;

        let disposition = handler
            .handle(&reduce_envelope("T1", &[("P1", 30), ("P2", 200)]))
            .await;
        assert_eq!(disposition, Disposition::Ack);

        // First item applied, failing item untouched.
        assert_eq!(products.stock_of(&"P1".into()).await, Some(70));
        assert_eq!(products.stock_of(&"P2".into()).await, Some(50));

        let responses = publisher.responses().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status, ResponseStatus::Error);
        assert_eq!(responses[0].transaction_id, "T1");
        assert!(!responses[0].message.is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_is_acked_without_response() {
        let (handler, _, publisher) = setup().await;

        let disposition = handler.handle(b"not json at all").await;
        assert_eq!(disposition, Disposition::Ack);
        assert!(publisher.responses().await.is_empty());
    }

    #[tokio::test]
    async fn unparsable_reduce_payload_is_acked_without_response() {
        let (handler, products, publisher) = setup().await;

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "reduce_stock",
            "data": {"products": "oops"},
            "transaction_id": "T1",
        }))
        .unwrap();

        let disposition = handler.handle(&body).await;
        assert_eq!(disposition, Disposition::Ack);
        assert!(publisher.responses().await.is_empty());
        assert_eq!(products.stock_of(&"P1".into()).await, Some(100));
    }

    #[tokio::test]
    async fn unknown_event_is_rejected() {
        let (handler, _, publisher) = setup().await;

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "restock_everything",
            "data": {},
            "transaction_id": "T1",
        }))
        .unwrap();

        let disposition = handler.handle(&body).await;
        assert_eq!(disposition, Disposition::Reject);
        assert!(publisher.responses().await.is_empty());
    }

    #[tokio::test]
    async fn rollback_message_restores_stock_without_response() {
        let (handler, products, publisher) = setup().await;

        handler.handle(&reduce_envelope("T1", &[("P1", 30)])).await;
        assert_eq!(products.stock_of(&"P1".into()).await, Some(70));

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "rollback_stock",
            "data": {"transaction_id": "T1"},
            "transaction_id": "T1",
        }))
        .unwrap();
        let disposition = handler.handle(&body).await;
        assert_eq!(disposition, Disposition::Ack);

        assert_eq!(products.stock_of(&"P1".into()).await, Some(100));
        // Only the reduce response was emitted.
        assert_eq!(publisher.responses().await.len(), 1);
    }

    #[tokio::test]
    async fn rollback_of_unknown_transaction_is_still_acked() {
        let (handler, _, publisher) = setup().await;

        let body = serde_json::to_vec(&serde_json::json!({
            "event": "rollback_stock",
            "data": {"transaction_id": "missing"},
            "transaction_id": "missing",
        }))
        .unwrap();
        let disposition = handler.handle(&body).await;
        assert_eq!(disposition, Disposition::Ack);
        assert!(publisher.responses().await.is_empty());
    }

    #[tokio::test]
    async fn publish_failure_still_acks_the_delivery() {
        let (handler, products, publisher) = setup().await;
        *publisher.fail.write().await = true;

        let disposition = handler.handle(&reduce_envelope("T1", &[("P1", 30)])).await;
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(products.stock_of(&"P1".into()).await, Some(70));
    }
}
